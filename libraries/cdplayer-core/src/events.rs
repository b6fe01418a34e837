//! Listener bus: a small multi-subscriber event registry
//!
//! Grounded on `soul-playback::events::PlaybackEvent` (an enum of
//! domain events), generalized into a registry with more than one
//! subscriber — the Controller is always one subscriber, but auxiliary
//! subscribers (a display, a logger) can register too without the
//! Controller knowing about them. Dispatch is synchronous from the
//! thread that raised the event; listeners must not block.

use std::sync::{Arc, Mutex};

/// Reason carried by a `StatusChange` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusReason {
    /// The disc ended (advance() returned none and repeat is not ALL)
    DiscEnd,
    /// A fatal playback error occurred
    Error,
    /// No disc is loaded (setup failure at load time)
    NoDisc,
    /// Transport was explicitly stopped
    Stopped,
}

impl StatusReason {
    /// The string spelling used on the wire (listener messages, MCUB)
    pub fn as_str(self) -> &'static str {
        match self {
            StatusReason::DiscEnd => "disc_end",
            StatusReason::Error => "error",
            StatusReason::NoDisc => "no_disc",
            StatusReason::Stopped => "stopped",
        }
    }
}

/// Domain events raised by the engine
#[derive(Debug, Clone)]
pub enum Event {
    /// The current track changed, naturally or by user navigation
    TrackChange {
        /// 0-based index of the new current track
        index: usize,
        /// Total track count on the loaded disc
        total: usize,
    },
    /// A disc finished loading
    CdLoaded {
        /// Number of tracks on the newly loaded disc
        track_count: usize,
    },
    /// Transport-level status changed
    StatusChange {
        /// Why the status changed
        reason: StatusReason,
    },
    /// Disc-loading progress update, 0.0 to 1.0
    LoadingProgress {
        /// Fraction complete
        fraction: f32,
    },
}

/// A subscriber to the event bus
///
/// Implemented as a trait (rather than a single callback field) so more
/// than one listener can register for the same event stream instead of
/// overwriting a single monkey-patched slot.
pub trait Listener: Send + Sync {
    /// Handle a dispatched event. Must not block.
    fn on_event(&self, event: &Event);
}

impl<F> Listener for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        (self)(event);
    }
}

/// Multi-subscriber event registry
#[derive(Default)]
pub struct ListenerBus {
    listeners: Mutex<Vec<Arc<dyn Listener>>>,
}

impl ListenerBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub fn subscribe(&self, listener: Arc<dyn Listener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    /// Dispatch an event synchronously to every subscriber
    pub fn dispatch(&self, event: Event) {
        log::debug!("dispatching event: {:?}", event);
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener.on_event(&event);
        }
    }

    /// Number of currently registered subscribers (test/diagnostic use)
    pub fn subscriber_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispatch_reaches_all_subscribers() {
        let bus = ListenerBus::new();
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));

        let ca = Arc::clone(&count_a);
        bus.subscribe(Arc::new(move |_: &Event| {
            ca.fetch_add(1, Ordering::SeqCst);
        }));
        let cb = Arc::clone(&count_b);
        bus.subscribe(Arc::new(move |_: &Event| {
            cb.fetch_add(1, Ordering::SeqCst);
        }));

        bus.dispatch(Event::CdLoaded { track_count: 3 });

        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_subscribers_does_not_panic() {
        let bus = ListenerBus::new();
        bus.dispatch(Event::StatusChange {
            reason: StatusReason::DiscEnd,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn status_reason_strings_match_mcub_vocabulary() {
        assert_eq!(StatusReason::DiscEnd.as_str(), "disc_end");
        assert_eq!(StatusReason::NoDisc.as_str(), "no_disc");
    }
}
