//! Glue between the sequencer, a transport, and the listener bus
//!
//! Owns the one end-of-track handler both backends funnel through, so
//! "what happens when a track naturally finishes" is decided in exactly
//! one place regardless of which transport is active.
//!
//! The transport raises events on a shared bus rather than holding a
//! direct back-reference to the Controller (no transport -> Controller
//! pointer exists at all); the Controller instead holds a `Weak` handle
//! to itself in the closure it registers as a listener, so the bus never
//! keeps the Controller alive through its own subscriber list.

use crate::config::AppConfig;
use crate::error::Result;
use crate::events::{Event, ListenerBus, Listener, StatusReason};
use crate::sequencer::TrackSequencer;
use crate::transport::AudioTransport;
use crate::types::{Disc, PlayerState, RepeatMode, Track};
use std::sync::{Arc, Mutex, Weak};

/// Seek-back threshold for `prev`: within this many seconds of a
/// track's start, `prev` moves to the previous track; past it, `prev`
/// restarts the current track instead.
const PREV_RESTART_THRESHOLD_SECONDS: f64 = 2.0;

struct ControllerListener {
    controller: Weak<Controller>,
}

impl Listener for ControllerListener {
    fn on_event(&self, event: &Event) {
        if let Some(controller) = self.controller.upgrade() {
            controller.handle_transport_event(event);
        }
    }
}

/// Playback engine facade: one sequencer, one active transport
pub struct Controller {
    transport: Mutex<Box<dyn AudioTransport>>,
    sequencer: Mutex<TrackSequencer>,
    disc: Mutex<Option<Disc>>,
    bus: Arc<ListenerBus>,
    config: AppConfig,
}

impl Controller {
    /// Build a Controller around an already-constructed transport
    ///
    /// The transport must not yet be playing; `load` binds the first
    /// track and, per `config.autoplay_on_load`, may start it.
    pub fn new(transport: Box<dyn AudioTransport>, config: AppConfig) -> Arc<Self> {
        let bus = Arc::new(ListenerBus::new());
        let controller = Arc::new(Self {
            transport: Mutex::new(transport),
            sequencer: Mutex::new(TrackSequencer::new()),
            disc: Mutex::new(None),
            bus: Arc::clone(&bus),
            config,
        });

        controller
            .transport
            .lock()
            .unwrap()
            .attach_listener_bus(Arc::clone(&bus));

        let weak = Arc::downgrade(&controller);
        bus.subscribe(Arc::new(ControllerListener { controller: weak }));

        controller
    }

    /// Register an additional subscriber on the shared event bus
    pub fn subscribe(&self, listener: Arc<dyn Listener>) {
        self.bus.subscribe(listener);
    }

    /// Load a new disc, binding (and per configuration, starting) track 1
    ///
    /// `extraction_level` selects which `autoplay_on_load` entry applies.
    /// A disc with zero tracks clears the sequencer and never autoplays.
    /// Scanning the physical disc into a [`Disc`] record is out of scope
    /// here (cdparanoia/CD-Text territory); the caller supplies it.
    pub fn load(&self, disc: Disc, extraction_level: u8) -> Result<()> {
        let track_count = disc.track_count();
        *self.disc.lock().unwrap() = Some(disc);
        self.sequencer.lock().unwrap().set_total_tracks(track_count);
        self.bus.dispatch(Event::CdLoaded { track_count });

        if track_count == 0 {
            return Ok(());
        }

        let auto_play = self.config.autoplay_on_load.for_level(extraction_level);
        self.transport.lock().unwrap().navigate_to(0, auto_play)?;
        self.bus.dispatch(Event::TrackChange { index: 0, total: track_count });
        if auto_play {
            self.request_preload();
        }
        Ok(())
    }

    /// Release the current disc. Stops the transport and clears the
    /// sequencer back to its empty state.
    pub fn eject(&self) -> Result<()> {
        self.transport.lock().unwrap().stop()?;
        *self.disc.lock().unwrap() = None;
        self.sequencer.lock().unwrap().set_total_tracks(0);
        self.bus.dispatch(Event::CdLoaded { track_count: 0 });
        Ok(())
    }

    pub fn play(&self) -> Result<()> {
        self.transport.lock().unwrap().play()
    }

    pub fn pause(&self) -> Result<()> {
        self.transport.lock().unwrap().pause()
    }

    pub fn stop(&self) -> Result<()> {
        self.transport.lock().unwrap().stop()?;
        self.bus.dispatch(Event::StatusChange {
            reason: StatusReason::Stopped,
        });
        Ok(())
    }

    pub fn seek(&self, position_seconds: f64) -> Result<()> {
        self.transport.lock().unwrap().seek(position_seconds)
    }

    /// Skip to the next track, per the sequencer's current shuffle/repeat order
    pub fn next(&self) -> Result<()> {
        let target = self.sequencer.lock().unwrap().next_track();
        match target {
            Some(index) => self.navigate_and_play(index),
            None => Ok(()),
        }
    }

    /// Go back: restarts the current track if more than
    /// [`PREV_RESTART_THRESHOLD_SECONDS`] have elapsed, otherwise moves
    /// to the previous track in sequence order
    pub fn prev(&self) -> Result<()> {
        let position = self.transport.lock().unwrap().get_position();
        if position > PREV_RESTART_THRESHOLD_SECONDS {
            return self.transport.lock().unwrap().seek(0.0);
        }
        let target = self.sequencer.lock().unwrap().prev_track();
        match target {
            Some(index) => self.navigate_and_play(index),
            None => Ok(()),
        }
    }

    /// Jump directly to a track by 0-based index
    pub fn goto(&self, index: usize) -> Result<()> {
        self.sequencer.lock().unwrap().set_current_index(index)?;
        self.navigate_and_play(index)
    }

    /// The shared navigation recipe every `next`/`prev`/`goto` call uses:
    /// preserve whether the transport was playing, hand the sequencer's
    /// chosen index to the transport, and preload what comes after it
    /// only if playback is actually continuing.
    fn navigate_and_play(&self, index: usize) -> Result<()> {
        let total = self.sequencer.lock().unwrap().total_tracks();
        let was_playing = self.transport.lock().unwrap().get_state() == PlayerState::Playing;
        self.transport.lock().unwrap().navigate_to(index, was_playing)?;
        self.bus.dispatch(Event::TrackChange { index, total });
        if was_playing {
            self.request_preload();
        }
        Ok(())
    }

    /// Toggle shuffle. Deliberately never dispatches a `TrackChange`:
    /// shuffling reorders what comes *after* the current track, the
    /// current track itself never moves.
    pub fn shuffle(&self) {
        self.sequencer.lock().unwrap().toggle_shuffle();
        self.request_preload();
    }

    /// Cycle OFF -> TRACK -> ALL -> OFF, returning the new mode
    pub fn repeat(&self) -> RepeatMode {
        let mode = self.sequencer.lock().unwrap().cycle_repeat();
        self.request_preload();
        mode
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.sequencer.lock().unwrap().repeat_mode()
    }

    pub fn shuffle_on(&self) -> bool {
        self.sequencer.lock().unwrap().shuffle_on()
    }

    pub fn current_track_index(&self) -> Option<usize> {
        self.transport.lock().unwrap().get_current_track_index()
    }

    pub fn state(&self) -> PlayerState {
        self.transport.lock().unwrap().get_state()
    }

    pub fn position(&self) -> f64 {
        self.transport.lock().unwrap().get_position()
    }

    pub fn duration(&self) -> f64 {
        self.transport.lock().unwrap().get_duration()
    }

    pub fn track_count(&self) -> usize {
        self.sequencer.lock().unwrap().total_tracks()
    }

    /// Metadata for the currently bound track, if a disc with CD-Text is
    /// loaded and a track is bound
    pub fn current_track(&self) -> Option<Track> {
        let index = self.current_track_index()?;
        self.disc.lock().unwrap().as_ref()?.track(index).cloned()
    }

    /// 1-based position of the current track within the active play
    /// sequence (shuffle order when shuffle is on, disc order otherwise)
    pub fn playlist_position(&self) -> usize {
        self.sequencer.lock().unwrap().shuffle_position() + 1
    }

    /// Number of tracks in the active play sequence, i.e. the whole disc
    pub fn playlist_length(&self) -> usize {
        self.track_count()
    }

    /// Release the active transport's resources (threads, sockets)
    pub fn cleanup(&self) {
        self.transport.lock().unwrap().cleanup();
    }

    fn request_preload(&self) {
        let next = self.sequencer.lock().unwrap().get_next_for_preload();
        let _ = self.transport.lock().unwrap().prepare_next(next);
    }

    /// The unified end-of-track handler: both backends funnel every
    /// natural (and gapless) track transition through here
    fn handle_transport_event(&self, event: &Event) {
        match event {
            Event::TrackChange { index, total } => {
                let mut seq = self.sequencer.lock().unwrap();
                if seq.total_tracks() == *total {
                    let _ = seq.set_current_index(*index);
                }
                drop(seq);
                self.request_preload();
            }
            Event::StatusChange {
                reason: StatusReason::DiscEnd,
            } => {
                let next = self.sequencer.lock().unwrap().advance();
                if let Some(index) = next {
                    let total = self.sequencer.lock().unwrap().total_tracks();
                    let _ = self.transport.lock().unwrap().navigate_to(index, true);
                    self.bus.dispatch(Event::TrackChange { index, total });
                    self.request_preload();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Track;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeTransport {
        state: PlayerState,
        current: Option<usize>,
        track_count: usize,
        position: f64,
        bus: Option<Arc<ListenerBus>>,
    }

    impl FakeTransport {
        fn new(track_count: usize) -> Self {
            Self {
                state: PlayerState::Stopped,
                current: None,
                track_count,
                position: 0.0,
                bus: None,
            }
        }
    }

    impl AudioTransport for FakeTransport {
        fn play(&mut self) -> Result<()> {
            self.state = PlayerState::Playing;
            Ok(())
        }
        fn pause(&mut self) -> Result<()> {
            self.state = PlayerState::Paused;
            Ok(())
        }
        fn stop(&mut self) -> Result<()> {
            self.state = PlayerState::Stopped;
            self.position = 0.0;
            Ok(())
        }
        fn seek(&mut self, position_seconds: f64) -> Result<()> {
            self.position = position_seconds;
            Ok(())
        }
        fn navigate_to(&mut self, index: usize, auto_play: bool) -> Result<()> {
            self.current = Some(index);
            self.position = 0.0;
            self.state = if auto_play {
                PlayerState::Playing
            } else {
                PlayerState::Stopped
            };
            Ok(())
        }
        fn prepare_next(&mut self, _index: Option<usize>) -> Result<()> {
            Ok(())
        }
        fn get_position(&self) -> f64 {
            self.position
        }
        fn get_duration(&self) -> f64 {
            180.0
        }
        fn get_state(&self) -> PlayerState {
            self.state
        }
        fn get_current_track_index(&self) -> Option<usize> {
            self.current
        }
        fn get_track_count(&self) -> usize {
            self.track_count
        }
        fn cleanup(&mut self) {}
        fn attach_listener_bus(&mut self, bus: Arc<ListenerBus>) {
            self.bus = Some(bus);
        }
    }

    fn disc_with(tracks: usize) -> Disc {
        Disc {
            tracks: (1..=tracks as u32)
                .map(|n| Track {
                    number: n,
                    duration_frames: 75 * 180,
                    byte_offset: None,
                    title: None,
                    artist: None,
                    album: None,
                })
                .collect(),
            total_duration_frames: 75 * 180 * tracks as u32,
            cdtext_present: false,
        }
    }

    #[test]
    fn load_disc_binds_and_autoplays_track_one() {
        let controller = Controller::new(Box::new(FakeTransport::new(3)), AppConfig::default());
        controller.load(disc_with(3), 0).unwrap();
        assert_eq!(controller.current_track_index(), Some(0));
        assert_eq!(controller.state(), PlayerState::Playing);
    }

    #[test]
    fn zero_track_disc_never_autoplays() {
        let controller = Controller::new(Box::new(FakeTransport::new(0)), AppConfig::default());
        controller.load(disc_with(0), 0).unwrap();
        assert_eq!(controller.current_track_index(), None);
        assert_eq!(controller.state(), PlayerState::Stopped);
    }

    #[test]
    fn autoplay_disabled_binds_without_playing() {
        let mut config = AppConfig::default();
        config.autoplay_on_load = crate::config::AutoplaySetting::Blanket(false);
        let controller = Controller::new(Box::new(FakeTransport::new(2)), config);
        controller.load(disc_with(2), 0).unwrap();
        assert_eq!(controller.current_track_index(), Some(0));
        assert_eq!(controller.state(), PlayerState::Stopped);
    }

    #[test]
    fn next_advances_sequencer_and_transport_together() {
        let controller = Controller::new(Box::new(FakeTransport::new(3)), AppConfig::default());
        controller.load(disc_with(3), 0).unwrap();
        controller.next().unwrap();
        assert_eq!(controller.current_track_index(), Some(1));
    }

    #[test]
    fn prev_within_threshold_moves_back_a_track() {
        let controller = Controller::new(Box::new(FakeTransport::new(3)), AppConfig::default());
        controller.load(disc_with(3), 0).unwrap();
        controller.next().unwrap();
        controller.prev().unwrap();
        assert_eq!(controller.current_track_index(), Some(0));
    }

    #[test]
    fn prev_past_threshold_restarts_current_track() {
        let controller = Controller::new(Box::new(FakeTransport::new(3)), AppConfig::default());
        controller.load(disc_with(3), 0).unwrap();
        controller.next().unwrap();
        controller.seek(10.0).unwrap();
        controller.prev().unwrap();
        assert_eq!(controller.current_track_index(), Some(1));
        assert_eq!(controller.position(), 0.0);
    }

    #[test]
    fn toggle_shuffle_never_emits_a_track_change() {
        let controller = Controller::new(Box::new(FakeTransport::new(3)), AppConfig::default());
        controller.load(disc_with(3), 0).unwrap();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        controller.subscribe(Arc::new(move |event: &Event| {
            if matches!(event, Event::TrackChange { .. }) {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }
        }));
        controller.shuffle();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn current_track_exposes_bound_track_metadata() {
        let controller = Controller::new(Box::new(FakeTransport::new(2)), AppConfig::default());
        let mut disc = disc_with(2);
        disc.tracks[1].title = Some("Track Two".to_string());
        controller.load(disc, 0).unwrap();
        controller.next().unwrap();
        assert_eq!(controller.current_track().unwrap().title.as_deref(), Some("Track Two"));
    }

    #[test]
    fn playlist_position_and_length_reflect_disc_order_without_shuffle() {
        let controller = Controller::new(Box::new(FakeTransport::new(3)), AppConfig::default());
        controller.load(disc_with(3), 0).unwrap();
        assert_eq!(controller.playlist_position(), 1);
        assert_eq!(controller.playlist_length(), 3);
        controller.next().unwrap();
        assert_eq!(controller.playlist_position(), 2);
    }

    #[test]
    fn disc_end_event_drives_repeat_all_wraparound() {
        let controller = Controller::new(Box::new(FakeTransport::new(2)), AppConfig::default());
        controller.load(disc_with(2), 0).unwrap();
        controller.repeat(); // TRACK
        controller.repeat(); // ALL
        controller.next().unwrap(); // -> track 1 (index 1)
        controller.handle_transport_event(&Event::StatusChange {
            reason: StatusReason::DiscEnd,
        });
        assert_eq!(controller.current_track_index(), Some(0));
    }
}
