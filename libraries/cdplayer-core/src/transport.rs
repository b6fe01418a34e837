//! Abstract contract shared by the two playback backends
//!
//! RamPlayer and StreamPlayer both implement the same trait so the
//! Controller never special-cases which one is active. A trait object
//! (`Box<dyn AudioTransport>`) keeps that polymorphism at the type
//! level rather than branching on backend identity, the same pattern
//! `soul-playback::source::AudioSource` uses to abstract over decoders.

use crate::error::Result;
use crate::events::ListenerBus;
use crate::types::PlayerState;
use std::sync::Arc;

/// Contract a playback backend must satisfy
///
/// Implementors drive their own thread(s) internally; every method here
/// is expected to return quickly (posting to a command channel or
/// taking a short-held mutex), never to block for the duration of
/// playback.
pub trait AudioTransport: Send {
    /// Begin or resume playback of the currently bound track
    fn play(&mut self) -> Result<()>;

    /// Suspend playback, preserving position
    fn pause(&mut self) -> Result<()>;

    /// Stop playback and release the bound track
    fn stop(&mut self) -> Result<()>;

    /// Seek within the currently bound track, in seconds from its start
    ///
    /// A target outside `[0, duration]` is a precondition violation: a
    /// no-op, logged, never a propagated error.
    fn seek(&mut self, position_seconds: f64) -> Result<()>;

    /// Bind the transport's current track to `index` (0-based)
    ///
    /// When `auto_play` is set, playback starts immediately from
    /// position 0; otherwise the track is armed but left at STOPPED.
    fn navigate_to(&mut self, index: usize, auto_play: bool) -> Result<()>;

    /// Hint which track to preload for a gapless transition, if any
    fn prepare_next(&mut self, index: Option<usize>) -> Result<()>;

    /// Current playhead position within the bound track, in seconds
    fn get_position(&self) -> f64;

    /// Duration of the bound track, in seconds
    fn get_duration(&self) -> f64;

    /// Current transport state
    fn get_state(&self) -> PlayerState;

    /// 0-based index of the currently bound track, if any
    fn get_current_track_index(&self) -> Option<usize>;

    /// Number of tracks known to this transport
    fn get_track_count(&self) -> usize;

    /// Release backend resources (threads, sockets, sink handles)
    ///
    /// Called once, from the Controller's shutdown path. Implementors
    /// must tolerate being dropped without `cleanup` having been called
    /// (panics during unwind must not propagate from `Drop`).
    fn cleanup(&mut self);

    /// Wire this transport to the shared event bus so it can raise
    /// `StatusChange`/`TrackChange` events when its own thread detects
    /// natural end-of-track, independent of a Controller-initiated call
    fn attach_listener_bus(&mut self, bus: Arc<ListenerBus>);
}
