//! Synthetic PCM source used in place of a real ripper
//!
//! Disc ripping is explicitly out of scope for the engine crate; this
//! stands in for it so the CLI has something to hand `RamPlayer` to
//! play. `scan` fills it with silence sized to match a synthetic TOC
//! rather than reading an actual disc. Grounded on
//! `cdplayer_core::ram::provider::InMemoryProvider`, the engine's own
//! in-memory test double, just mutable so `scan` can repopulate it
//! after the transport has already been constructed.

use cdplayer_core::ram::provider::PcmProvider;
use cdplayer_core::types::BYTES_PER_SECOND;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct DemoProvider {
    tracks: Mutex<Vec<Arc<[u8]>>>,
}

impl DemoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the served tracks with `track_count` buffers of silence,
    /// each `seconds_per_track` seconds long
    pub fn rescan(&self, track_count: u32, seconds_per_track: u32) {
        let bytes_per_track = (BYTES_PER_SECOND * u64::from(seconds_per_track)) as usize;
        let tracks = (0..track_count)
            .map(|_| Arc::from(vec![0u8; bytes_per_track]))
            .collect();
        *self.tracks.lock().unwrap() = tracks;
    }
}

impl PcmProvider for DemoProvider {
    fn track_pcm(&self, index: usize) -> Option<Arc<[u8]>> {
        self.tracks.lock().unwrap().get(index).cloned()
    }

    fn track_count(&self) -> usize {
        self.tracks.lock().unwrap().len()
    }
}
