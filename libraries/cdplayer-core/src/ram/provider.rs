//! Source of decoded PCM for RamPlayer
//!
//! Grounded on `soul-playback::source::AudioSource`: a small trait the
//! player depends on without caring how the bytes got into RAM (ripping
//! and RAM-image management are out of scope here; something external
//! populates the image and implements this trait over it).

use std::sync::Arc;

/// Supplies whole-track PCM buffers already resident in RAM
///
/// Implementations are expected to be cheap to clone/share (`Arc<[u8]>`
/// avoids copying track data between the preload step and the playback
/// thread) and safe to call from any thread.
pub trait PcmProvider: Send + Sync {
    /// The interleaved 16-bit stereo PCM for a track, by 0-based index
    ///
    /// Returns `None` if the index is out of range or the image is not
    /// (yet) resident for that track.
    fn track_pcm(&self, index: usize) -> Option<Arc<[u8]>>;

    /// Number of tracks this provider can serve
    fn track_count(&self) -> usize;
}

#[cfg(test)]
pub(crate) struct InMemoryProvider {
    tracks: Vec<Arc<[u8]>>,
}

#[cfg(test)]
impl InMemoryProvider {
    pub(crate) fn new(tracks: Vec<Vec<u8>>) -> Self {
        Self {
            tracks: tracks.into_iter().map(Arc::from).collect(),
        }
    }
}

#[cfg(test)]
impl PcmProvider for InMemoryProvider {
    fn track_pcm(&self, index: usize) -> Option<Arc<[u8]>> {
        self.tracks.get(index).cloned()
    }

    fn track_count(&self) -> usize {
        self.tracks.len()
    }
}
