//! Core data types shared across the engine

use serde::{Deserialize, Serialize};

/// CD frames per second (1 frame = 1/75 s, the CD audio frame rate)
pub const FRAMES_PER_SECOND: u32 = 75;

/// Bytes per second of CD audio (44.1kHz, 16-bit, stereo)
pub const BYTES_PER_SECOND: u64 = 44_100 * 2 * 2;

/// A single track on a disc
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// 1-based track number as printed on the disc
    pub number: u32,

    /// Duration in CD frames (1 frame = 1/75 s)
    pub duration_frames: u32,

    /// Byte offset of this track's first sample within the RAM PCM image
    ///
    /// Only meaningful in RAM mode; `None` when the disc was loaded for
    /// streaming playback.
    pub byte_offset: Option<u64>,

    /// Track title, if CD-Text or another metadata source supplied one
    pub title: Option<String>,

    /// Track artist
    pub artist: Option<String>,

    /// Album name
    pub album: Option<String>,
}

impl Track {
    /// Duration of this track in seconds
    pub fn duration_seconds(&self) -> f64 {
        f64::from(self.duration_frames) / f64::from(FRAMES_PER_SECOND)
    }
}

/// An ordered sequence of tracks making up a loaded disc
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disc {
    /// Tracks in play order (index 0 = track 1)
    pub tracks: Vec<Track>,

    /// Total duration of the disc in CD frames
    pub total_duration_frames: u32,

    /// Whether CD-Text was present on the disc
    pub cdtext_present: bool,
}

impl Disc {
    /// Number of tracks on the disc
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Look up a track by 0-based index
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }
}

/// Current transport playback state
///
/// Transitions: STOPPED <-> PLAYING, PLAYING <-> PAUSED,
/// PAUSED -> STOPPED (never PAUSED -> STOPPED directly in reverse; a
/// paused transport must pass through PLAYING to resume before stopping
/// is meaningful as a "was playing" fact, though `stop()` itself is
/// always accepted from any state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    /// No audio flowing, playhead at the start of the bound track (or unbound)
    Stopped,
    /// Audio flowing
    Playing,
    /// Audio suspended, position preserved
    Paused,
}

/// Repeat mode, cycled OFF -> TRACK -> ALL -> OFF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatMode {
    /// No repeat; disc end stops playback
    Off,
    /// Repeat the current track indefinitely
    Track,
    /// Repeat the whole disc (or shuffle cycle) indefinitely
    All,
}

impl RepeatMode {
    /// Advance to the next mode in the OFF -> TRACK -> ALL -> OFF cycle
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::Track,
            RepeatMode::Track => RepeatMode::All,
            RepeatMode::All => RepeatMode::Off,
        }
    }

    /// The two MCUB flags `(repeat, single)` for this mode
    pub fn mcub_flags(self) -> (bool, bool) {
        match self {
            RepeatMode::Off => (false, false),
            RepeatMode::Track => (true, true),
            RepeatMode::All => (true, false),
        }
    }
}
