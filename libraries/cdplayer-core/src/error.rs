//! Error types for the playback engine

use thiserror::Error;

/// Errors raised by the playback engine
///
/// Variants are grouped by failure domain: precondition violations are
/// no-ops at the call site and never reach here as a propagated error
/// in normal operation, but are still represented so the listener bus
/// can carry a message.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No disc is currently loaded
    #[error("no disc loaded")]
    NoDiscLoaded,

    /// Track index is out of range for the current disc
    #[error("track index out of range: {0}")]
    IndexOutOfRange(usize),

    /// Seek target is outside the current track
    #[error("seek position out of range: {0}s (track duration {1}s)")]
    InvalidSeekPosition(f64, f64),

    /// The audio sink failed to open or write
    #[error("audio sink error: {0}")]
    AudioSink(String),

    /// The media engine IPC socket failed
    #[error("media engine IPC error: {0}")]
    EngineIpc(String),

    /// No audio device is available at setup time
    #[error("no audio device available")]
    NoAudioDevice,

    /// The streaming media engine binary could not be started
    #[error("media engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Underlying IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type used throughout the engine
pub type Result<T> = std::result::Result<T, CoreError>;
