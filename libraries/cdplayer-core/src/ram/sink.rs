//! The blocking PCM sink RamPlayer writes to
//!
//! Gapless playback needs a sink held open across track boundaries so
//! a track transition never closes and reopens the device. `cpal`'s
//! callback-driven model (used elsewhere in this codebase) does not fit
//! that shape, so production playback goes straight through the `alsa`
//! crate instead; an in-memory recorder stands in for it in tests and
//! whenever the `alsa-backend` feature is off.

use crate::error::{CoreError, Result};

/// A destination for raw interleaved 16-bit stereo PCM at 44.1kHz
///
/// `write` blocks until the sink has accepted the data (or buffered as
/// much as its internal period allows), mirroring a real ALSA blocking
/// write. Implementors must be safe to write to from a single dedicated
/// playback thread.
pub trait PcmSink: Send {
    /// Write one buffer's worth of interleaved PCM bytes
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Block until previously written frames have finished playing
    fn drain(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory `PcmSink` used by tests and as the fallback when no ALSA
/// device is configured
#[derive(Default)]
pub struct RecordingSink {
    written: Vec<u8>,
    closed: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far, for test assertions
    pub fn recorded(&self) -> &[u8] {
        &self.written
    }
}

impl PcmSink for RecordingSink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(CoreError::AudioSink("sink closed".into()));
        }
        self.written.extend_from_slice(data);
        Ok(())
    }
}

#[cfg(feature = "alsa-backend")]
mod alsa_backend {
    use super::*;
    use alsa::pcm::{Access, Format, HwParams, PCM};
    use alsa::{Direction, ValueOr};
    use crate::types::BYTES_PER_SECOND;

    /// Production sink backed by a real ALSA PCM device
    pub struct AlsaSink {
        pcm: PCM,
    }

    impl AlsaSink {
        /// Open `device` configured for 44.1kHz/16-bit/stereo playback
        pub fn open(device: &str, buffer_frames: u32) -> Result<Self> {
            let pcm = PCM::new(device, Direction::Playback, false)
                .map_err(|e| CoreError::AudioSink(format!("open {device}: {e}")))?;
            {
                let hwp = HwParams::any(&pcm)
                    .map_err(|e| CoreError::AudioSink(format!("hwparams: {e}")))?;
                hwp.set_channels(2)
                    .map_err(|e| CoreError::AudioSink(format!("channels: {e}")))?;
                hwp.set_rate(44_100, ValueOr::Nearest)
                    .map_err(|e| CoreError::AudioSink(format!("rate: {e}")))?;
                hwp.set_format(Format::s16())
                    .map_err(|e| CoreError::AudioSink(format!("format: {e}")))?;
                hwp.set_access(Access::RWInterleaved)
                    .map_err(|e| CoreError::AudioSink(format!("access: {e}")))?;
                hwp.set_buffer_size(i64::from(buffer_frames) * 4)
                    .map_err(|e| CoreError::AudioSink(format!("buffer size: {e}")))?;
                pcm.hw_params(&hwp)
                    .map_err(|e| CoreError::AudioSink(format!("hw_params: {e}")))?;
            }
            pcm.prepare()
                .map_err(|e| CoreError::AudioSink(format!("prepare: {e}")))?;
            let _ = BYTES_PER_SECOND;
            Ok(Self { pcm })
        }
    }

    impl PcmSink for AlsaSink {
        fn write(&mut self, data: &[u8]) -> Result<()> {
            let io = self
                .pcm
                .io_i16()
                .map_err(|e| CoreError::AudioSink(format!("io: {e}")))?;
            let samples: Vec<i16> = data
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect();
            io.writei(&samples)
                .map_err(|e| CoreError::AudioSink(format!("writei: {e}")))?;
            Ok(())
        }

        fn drain(&mut self) -> Result<()> {
            self.pcm
                .drain()
                .map_err(|e| CoreError::AudioSink(format!("drain: {e}")))
        }
    }
}

#[cfg(feature = "alsa-backend")]
pub use alsa_backend::AlsaSink;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_accumulates_writes() {
        let mut sink = RecordingSink::new();
        sink.write(&[1, 2, 3, 4]).unwrap();
        sink.write(&[5, 6]).unwrap();
        assert_eq!(sink.recorded(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn closed_sink_rejects_writes() {
        let mut sink = RecordingSink::new();
        sink.closed = true;
        assert!(sink.write(&[1, 2]).is_err());
    }
}
