//! Gapless double-buffered PCM player
//!
//! Owns one dedicated playback thread for the life of the player; the
//! thread holds the `PcmSink` open across track boundaries so a
//! natural end-of-track never closes the device. A second buffer,
//! handed over ahead of time via [`AudioTransport::prepare_next`], lets
//! the thread swap straight into the next track with no silence gap.
//!
//! The concurrency shape follows `soul-audio-desktop::output::CpalOutput`:
//! a command channel into the audio thread plus a small snapshot struct
//! queries read without touching the channel, generalized here because
//! the sink is a blocking write loop rather than a callback.

pub mod provider;
pub mod sink;

use crate::error::{CoreError, Result};
use crate::events::{Event, ListenerBus, StatusReason};
use crate::ram::provider::PcmProvider;
use crate::ram::sink::PcmSink;
use crate::transport::AudioTransport;
use crate::types::{PlayerState, BYTES_PER_SECOND};
use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

enum Command {
    Play,
    Pause,
    Stop,
    Seek(u64),
    Navigate(usize, Arc<[u8]>, bool),
    PrepareNext(usize, Arc<[u8]>),
    ClearNext,
    Shutdown,
}

#[derive(Clone, Copy)]
struct Snapshot {
    state: PlayerState,
    current_index: Option<usize>,
    position_bytes: u64,
    duration_bytes: u64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            state: PlayerState::Stopped,
            current_index: None,
            position_bytes: 0,
            duration_bytes: 0,
        }
    }
}

/// RAM-backed, gapless playback transport
pub struct RamPlayer {
    tx: Sender<Command>,
    snapshot: Arc<Mutex<Snapshot>>,
    bus_slot: Arc<Mutex<Option<Arc<ListenerBus>>>>,
    provider: Arc<dyn PcmProvider>,
    track_count: usize,
    thread: Option<JoinHandle<()>>,
}

impl RamPlayer {
    /// Start the playback thread against `sink`, serving buffers from `provider`
    pub fn new(
        sink: Box<dyn PcmSink>,
        provider: Arc<dyn PcmProvider>,
        buffer_chunk_frames: u32,
    ) -> Self {
        let (tx, rx) = unbounded();
        let snapshot = Arc::new(Mutex::new(Snapshot::default()));
        let bus_slot: Arc<Mutex<Option<Arc<ListenerBus>>>> = Arc::new(Mutex::new(None));
        let track_count = provider.track_count();

        let thread_snapshot = Arc::clone(&snapshot);
        let thread_bus = Arc::clone(&bus_slot);
        let chunk_bytes = (buffer_chunk_frames as usize) * 4;
        let thread = std::thread::Builder::new()
            .name("ram-player".into())
            .spawn(move || run(sink, rx, thread_snapshot, thread_bus, track_count, chunk_bytes))
            .expect("spawn ram-player thread");

        Self {
            tx,
            snapshot,
            bus_slot,
            provider,
            track_count,
            thread: Some(thread),
        }
    }

    fn snapshot(&self) -> Snapshot {
        *self.snapshot.lock().unwrap()
    }
}

fn update_snapshot(snapshot: &Arc<Mutex<Snapshot>>, f: impl FnOnce(&mut Snapshot)) {
    let mut guard = snapshot.lock().unwrap();
    f(&mut guard);
}

fn run(
    mut sink: Box<dyn PcmSink>,
    rx: Receiver<Command>,
    snapshot: Arc<Mutex<Snapshot>>,
    bus_slot: Arc<Mutex<Option<Arc<ListenerBus>>>>,
    track_count: usize,
    chunk_bytes: usize,
) {
    let mut current_index: Option<usize> = None;
    let mut current_buffer: Option<Arc<[u8]>> = None;
    let mut next_buffer: Option<(usize, Arc<[u8]>)> = None;
    let mut position: u64 = 0;
    let mut playing = false;
    // Tracked alongside `playing` (which collapses Paused and Stopped to
    // the same "not writing" state) so Pause can tell the two apart and
    // no-op rather than illegally jumping STOPPED -> PAUSED.
    let mut state = PlayerState::Stopped;

    'outer: loop {
        let cmd = if playing {
            match rx.try_recv() {
                Ok(c) => Some(c),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break 'outer,
            }
        } else {
            match rx.recv() {
                Ok(c) => Some(c),
                Err(_) => break 'outer,
            }
        };

        if let Some(cmd) = cmd {
            match cmd {
                Command::Shutdown => break 'outer,
                Command::Play => {
                    playing = current_buffer.is_some();
                    state = if playing {
                        PlayerState::Playing
                    } else {
                        PlayerState::Stopped
                    };
                    update_snapshot(&snapshot, |s| s.state = state);
                }
                Command::Pause => {
                    // No-op outside PLAYING: STOPPED -> PAUSED is not a
                    // valid transition, and pausing an already-paused
                    // player must not disturb anything.
                    if state == PlayerState::Playing {
                        playing = false;
                        state = PlayerState::Paused;
                        update_snapshot(&snapshot, |s| s.state = state);
                    }
                }
                Command::Stop => {
                    playing = false;
                    position = 0;
                    state = PlayerState::Stopped;
                    update_snapshot(&snapshot, |s| {
                        s.state = PlayerState::Stopped;
                        s.position_bytes = 0;
                    });
                }
                Command::Seek(offset) => {
                    position = offset;
                    update_snapshot(&snapshot, |s| s.position_bytes = offset);
                }
                Command::Navigate(idx, buf, auto_play) => {
                    let duration_bytes = buf.len() as u64;
                    current_index = Some(idx);
                    current_buffer = Some(buf);
                    next_buffer = None;
                    position = 0;
                    playing = auto_play;
                    state = if auto_play {
                        PlayerState::Playing
                    } else {
                        PlayerState::Stopped
                    };
                    update_snapshot(&snapshot, |s| {
                        s.current_index = Some(idx);
                        s.position_bytes = 0;
                        s.duration_bytes = duration_bytes;
                        s.state = state;
                    });
                }
                Command::PrepareNext(idx, buf) => {
                    next_buffer = Some((idx, buf));
                }
                Command::ClearNext => {
                    next_buffer = None;
                }
            }
        }

        if !playing {
            continue;
        }

        let Some(buf) = current_buffer.clone() else {
            playing = false;
            continue;
        };
        let remaining = buf.len().saturating_sub(position as usize);
        if remaining == 0 {
            if let Some((idx, next)) = next_buffer.take() {
                let duration_bytes = next.len() as u64;
                current_index = Some(idx);
                current_buffer = Some(next);
                position = 0;
                update_snapshot(&snapshot, |s| {
                    s.current_index = Some(idx);
                    s.position_bytes = 0;
                    s.duration_bytes = duration_bytes;
                });
                if let Some(bus) = bus_slot.lock().unwrap().as_ref() {
                    bus.dispatch(Event::TrackChange {
                        index: idx,
                        total: track_count,
                    });
                }
            } else {
                playing = false;
                position = 0;
                state = PlayerState::Stopped;
                update_snapshot(&snapshot, |s| {
                    s.state = PlayerState::Stopped;
                    s.position_bytes = 0;
                });
                if let Some(bus) = bus_slot.lock().unwrap().as_ref() {
                    bus.dispatch(Event::StatusChange {
                        reason: StatusReason::DiscEnd,
                    });
                }
            }
            continue;
        }

        let take = remaining.min(chunk_bytes);
        let start = position as usize;
        match sink.write(&buf[start..start + take]) {
            Ok(()) => {
                position += take as u64;
                update_snapshot(&snapshot, |s| s.position_bytes = position);
            }
            Err(e) => {
                log::error!("ram sink write failed: {e}");
                playing = false;
                state = PlayerState::Stopped;
                update_snapshot(&snapshot, |s| s.state = PlayerState::Stopped);
                if let Some(bus) = bus_slot.lock().unwrap().as_ref() {
                    bus.dispatch(Event::StatusChange {
                        reason: StatusReason::Error,
                    });
                }
            }
        }
    }
    let _ = sink.drain();
}

impl AudioTransport for RamPlayer {
    fn play(&mut self) -> Result<()> {
        self.tx
            .send(Command::Play)
            .map_err(|_| CoreError::AudioSink("ram player thread gone".into()))
    }

    fn pause(&mut self) -> Result<()> {
        self.tx
            .send(Command::Pause)
            .map_err(|_| CoreError::AudioSink("ram player thread gone".into()))
    }

    fn stop(&mut self) -> Result<()> {
        self.tx
            .send(Command::Stop)
            .map_err(|_| CoreError::AudioSink("ram player thread gone".into()))
    }

    fn seek(&mut self, position_seconds: f64) -> Result<()> {
        let snap = self.snapshot();
        let duration_seconds = snap.duration_bytes as f64 / BYTES_PER_SECOND as f64;
        if position_seconds < 0.0 || position_seconds > duration_seconds {
            log::warn!(
                "rejected seek to {position_seconds}s (track duration {duration_seconds}s)"
            );
            return Ok(());
        }
        let raw = (position_seconds * BYTES_PER_SECOND as f64) as u64;
        let aligned = raw - (raw % 4);
        self.tx
            .send(Command::Seek(aligned))
            .map_err(|_| CoreError::AudioSink("ram player thread gone".into()))
    }

    fn navigate_to(&mut self, index: usize, auto_play: bool) -> Result<()> {
        let buf = self
            .provider
            .track_pcm(index)
            .ok_or(CoreError::IndexOutOfRange(index))?;
        self.tx
            .send(Command::Navigate(index, buf, auto_play))
            .map_err(|_| CoreError::AudioSink("ram player thread gone".into()))
    }

    fn prepare_next(&mut self, index: Option<usize>) -> Result<()> {
        match index {
            Some(idx) => {
                let buf = self
                    .provider
                    .track_pcm(idx)
                    .ok_or(CoreError::IndexOutOfRange(idx))?;
                self.tx
                    .send(Command::PrepareNext(idx, buf))
                    .map_err(|_| CoreError::AudioSink("ram player thread gone".into()))
            }
            None => self
                .tx
                .send(Command::ClearNext)
                .map_err(|_| CoreError::AudioSink("ram player thread gone".into())),
        }
    }

    fn get_position(&self) -> f64 {
        self.snapshot().position_bytes as f64 / BYTES_PER_SECOND as f64
    }

    fn get_duration(&self) -> f64 {
        self.snapshot().duration_bytes as f64 / BYTES_PER_SECOND as f64
    }

    fn get_state(&self) -> PlayerState {
        self.snapshot().state
    }

    fn get_current_track_index(&self) -> Option<usize> {
        self.snapshot().current_index
    }

    fn get_track_count(&self) -> usize {
        self.track_count
    }

    fn cleanup(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }

    fn attach_listener_bus(&mut self, bus: Arc<ListenerBus>) {
        *self.bus_slot.lock().unwrap() = Some(bus);
    }
}

impl Drop for RamPlayer {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ram::provider::InMemoryProvider;
    use crate::ram::sink::RecordingSink;
    use std::time::Duration;

    fn wait_until(mut pred: impl FnMut() -> bool) {
        for _ in 0..200 {
            if pred() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("condition never became true");
    }

    #[test]
    fn plays_through_one_track_and_stops_with_no_next() {
        let provider = Arc::new(InMemoryProvider::new(vec![vec![0u8; 16]]));
        let mut player = RamPlayer::new(Box::new(RecordingSink::new()), provider, 4);
        player.navigate_to(0, true).unwrap();
        wait_until(|| player.get_state() == PlayerState::Stopped);
        assert_eq!(player.get_position(), 0.0);
    }

    #[test]
    fn gapless_swap_advances_to_preloaded_track() {
        let provider = Arc::new(InMemoryProvider::new(vec![vec![1u8; 8], vec![2u8; 8]]));
        let mut player = RamPlayer::new(Box::new(RecordingSink::new()), provider, 4);
        player.navigate_to(0, false).unwrap();
        player.prepare_next(Some(1)).unwrap();
        player.play().unwrap();
        wait_until(|| player.get_current_track_index() == Some(1));
    }

    #[test]
    fn seek_past_end_is_a_silent_no_op() {
        let provider = Arc::new(InMemoryProvider::new(vec![vec![0u8; 8]]));
        let mut player = RamPlayer::new(Box::new(RecordingSink::new()), provider, 4);
        player.navigate_to(0, false).unwrap();
        player.seek(-1.0).unwrap();
        assert_eq!(player.get_position(), 0.0);
        player.seek(999.0).unwrap();
        assert_eq!(player.get_position(), 0.0);
    }

    #[test]
    fn pause_on_a_stopped_player_is_a_no_op() {
        let provider = Arc::new(InMemoryProvider::new(vec![vec![0u8; 16]]));
        let mut player = RamPlayer::new(Box::new(RecordingSink::new()), provider, 4);
        player.pause().unwrap();
        assert_eq!(player.get_state(), PlayerState::Stopped);

        player.navigate_to(0, false).unwrap();
        wait_until(|| player.get_current_track_index() == Some(0));
        player.pause().unwrap();
        assert_eq!(player.get_state(), PlayerState::Stopped);
    }

    #[test]
    fn repeated_pause_is_idempotent() {
        let provider = Arc::new(InMemoryProvider::new(vec![vec![0u8; 64]]));
        let mut player = RamPlayer::new(Box::new(RecordingSink::new()), provider, 4);
        player.navigate_to(0, false).unwrap();
        player.play().unwrap();
        for _ in 0..100 {
            player.pause().unwrap();
        }
        assert_eq!(player.get_state(), PlayerState::Paused);
    }
}
