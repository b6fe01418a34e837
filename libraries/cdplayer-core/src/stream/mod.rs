//! Transport that drives an external media engine process
//!
//! The engine owns decode/output entirely; this module's job is
//! process lifecycle, chapter-index mapping (one chapter per track),
//! and a monitor thread that polls the engine's own status so natural
//! end-of-chapter and mid-track engine crashes surface as the same
//! `AudioTransport`/listener-bus events RamPlayer raises.

pub mod ipc;

use crate::error::{CoreError, Result};
use crate::events::{Event, ListenerBus, StatusReason};
use crate::stream::ipc::EngineIpc;
use crate::transport::AudioTransport;
use crate::types::PlayerState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Child, Command as ProcessCommand};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// One line sent down the engine's control socket: set/get a named
/// property, load the disc URI, stop, or quit.
#[derive(Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum EngineRequest {
    SetProperty {
        property: &'static str,
        value: serde_json::Value,
    },
    GetProperty {
        property: &'static str,
    },
    Load {
        uri: String,
    },
    Stop,
    Quit,
}

#[derive(Deserialize, Default)]
struct EngineReply {
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

fn get_property<T: DeserializeOwned>(ipc: &Mutex<EngineIpc>, property: &'static str) -> Result<T> {
    let reply: EngineReply = ipc
        .lock()
        .unwrap()
        .request(&EngineRequest::GetProperty { property })?;
    if !reply.ok {
        return Err(CoreError::EngineIpc(
            reply.error.unwrap_or_else(|| format!("get {property} failed")),
        ));
    }
    serde_json::from_value(reply.value).map_err(|e| CoreError::EngineIpc(e.to_string()))
}

fn set_property(ipc: &Mutex<EngineIpc>, property: &'static str, value: impl Serialize) -> Result<()> {
    let value = serde_json::to_value(value).map_err(|e| CoreError::EngineIpc(e.to_string()))?;
    let reply: EngineReply = ipc
        .lock()
        .unwrap()
        .request(&EngineRequest::SetProperty { property, value })?;
    if reply.ok {
        Ok(())
    } else {
        Err(CoreError::EngineIpc(
            reply.error.unwrap_or_else(|| format!("set {property} failed")),
        ))
    }
}

/// Cumulative per-track start offsets into the engine's single absolute
/// timeline, e.g. `[0.0, 180.0, 380.0]` for tracks of length 180/200/150s.
fn chapter_starts(track_durations_seconds: &[f64]) -> Vec<f64> {
    let mut starts = Vec::with_capacity(track_durations_seconds.len());
    let mut acc = 0.0;
    for &d in track_durations_seconds {
        starts.push(acc);
        acc += d;
    }
    starts
}

/// Whether the monitor's startup wait (spec: "stuck at 00:00" until the
/// engine's position moves or 20s pass) has cleared.
fn clears_startup_wait(intra_track_seconds: f64, deadline: Option<Instant>, now: Instant) -> bool {
    intra_track_seconds > 0.1 || deadline.map_or(true, |d| now >= d)
}

#[derive(Clone, Copy)]
struct Snapshot {
    state: PlayerState,
    current_index: Option<usize>,
    position_seconds: f64,
    duration_seconds: f64,
    /// False until the startup wait clears (see `monitor_loop`), so a
    /// caller reading position right after `navigate_to` sees 0.0
    /// rather than the engine's own pre-seek buffering position.
    ready: bool,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            state: PlayerState::Stopped,
            current_index: None,
            position_seconds: 0.0,
            duration_seconds: 0.0,
            ready: false,
        }
    }
}

/// Transport backed by a long-lived external media engine process
pub struct StreamPlayer {
    ipc: Arc<Mutex<EngineIpc>>,
    process: Child,
    snapshot: Arc<Mutex<Snapshot>>,
    bus_slot: Arc<Mutex<Option<Arc<ListenerBus>>>>,
    track_count: usize,
    track_durations: Vec<f64>,
    chapter_start: Vec<f64>,
    disc_uri: String,
    loaded: bool,
    startup_timeout: Duration,
    startup_deadline: Arc<Mutex<Option<Instant>>>,
    stop_monitor: Arc<AtomicBool>,
    monitor_thread: Option<JoinHandle<()>>,
}

impl StreamPlayer {
    /// Launch `engine_binary socket_path`, wait for it to bind, and start
    /// polling its status. `track_durations_seconds` gives the TOC's
    /// per-track lengths, from which the engine's chapter-to-absolute-time
    /// mapping (`chapter_start`) is derived.
    pub fn spawn(
        engine_binary: &Path,
        socket_path: &Path,
        disc_uri: &str,
        track_durations_seconds: &[f64],
        startup_timeout: Duration,
    ) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let _ = std::fs::remove_file(socket_path);

        let process = ProcessCommand::new(engine_binary)
            .arg(socket_path)
            .spawn()
            .map_err(|e| CoreError::EngineUnavailable(e.to_string()))?;

        let ipc = EngineIpc::connect(socket_path, startup_timeout)?;
        let ipc = Arc::new(Mutex::new(ipc));
        let snapshot = Arc::new(Mutex::new(Snapshot::default()));
        let bus_slot: Arc<Mutex<Option<Arc<ListenerBus>>>> = Arc::new(Mutex::new(None));
        let stop_monitor = Arc::new(AtomicBool::new(false));
        let startup_deadline: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
        let track_count = track_durations_seconds.len();
        let track_durations = track_durations_seconds.to_vec();
        let chapter_start = chapter_starts(track_durations_seconds);

        let monitor_thread = {
            let ipc = Arc::clone(&ipc);
            let snapshot = Arc::clone(&snapshot);
            let bus_slot = Arc::clone(&bus_slot);
            let stop_monitor = Arc::clone(&stop_monitor);
            let startup_deadline = Arc::clone(&startup_deadline);
            let track_durations = track_durations.clone();
            std::thread::Builder::new()
                .name("stream-player-monitor".into())
                .spawn(move || {
                    monitor_loop(
                        ipc,
                        snapshot,
                        bus_slot,
                        track_count,
                        track_durations,
                        startup_deadline,
                        stop_monitor,
                    )
                })
                .expect("spawn stream-player monitor thread")
        };

        Ok(Self {
            ipc,
            process,
            snapshot,
            bus_slot,
            track_count,
            track_durations,
            chapter_start,
            disc_uri: disc_uri.to_string(),
            loaded: false,
            startup_timeout,
            startup_deadline,
            stop_monitor,
            monitor_thread: Some(monitor_thread),
        })
    }
}

fn monitor_loop(
    ipc: Arc<Mutex<EngineIpc>>,
    snapshot: Arc<Mutex<Snapshot>>,
    bus_slot: Arc<Mutex<Option<Arc<ListenerBus>>>>,
    track_count: usize,
    track_durations: Vec<f64>,
    startup_deadline: Arc<Mutex<Option<Instant>>>,
    stop: Arc<AtomicBool>,
) {
    let mut last_chapter: Option<usize> = None;
    let mut was_eof = false;

    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(200));

        let chapter: usize = match get_property(&ipc, "chapter") {
            Ok(c) => c,
            Err(e) => {
                log::warn!("stream engine status poll failed: {e}");
                if let Some(bus) = bus_slot.lock().unwrap().as_ref() {
                    bus.dispatch(Event::StatusChange { reason: StatusReason::Error });
                }
                continue;
            }
        };
        let time_pos: f64 = match get_property(&ipc, "time-pos") {
            Ok(t) => t,
            Err(e) => {
                log::warn!("stream engine status poll failed: {e}");
                if let Some(bus) = bus_slot.lock().unwrap().as_ref() {
                    bus.dispatch(Event::StatusChange { reason: StatusReason::Error });
                }
                continue;
            }
        };
        let eof: bool = get_property(&ipc, "eof-reached").unwrap_or(false);
        let _core_idle: bool = get_property(&ipc, "core-idle").unwrap_or(false);

        let chapter_base = track_durations
            .iter()
            .take(chapter)
            .sum::<f64>();
        let intra_track = (time_pos - chapter_base).max(0.0);

        {
            let mut snap = snapshot.lock().unwrap();
            snap.current_index = Some(chapter);
            snap.duration_seconds = track_durations.get(chapter).copied().unwrap_or(0.0);

            if !snap.ready {
                let deadline = *startup_deadline.lock().unwrap();
                if clears_startup_wait(intra_track, deadline, Instant::now()) {
                    snap.ready = true;
                }
            }
            snap.position_seconds = if snap.ready { intra_track } else { 0.0 };
        }

        if last_chapter != Some(chapter) {
            last_chapter = Some(chapter);
            if let Some(bus) = bus_slot.lock().unwrap().as_ref() {
                bus.dispatch(Event::TrackChange { index: chapter, total: track_count });
            }
        }

        if eof && !was_eof {
            was_eof = true;
            snapshot.lock().unwrap().state = PlayerState::Stopped;
            if let Some(bus) = bus_slot.lock().unwrap().as_ref() {
                bus.dispatch(Event::StatusChange { reason: StatusReason::DiscEnd });
            }
        } else if !eof {
            was_eof = false;
        }
    }
}

impl AudioTransport for StreamPlayer {
    fn play(&mut self) -> Result<()> {
        set_property(&self.ipc, "pause", false)?;
        self.snapshot.lock().unwrap().state = PlayerState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if self.snapshot.lock().unwrap().state != PlayerState::Playing {
            return Ok(());
        }
        set_property(&self.ipc, "pause", true)?;
        self.snapshot.lock().unwrap().state = PlayerState::Paused;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let reply: EngineReply = self.ipc.lock().unwrap().request(&EngineRequest::Stop)?;
        if !reply.ok {
            return Err(CoreError::EngineIpc(
                reply.error.unwrap_or_else(|| "stop rejected".to_string()),
            ));
        }
        let mut snap = self.snapshot.lock().unwrap();
        snap.state = PlayerState::Stopped;
        snap.position_seconds = 0.0;
        Ok(())
    }

    fn seek(&mut self, position_seconds: f64) -> Result<()> {
        let index = match self.snapshot.lock().unwrap().current_index {
            Some(i) => i,
            None => return Ok(()),
        };
        let duration = self.track_durations.get(index).copied().unwrap_or(0.0);
        if position_seconds < 0.0 || position_seconds > duration {
            log::warn!("rejected seek to {position_seconds}s (track duration {duration}s)");
            return Ok(());
        }
        let absolute = self.chapter_start[index] + position_seconds;
        set_property(&self.ipc, "time-pos", absolute)
    }

    fn navigate_to(&mut self, index: usize, auto_play: bool) -> Result<()> {
        if index >= self.track_count {
            return Err(CoreError::IndexOutOfRange(index));
        }
        if !self.loaded {
            let reply: EngineReply = self
                .ipc
                .lock()
                .unwrap()
                .request(&EngineRequest::Load { uri: self.disc_uri.clone() })?;
            if !reply.ok {
                return Err(CoreError::EngineIpc(
                    reply.error.unwrap_or_else(|| "load rejected".to_string()),
                ));
            }
            self.loaded = true;
            if let Ok(path) = get_property::<String>(&self.ipc, "path") {
                log::debug!("stream engine confirmed loaded path: {path}");
            }
        }
        set_property(&self.ipc, "chapter", index)?;
        *self.startup_deadline.lock().unwrap() = Some(Instant::now() + self.startup_timeout);
        {
            let mut snap = self.snapshot.lock().unwrap();
            snap.current_index = Some(index);
            snap.position_seconds = 0.0;
            snap.duration_seconds = self.track_durations[index];
            snap.ready = false;
        }
        if auto_play {
            self.play()?;
        }
        Ok(())
    }

    /// No-op: the streaming engine owns one continuous timeline across
    /// chapters, so there is nothing for this backend to preload ahead
    /// of a boundary the way `RamPlayer` preloads its idle buffer.
    fn prepare_next(&mut self, _index: Option<usize>) -> Result<()> {
        Ok(())
    }

    fn get_position(&self) -> f64 {
        let snap = self.snapshot.lock().unwrap();
        if snap.ready {
            snap.position_seconds
        } else {
            0.0
        }
    }

    fn get_duration(&self) -> f64 {
        self.snapshot.lock().unwrap().duration_seconds
    }

    fn get_state(&self) -> PlayerState {
        self.snapshot.lock().unwrap().state
    }

    fn get_current_track_index(&self) -> Option<usize> {
        self.snapshot.lock().unwrap().current_index
    }

    fn get_track_count(&self) -> usize {
        self.track_count
    }

    fn cleanup(&mut self) {
        self.stop_monitor.store(true, Ordering::Relaxed);
        if let Some(handle) = self.monitor_thread.take() {
            let _ = handle.join();
        }
        let _ = self
            .ipc
            .lock()
            .unwrap()
            .request::<_, EngineReply>(&EngineRequest::Quit);
        let _ = self.process.kill();
        let _ = self.process.wait();
    }

    fn attach_listener_bus(&mut self, bus: Arc<ListenerBus>) {
        *self.bus_slot.lock().unwrap() = Some(bus);
    }
}

impl Drop for StreamPlayer {
    fn drop(&mut self) {
        if self.monitor_thread.is_some() {
            self.cleanup();
        }
    }
}
