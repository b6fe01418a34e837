//! Minimal emitter for the MCUB status envelope
//!
//! The MCUB serial protocol itself (the handshake, the 115200-baud
//! link, incoming `cmd` messages) is out of scope for this engine; all
//! the core exposes at that edge is the mapping from its own state to
//! the `"m"` status line a real display consumes. This prints that line
//! to stdout so the CLI can be watched like the real device would be.

use cdplayer_core::{Controller, Event, RepeatMode};
use serde_json::json;
use std::sync::Arc;

fn format_mmss(total_seconds: f64) -> String {
    let total = total_seconds.max(0.0).round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

fn repeat_flags(mode: RepeatMode) -> (&'static str, &'static str) {
    let (repeat, single) = mode.mcub_flags();
    (if repeat { "1" } else { "0" }, if single { "1" } else { "0" })
}

/// Build the `"m"` status line reflecting the Controller's current state
fn status_line(controller: &Controller) -> serde_json::Value {
    let (repeat, single) = repeat_flags(controller.repeat_mode());
    let track_number = controller.current_track_index().map(|i| i + 1).unwrap_or(0);
    let track = controller.current_track();
    json!({
        "t": "m",
        "d": {
            "state": match controller.state() {
                cdplayer_core::PlayerState::Playing => "P",
                cdplayer_core::PlayerState::Paused => "U",
                cdplayer_core::PlayerState::Stopped => "S",
            },
            "elapsed": format_mmss(controller.position()),
            "total": format_mmss(controller.duration()),
            "track_number": track_number,
            // No disc-ID lookup is in scope, so a CD has nothing else to
            // hand back as a song identifier; this mirrors track_number.
            "song_id": track_number,
            "playlist_position": controller.playlist_position(),
            "playlist_length": controller.playlist_length(),
            "title": track.as_ref().and_then(|t| t.title.clone()).unwrap_or_default(),
            "artist": track.as_ref().and_then(|t| t.artist.clone()).unwrap_or_default(),
            "album": track.as_ref().and_then(|t| t.album.clone()).unwrap_or_default(),
            "repeat": repeat,
            "single": single,
            "random": if controller.shuffle_on() { "1" } else { "0" },
        }
    })
}

/// Print one `"m"` status line reflecting the Controller's current state
pub fn emit_status(controller: &Controller) {
    println!("{}", status_line(controller));
}

/// Subscribe a listener that emits a status line on every track/status change
pub fn attach(controller: &Arc<Controller>) {
    let weak = Arc::downgrade(controller);
    controller.subscribe(Arc::new(move |event: &Event| {
        if let Some(controller) = weak.upgrade() {
            match event {
                Event::TrackChange { .. } | Event::StatusChange { .. } | Event::CdLoaded { .. } => {
                    emit_status(&controller);
                }
                Event::LoadingProgress { .. } => {}
            }
        }
    }));
}
