//! Playback orchestration engine for a bit-perfect CD player
//!
//! This crate owns track sequencing (shuffle/repeat), the abstract
//! transport contract shared by the two playback backends (RAM-resident
//! PCM and external streaming engine), and the Controller that wires a
//! sequencer to whichever transport is active. Disc ripping, CD-Text
//! extraction, device discovery, and the terminal/GPIO front ends are
//! external collaborators; this crate only consumes their output
//! ([`types::Disc`] in, [`events::Event`] out).

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod ram;
pub mod sequencer;
pub mod stream;
pub mod transport;
pub mod types;

pub use config::AppConfig;
pub use controller::Controller;
pub use error::{CoreError, Result};
pub use events::{Event, Listener, ListenerBus, StatusReason};
pub use sequencer::TrackSequencer;
pub use transport::AudioTransport;
pub use types::{Disc, PlayerState, RepeatMode, Track};
