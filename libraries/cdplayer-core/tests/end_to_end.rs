//! Integration tests exercising Controller + RamPlayer together
//!
//! Unit tests elsewhere cover TrackSequencer and Controller against a
//! fake transport in isolation; these drive the real RamPlayer thread
//! so the gapless swap, the listener bus, and the sequencer actually
//! agree with each other end to end. Buffer lengths are chosen as
//! multiples (or clean non-multiples) of the sink's chunk size so each
//! test's natural-end sequence is deterministic rather than timing-based.

use cdplayer_core::config::AutoplaySetting;
use cdplayer_core::ram::provider::PcmProvider;
use cdplayer_core::ram::sink::RecordingSink;
use cdplayer_core::ram::RamPlayer;
use cdplayer_core::types::{Disc, RepeatMode, Track};
use cdplayer_core::{AppConfig, Controller, Event, PlayerState, StatusReason};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CHUNK_BYTES: usize = 64; // RamPlayer::new(.., 16) below: 16 frames * 4 bytes/frame

struct VecProvider(Vec<Arc<[u8]>>);

impl PcmProvider for VecProvider {
    fn track_pcm(&self, index: usize) -> Option<Arc<[u8]>> {
        self.0.get(index).cloned()
    }

    fn track_count(&self) -> usize {
        self.0.len()
    }
}

fn disc_with_byte_lengths(lengths: &[usize]) -> (Disc, Arc<VecProvider>) {
    let tracks = lengths
        .iter()
        .enumerate()
        .map(|(i, _)| Track {
            number: i as u32 + 1,
            duration_frames: 0,
            byte_offset: None,
            title: None,
            artist: None,
            album: None,
        })
        .collect();
    let disc = Disc {
        total_duration_frames: 0,
        tracks,
        cdtext_present: false,
    };
    let provider = Arc::new(VecProvider(
        lengths.iter().map(|&n| Arc::from(vec![0u8; n])).collect(),
    ));
    (disc, provider)
}

fn wait_until(mut pred: impl FnMut() -> bool, what: &str) {
    for _ in 0..400 {
        if pred() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("condition never became true: {what}");
}

fn new_controller_with(provider: Arc<VecProvider>, config: AppConfig) -> Arc<Controller> {
    let transport = RamPlayer::new(Box::new(RecordingSink::new()), provider, 16);
    Controller::new(Box::new(transport), config)
}

fn new_controller(provider: Arc<VecProvider>) -> Arc<Controller> {
    new_controller_with(provider, AppConfig::default())
}

fn no_autoplay_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.autoplay_on_load = AutoplaySetting::Blanket(false);
    config
}

#[derive(Default, Clone)]
struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    fn subscribe_to(&self, controller: &Arc<Controller>) {
        let log = self.0.clone();
        controller.subscribe(Arc::new(move |event: &Event| {
            log.lock().unwrap().push(event.clone());
        }));
    }

    fn track_changes(&self) -> Vec<(usize, usize)> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::TrackChange { index, total } => Some((*index, *total)),
                _ => None,
            })
            .collect()
    }

    fn disc_end_count(&self) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, Event::StatusChange { reason: StatusReason::DiscEnd }))
            .count()
    }

    fn stopped_count(&self) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, Event::StatusChange { reason: StatusReason::Stopped }))
            .count()
    }
}

/// A gapless run of three tracks reports exactly one
/// `track_change` per boundary, in order, and a single `disc_end` at the
/// very end -- never a `stopped` in between. Track lengths are exact
/// multiples of the sink's chunk size so every boundary lands on a
/// write/swap cleanly, with no race between this assertion and the
/// background playback thread.
#[test]
fn gapless_three_track_run_reports_each_boundary_once() {
    let (disc, provider) =
        disc_with_byte_lengths(&[CHUNK_BYTES, CHUNK_BYTES / 2, CHUNK_BYTES * 3 / 4]);
    let controller = new_controller(provider);
    let log = EventLog::default();
    log.subscribe_to(&controller);

    controller.load(disc, 1).unwrap();
    wait_until(
        || controller.state() == PlayerState::Stopped,
        "disc to play through to the end",
    );

    assert_eq!(log.track_changes(), vec![(0, 3), (1, 3), (2, 3)]);
    assert_eq!(log.disc_end_count(), 1);
    assert_eq!(log.stopped_count(), 0);
}

/// Once repeat=TRACK is selected under shuffle, a
/// natural end keeps replaying the same track and never advances.
#[test]
fn repeat_track_loops_the_same_index_after_natural_end() {
    let (disc, provider) = disc_with_byte_lengths(&[CHUNK_BYTES / 4; 3]);
    let controller = new_controller_with(provider, no_autoplay_config());
    controller.load(disc, 1).unwrap();
    controller.shuffle();
    controller.goto(2).unwrap();
    controller.repeat(); // OFF -> TRACK
    assert_eq!(controller.repeat_mode(), RepeatMode::Track);

    let log = EventLog::default();
    log.subscribe_to(&controller);
    controller.play().unwrap();

    wait_until(
        || log.track_changes().len() >= 5,
        "several natural re-triggers of the same track",
    );

    assert_eq!(controller.current_track_index(), Some(2));
    assert!(log.track_changes().iter().all(|&(index, _)| index == 2));
}

/// `prev` within the restart threshold moves back a
/// track; past it, `prev` restarts the current one instead. Autoplay is
/// disabled so the transport never actually starts writing; every
/// navigate/seek still lands on RamPlayer's own background thread via
/// its command channel, so each assertion waits for that thread to have
/// caught up rather than assuming the send was synchronous.
#[test]
fn prev_threshold_behavior_matches_position() {
    let long_track = 2_000_000; // ~11s at 44.1kHz/16-bit/stereo, long enough that seek(10.0) is in range
    let (disc, provider) = disc_with_byte_lengths(&[long_track; 3]);
    let controller = new_controller_with(provider, no_autoplay_config());

    controller.load(disc, 0).unwrap();
    wait_until(|| controller.current_track_index() == Some(0), "load to bind track 0");

    controller.next().unwrap();
    wait_until(|| controller.current_track_index() == Some(1), "next to bind track 1");

    controller.prev().unwrap();
    wait_until(|| controller.current_track_index() == Some(0), "prev to return to track 0");

    controller.next().unwrap();
    wait_until(|| controller.current_track_index() == Some(1), "next to rebind track 1");

    controller.seek(10.0).unwrap();
    wait_until(|| (controller.position() - 10.0).abs() < 0.01, "seek to land near 10s");

    controller.prev().unwrap();
    wait_until(|| controller.current_track_index() == Some(1), "prev-past-threshold to restart track 1");
    wait_until(|| controller.position() == 0.0, "restart to reset position to 0");
}

/// A hundred `pause` calls back to back settle on
/// PAUSED with the position untouched. The buffer is larger than one
/// chunk so the single write the `play` command triggers never drains
/// it -- the FIFO command channel guarantees the 100 `pause` sends are
/// processed before any further writes happen, with no sleep needed.
#[test]
fn repeated_pause_under_contention_is_idempotent() {
    let (disc, provider) = disc_with_byte_lengths(&[CHUNK_BYTES * 16]);
    let controller = new_controller_with(provider, no_autoplay_config());
    controller.load(disc, 0).unwrap();
    wait_until(|| controller.current_track_index() == Some(0), "load to bind track 0");
    controller.play().unwrap();
    wait_until(|| controller.state() == PlayerState::Playing, "play to take effect");

    for _ in 0..100 {
        controller.pause().unwrap();
    }
    wait_until(|| controller.state() == PlayerState::Paused, "pause flood to settle");
    let position_after_first_round = controller.position();

    for _ in 0..100 {
        controller.pause().unwrap();
    }
    wait_until(|| controller.state() == PlayerState::Paused, "second pause flood to settle");

    assert_eq!(controller.state(), PlayerState::Paused);
    assert_eq!(controller.position(), position_after_first_round);
}

/// `toggle_shuffle` twice with no intervening navigation must be a no-op
/// on `current_index`.
#[test]
fn shuffle_on_then_off_preserves_current_index() {
    let (disc, provider) = disc_with_byte_lengths(&[16; 5]);
    let controller = new_controller_with(provider, no_autoplay_config());
    controller.load(disc, 1).unwrap();
    controller.goto(3).unwrap();
    wait_until(|| controller.current_track_index() == Some(3), "goto to bind track 3");

    controller.shuffle();
    controller.shuffle();

    assert_eq!(controller.current_track_index(), Some(3));
}
