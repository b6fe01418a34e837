//! Track order state machine: shuffle, repeat, and navigation
//!
//! Pure state — no I/O, no listener bus. The Controller drives this and
//! decides which transitions are worth emitting an event for. Shuffle
//! order generation is a Fisher-Yates shuffle via `rand`, the same
//! approach as `soul-playback::shuffle::shuffle_random`.

use crate::error::{CoreError, Result};
use crate::types::RepeatMode;
use rand::seq::SliceRandom;

/// Track order state machine
///
/// `shuffle_order[shuffle_position]` is always the current track's real
/// index when shuffle is on; when shuffle is off, position and index
/// coincide.
#[derive(Debug, Clone)]
pub struct TrackSequencer {
    repeat_mode: RepeatMode,
    shuffle_on: bool,
    current_index: usize,
    total_tracks: usize,
    shuffle_order: Vec<usize>,
    shuffle_position: usize,
}

impl Default for TrackSequencer {
    fn default() -> Self {
        Self {
            repeat_mode: RepeatMode::Off,
            shuffle_on: false,
            current_index: 0,
            total_tracks: 0,
            shuffle_order: Vec::new(),
            shuffle_position: 0,
        }
    }
}

impl TrackSequencer {
    /// Create an empty sequencer (no disc loaded)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn total_tracks(&self) -> usize {
        self.total_tracks
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn shuffle_on(&self) -> bool {
        self.shuffle_on
    }

    /// 0-based position of the current track within the active play
    /// sequence (the shuffle order when shuffle is on, disc order
    /// otherwise) -- distinct from `current_index`, which is the track's
    /// fixed disc number regardless of play order.
    pub fn shuffle_position(&self) -> usize {
        self.shuffle_position
    }

    /// Reset to a freshly loaded disc with `total` tracks, current track 0
    ///
    /// `total == 0` clears the sequencer back to its empty state (the
    /// resolved "zero-track TOC" open question: no autoplay, nothing to
    /// sequence).
    pub fn set_total_tracks(&mut self, total: usize) {
        self.total_tracks = total;
        self.current_index = 0;
        self.shuffle_position = 0;
        if total == 0 {
            self.shuffle_order.clear();
            return;
        }
        self.shuffle_order = if self.shuffle_on {
            generate_shuffle_order(total, Some(0))
        } else {
            (0..total).collect()
        };
    }

    /// Jump directly to a track (user clicked a track in a list, MCUB
    /// track-select, etc). Does not consult repeat mode.
    pub fn set_current_index(&mut self, index: usize) -> Result<()> {
        if index >= self.total_tracks {
            return Err(CoreError::IndexOutOfRange(index));
        }
        self.current_index = index;
        if self.shuffle_on {
            self.shuffle_position = self.sequence_position(index);
        }
        Ok(())
    }

    /// Flip shuffle on/off in place
    ///
    /// Never changes `current_index` and never returns a value — the
    /// caller must not treat this as a navigation event. Turning shuffle
    /// on reshuffles the remaining order but pins the current track at
    /// shuffle position 0 so playback does not jump.
    pub fn toggle_shuffle(&mut self) {
        self.shuffle_on = !self.shuffle_on;
        if self.total_tracks == 0 {
            return;
        }
        if self.shuffle_on {
            self.shuffle_order = generate_shuffle_order(self.total_tracks, Some(self.current_index));
            self.shuffle_position = 0;
        } else {
            self.shuffle_order = (0..self.total_tracks).collect();
            self.shuffle_position = self.current_index;
        }
    }

    /// Cycle OFF -> TRACK -> ALL -> OFF, returning the new mode
    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat_mode = self.repeat_mode.next();
        self.repeat_mode
    }

    fn sequence_position(&self, index: usize) -> usize {
        if self.shuffle_on {
            self.shuffle_order
                .iter()
                .position(|&i| i == index)
                .unwrap_or(0)
        } else {
            index
        }
    }

    fn index_at_position(&self, position: usize) -> usize {
        if self.shuffle_on {
            self.shuffle_order[position]
        } else {
            position
        }
    }

    /// Natural end-of-track advance, as driven by the transport
    ///
    /// Repeat TRACK loops on the same index and deliberately leaves
    /// `shuffle_position` untouched — re-shuffling on every repeat of
    /// the same track would be visible as soon as the user turns repeat
    /// back off.
    pub fn advance(&mut self) -> Option<usize> {
        if self.total_tracks == 0 {
            return None;
        }
        if self.repeat_mode == RepeatMode::Track {
            return Some(self.current_index);
        }
        self.step_forward()
    }

    /// User-requested skip to the next track
    ///
    /// Same rules as [`Self::advance`] (repeat TRACK holds on the
    /// current index) except at the end of the disc: a user-initiated
    /// `next` wraps to the first track even under repeat OFF, since
    /// this is deliberate cycling rather than a natural end-of-disc.
    pub fn next_track(&mut self) -> Option<usize> {
        if self.total_tracks == 0 {
            return None;
        }
        if self.repeat_mode == RepeatMode::Track {
            return Some(self.current_index);
        }
        Some(self.step_forward_cycling())
    }

    fn step_forward_cycling(&mut self) -> usize {
        let pos = self.sequence_position(self.current_index);
        if pos + 1 < self.total_tracks {
            let next_pos = pos + 1;
            let idx = self.index_at_position(next_pos);
            self.current_index = idx;
            self.shuffle_position = next_pos;
            idx
        } else {
            self.wrap_to_start()
        }
    }

    fn step_forward(&mut self) -> Option<usize> {
        let pos = self.sequence_position(self.current_index);
        let next_pos = pos + 1;
        if next_pos < self.total_tracks {
            let idx = self.index_at_position(next_pos);
            self.current_index = idx;
            self.shuffle_position = next_pos;
            Some(idx)
        } else if self.repeat_mode == RepeatMode::All {
            Some(self.wrap_to_start())
        } else {
            None
        }
    }

    /// Wrap back to the start of the sequence for a new lap. Under
    /// shuffle, regenerates the shuffle order first so each lap is a
    /// fresh permutation instead of replaying the same cycle forever.
    fn wrap_to_start(&mut self) -> usize {
        if self.shuffle_on {
            self.shuffle_order = generate_shuffle_order(self.total_tracks, None);
        }
        let idx = self.index_at_position(0);
        self.current_index = idx;
        self.shuffle_position = 0;
        idx
    }

    /// User-requested skip to the previous track
    ///
    /// At the first track of the sequence: wraps to the last track under
    /// repeat ALL, otherwise clamps (returns `None`, position unchanged)
    /// per the resolved open question on `prev` at track 1.
    pub fn prev_track(&mut self) -> Option<usize> {
        if self.total_tracks == 0 {
            return None;
        }
        let pos = self.sequence_position(self.current_index);
        if pos == 0 {
            if self.repeat_mode == RepeatMode::All {
                let last = self.total_tracks - 1;
                let idx = self.index_at_position(last);
                self.current_index = idx;
                self.shuffle_position = last;
                return Some(idx);
            }
            return None;
        }
        let prev_pos = pos - 1;
        let idx = self.index_at_position(prev_pos);
        self.current_index = idx;
        self.shuffle_position = prev_pos;
        Some(idx)
    }

    /// Peek at what track would play after the current one, without
    /// mutating any state. Used by RamPlayer/StreamPlayer to decide what
    /// to preload for gapless playback.
    pub fn get_next_for_preload(&self) -> Option<usize> {
        if self.total_tracks == 0 {
            return None;
        }
        if self.repeat_mode == RepeatMode::Track {
            return Some(self.current_index);
        }
        let pos = self.sequence_position(self.current_index);
        let next_pos = pos + 1;
        if next_pos < self.total_tracks {
            Some(self.index_at_position(next_pos))
        } else if self.repeat_mode == RepeatMode::All {
            Some(self.index_at_position(0))
        } else {
            None
        }
    }
}

fn generate_shuffle_order(total: usize, keep_first: Option<usize>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..total).collect();
    order.shuffle(&mut rand::thread_rng());
    if let Some(keep) = keep_first {
        if let Some(pos) = order.iter().position(|&i| i == keep) {
            order.swap(0, pos);
        }
    }
    order
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn advance_always_yields_in_range_index(total in 1usize..32, steps in 0usize..64, shuffle in any::<bool>()) {
            let mut seq = TrackSequencer::new();
            seq.set_total_tracks(total);
            if shuffle {
                seq.toggle_shuffle();
            }
            seq.cycle_repeat();
            seq.cycle_repeat(); // ALL: advance always yields Some under repeat ALL
            for _ in 0..steps {
                let next = seq.advance();
                prop_assert!(next.is_some());
                prop_assert!(next.unwrap() < total);
            }
        }

        #[test]
        fn next_then_prev_returns_to_start_without_repeat(total in 2usize..32) {
            let mut seq = TrackSequencer::new();
            seq.set_total_tracks(total);
            let start = seq.current_index();
            seq.next_track();
            seq.prev_track();
            prop_assert_eq!(seq.current_index(), start);
        }
    }
}
