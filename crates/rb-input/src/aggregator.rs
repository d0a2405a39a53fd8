//! Input aggregation
//!
//! Any number of sources post [`InputDelta`]s from any thread. Deltas are
//! folded into a pending snapshot under a short lock; once per advanced frame
//! the engine thread takes a copy of it. Held inputs carry over to the next
//! frame, and a press and release of the same input inside one frame window
//! resolve last-writer-wins.

use crate::snapshot::{Axis, Buttons, InputSnapshot};
use parking_lot::Mutex;
use rb_core::MAX_PLAYERS;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Where an input delta came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Controller(u32),
    Keyboard,
    /// On-screen touch overlay
    Overlay,
    /// Remote peer
    Remote(u32),
}

/// A single change to a player's inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputChange {
    Press(Buttons),
    Release(Buttons),
    Axis(Axis, f32),
    /// Release every button and center every axis
    ReleaseAll,
}

/// Input event posted by a source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputDelta {
    pub player: usize,
    pub source: InputSource,
    pub change: InputChange,
}

impl InputDelta {
    pub fn press(player: usize, source: InputSource, buttons: Buttons) -> Self {
        Self {
            player,
            source,
            change: InputChange::Press(buttons),
        }
    }

    pub fn release(player: usize, source: InputSource, buttons: Buttons) -> Self {
        Self {
            player,
            source,
            change: InputChange::Release(buttons),
        }
    }

    pub fn axis(player: usize, source: InputSource, axis: Axis, value: f32) -> Self {
        Self {
            player,
            source,
            change: InputChange::Axis(axis, value),
        }
    }
}

struct Pending {
    snapshot: InputSnapshot,
    deltas_since_take: u32,
}

/// Merges deltas from every source into one snapshot per frame
pub struct InputAggregator {
    pending: Mutex<Pending>,
    max_players: usize,
    deltas_posted: AtomicU64,
    deltas_rejected: AtomicU64,
    snapshots_taken: AtomicU64,
}

impl InputAggregator {
    pub fn new(max_players: usize) -> Self {
        Self {
            pending: Mutex::new(Pending {
                snapshot: InputSnapshot::default(),
                deltas_since_take: 0,
            }),
            max_players: max_players.clamp(1, MAX_PLAYERS),
            deltas_posted: AtomicU64::new(0),
            deltas_rejected: AtomicU64::new(0),
            snapshots_taken: AtomicU64::new(0),
        }
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Fold a delta into the pending snapshot. Never blocks on the engine.
    ///
    /// Returns `false` if the player index is out of range.
    pub fn post(&self, delta: InputDelta) -> bool {
        if delta.player >= self.max_players {
            self.deltas_rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "Ignoring input for player {} from {:?}",
                delta.player,
                delta.source
            );
            return false;
        }

        {
            let mut pending = self.pending.lock();
            let player = &mut pending.snapshot.players[delta.player];
            match delta.change {
                InputChange::Press(buttons) => player.buttons.insert(buttons),
                InputChange::Release(buttons) => player.buttons.remove(buttons),
                InputChange::Axis(axis, value) => player.axes[axis.index()] = value,
                InputChange::ReleaseAll => *player = Default::default(),
            }
            pending.deltas_since_take += 1;
        }

        self.deltas_posted.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Take the snapshot for `frame_index`. Called once per advanced frame.
    pub fn take(&self, frame_index: u64) -> InputSnapshot {
        let (snapshot, coalesced) = {
            let mut pending = self.pending.lock();
            let coalesced = std::mem::take(&mut pending.deltas_since_take);
            let mut snapshot = pending.snapshot;
            snapshot.frame_index = frame_index;
            (snapshot, coalesced)
        };

        self.snapshots_taken.fetch_add(1, Ordering::Relaxed);
        if coalesced > 0 {
            tracing::trace!("Frame {} input: {} deltas coalesced", frame_index, coalesced);
        }
        snapshot
    }

    /// Clear all inputs for every player
    pub fn reset(&self) {
        let mut pending = self.pending.lock();
        pending.snapshot = InputSnapshot::default();
        pending.deltas_since_take = 0;
    }

    /// Current pending state without consuming it
    pub fn peek(&self) -> InputSnapshot {
        self.pending.lock().snapshot
    }

    pub fn deltas_posted(&self) -> u64 {
        self.deltas_posted.load(Ordering::Relaxed)
    }

    pub fn deltas_rejected(&self) -> u64 {
        self.deltas_rejected.load(Ordering::Relaxed)
    }

    pub fn snapshots_taken(&self) -> u64 {
        self.snapshots_taken.load(Ordering::Relaxed)
    }
}

/// Cloneable posting handle for one input source
#[derive(Clone)]
pub struct InputHandle {
    aggregator: Arc<InputAggregator>,
    source: InputSource,
}

impl InputHandle {
    pub fn new(aggregator: Arc<InputAggregator>, source: InputSource) -> Self {
        Self { aggregator, source }
    }

    pub fn source(&self) -> InputSource {
        self.source
    }

    pub fn press(&self, player: usize, buttons: Buttons) -> bool {
        self.aggregator
            .post(InputDelta::press(player, self.source, buttons))
    }

    pub fn release(&self, player: usize, buttons: Buttons) -> bool {
        self.aggregator
            .post(InputDelta::release(player, self.source, buttons))
    }

    pub fn set_axis(&self, player: usize, axis: Axis, value: f32) -> bool {
        self.aggregator
            .post(InputDelta::axis(player, self.source, axis, value))
    }

    /// Controller disconnected: drop everything the player holds
    pub fn release_all(&self, player: usize) -> bool {
        self.aggregator.post(InputDelta {
            player,
            source: self.source,
            change: InputChange::ReleaseAll,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_snapshot_per_take() {
        let agg = InputAggregator::new(2);
        agg.post(InputDelta::press(0, InputSource::Keyboard, Buttons::A));
        agg.post(InputDelta::press(0, InputSource::Overlay, Buttons::UP));
        agg.post(InputDelta::axis(1, InputSource::Overlay, Axis::TouchX, 0.25));

        let snap = agg.take(7);
        assert_eq!(snap.frame_index, 7);
        assert!(snap.players[0].is_pressed(Buttons::A | Buttons::UP));
        assert_eq!(snap.players[1].axis(Axis::TouchX), 0.25);
        assert_eq!(agg.snapshots_taken(), 1);
    }

    #[test]
    fn test_held_inputs_carry_over() {
        let agg = InputAggregator::new(1);
        agg.post(InputDelta::press(0, InputSource::Keyboard, Buttons::B));
        assert!(agg.take(1).players[0].is_pressed(Buttons::B));
        assert!(agg.take(2).players[0].is_pressed(Buttons::B));

        agg.post(InputDelta::release(0, InputSource::Keyboard, Buttons::B));
        assert!(!agg.take(3).players[0].is_pressed(Buttons::B));
    }

    #[test]
    fn test_last_writer_wins() {
        let agg = InputAggregator::new(1);
        agg.post(InputDelta::press(0, InputSource::Controller(0), Buttons::A));
        agg.post(InputDelta::release(0, InputSource::Remote(1), Buttons::A));
        assert!(!agg.take(1).players[0].is_pressed(Buttons::A));

        agg.post(InputDelta::release(0, InputSource::Controller(0), Buttons::A));
        agg.post(InputDelta::press(0, InputSource::Remote(1), Buttons::A));
        assert!(agg.take(2).players[0].is_pressed(Buttons::A));
    }

    #[test]
    fn test_out_of_range_player_rejected() {
        let agg = InputAggregator::new(2);
        assert!(!agg.post(InputDelta::press(2, InputSource::Keyboard, Buttons::A)));
        assert_eq!(agg.deltas_rejected(), 1);
        assert!(agg.take(1).is_idle());
    }

    #[test]
    fn test_release_all_and_reset() {
        let agg = Arc::new(InputAggregator::new(2));
        let pad = InputHandle::new(Arc::clone(&agg), InputSource::Controller(0));
        pad.press(0, Buttons::A | Buttons::B);
        pad.set_axis(0, Axis::LeftX, -1.0);
        pad.press(1, Buttons::START);
        pad.release_all(0);

        let snap = agg.take(1);
        assert_eq!(snap.players[0], Default::default());
        assert!(snap.players[1].is_pressed(Buttons::START));

        agg.reset();
        assert!(agg.take(2).is_idle());
    }

    #[test]
    fn test_concurrent_posting() {
        let agg = Arc::new(InputAggregator::new(4));
        let handles: Vec<_> = (0..4)
            .map(|player| {
                let pad = InputHandle::new(Arc::clone(&agg), InputSource::Controller(player as u32));
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        pad.press(player, Buttons::A);
                        pad.release(player, Buttons::A);
                    }
                    pad.press(player, Buttons::X);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snap = agg.take(1);
        for player in 0..4 {
            assert!(snap.players[player].is_pressed(Buttons::X));
            assert!(!snap.players[player].is_pressed(Buttons::A));
        }
        assert_eq!(agg.deltas_posted(), 4 * 201);
    }
}
