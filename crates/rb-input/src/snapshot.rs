//! Per-frame input snapshots

use bitflags::bitflags;
use rb_core::MAX_PLAYERS;

bitflags! {
    /// Logical inputs. Engines map these onto their own controller layout;
    /// bits above `R3` are available for system-specific inputs.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Buttons: u32 {
        const A      = 1 << 0;
        const B      = 1 << 1;
        const X      = 1 << 2;
        const Y      = 1 << 3;
        const SELECT = 1 << 4;
        const START  = 1 << 5;
        const UP     = 1 << 6;
        const DOWN   = 1 << 7;
        const LEFT   = 1 << 8;
        const RIGHT  = 1 << 9;
        const L      = 1 << 10;
        const R      = 1 << 11;
        const L2     = 1 << 12;
        const R2     = 1 << 13;
        const L3     = 1 << 14;
        const R3     = 1 << 15;

        const _ = !0;
    }
}

impl Default for Buttons {
    fn default() -> Self {
        Self::empty()
    }
}

/// Continuous inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    LeftX,
    LeftY,
    RightX,
    RightY,
    TouchX,
    TouchY,
}

/// Number of analog axes per player
pub const AXIS_COUNT: usize = 6;

impl Axis {
    pub fn index(&self) -> usize {
        match self {
            Axis::LeftX => 0,
            Axis::LeftY => 1,
            Axis::RightX => 2,
            Axis::RightY => 3,
            Axis::TouchX => 4,
            Axis::TouchY => 5,
        }
    }
}

/// State of one player's inputs
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayerInput {
    pub buttons: Buttons,
    pub axes: [f32; AXIS_COUNT],
}

impl PlayerInput {
    pub fn is_pressed(&self, buttons: Buttons) -> bool {
        self.buttons.contains(buttons)
    }

    pub fn axis(&self, axis: Axis) -> f32 {
        self.axes[axis.index()]
    }
}

/// Consistent view of every player's inputs for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSnapshot {
    /// Frame index this snapshot applies to
    pub frame_index: u64,
    pub players: [PlayerInput; MAX_PLAYERS],
}

impl InputSnapshot {
    pub fn player(&self, player: usize) -> Option<&PlayerInput> {
        self.players.get(player)
    }

    /// Whether no input is active for any player
    pub fn is_idle(&self) -> bool {
        self.players
            .iter()
            .all(|p| p.buttons.is_empty() && p.axes.iter().all(|&a| a == 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_input() {
        let mut input = PlayerInput::default();
        assert!(!input.is_pressed(Buttons::A));

        input.buttons.insert(Buttons::A | Buttons::START);
        assert!(input.is_pressed(Buttons::A));
        assert!(input.is_pressed(Buttons::A | Buttons::START));
        assert!(!input.is_pressed(Buttons::A | Buttons::B));

        input.axes[Axis::TouchX.index()] = 0.5;
        assert_eq!(input.axis(Axis::TouchX), 0.5);
    }

    #[test]
    fn test_system_specific_bits() {
        let lid = Buttons::from_bits_retain(1 << 20);
        let mut input = PlayerInput::default();
        input.buttons.insert(lid);
        assert!(input.is_pressed(lid));
    }

    #[test]
    fn test_idle_snapshot() {
        let mut snapshot = InputSnapshot::default();
        assert!(snapshot.is_idle());
        snapshot.players[1].buttons = Buttons::B;
        assert!(!snapshot.is_idle());
        assert!(snapshot.player(MAX_PLAYERS).is_none());
    }
}
