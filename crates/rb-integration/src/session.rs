//! Session lifecycle state machine
//!
//! `Unloaded -> Loaded -> Running <-> Paused -> Stopped`, with `load`
//! allowed again from `Stopped`. `stop` is accepted from every state.

use serde::Serialize;

/// Lifecycle state of a bridge's session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Unloaded,
    Loaded,
    Running,
    Paused,
    Stopped,
}

/// Host-issued lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOp {
    Load,
    Start,
    Pause,
    Resume,
    Stop,
    /// Advance one frame while paused
    Step,
}

impl LifecycleOp {
    pub const ALL: [LifecycleOp; 6] = [
        LifecycleOp::Load,
        LifecycleOp::Start,
        LifecycleOp::Pause,
        LifecycleOp::Resume,
        LifecycleOp::Stop,
        LifecycleOp::Step,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOp::Load => "load",
            LifecycleOp::Start => "start",
            LifecycleOp::Pause => "pause",
            LifecycleOp::Resume => "resume",
            LifecycleOp::Stop => "stop",
            LifecycleOp::Step => "step",
        }
    }
}

impl SessionState {
    pub const ALL: [SessionState; 5] = [
        SessionState::Unloaded,
        SessionState::Loaded,
        SessionState::Running,
        SessionState::Paused,
        SessionState::Stopped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unloaded => "unloaded",
            SessionState::Loaded => "loaded",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
        }
    }

    /// State reached by applying `op`, or `None` if `op` is not legal here
    pub fn after(self, op: LifecycleOp) -> Option<SessionState> {
        use LifecycleOp as Op;
        use SessionState as S;

        match (self, op) {
            (S::Unloaded | S::Stopped, Op::Load) => Some(S::Loaded),
            (S::Loaded, Op::Start) => Some(S::Running),
            (S::Running, Op::Pause) => Some(S::Paused),
            (S::Paused, Op::Resume) => Some(S::Running),
            (S::Paused, Op::Step) => Some(S::Paused),
            // Nothing to stop before the first load
            (S::Unloaded, Op::Stop) => Some(S::Unloaded),
            (_, Op::Stop) => Some(S::Stopped),
            _ => None,
        }
    }

    /// Whether a game is loaded and the engine thread is alive
    pub fn has_session(&self) -> bool {
        matches!(
            self,
            SessionState::Loaded | SessionState::Running | SessionState::Paused
        )
    }
}
