//! Input handling for retrobridge

pub mod aggregator;
pub mod snapshot;

pub use aggregator::{InputAggregator, InputChange, InputDelta, InputHandle, InputSource};
pub use snapshot::{Axis, Buttons, InputSnapshot, PlayerInput, AXIS_COUNT};
