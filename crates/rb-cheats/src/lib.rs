//! Cheat code support for the retrobridge runtime
//!
//! Codes are decoded per family when they are added, staged by the control
//! thread, and applied by the engine thread before every frame.

pub mod decode;
pub mod engine;
pub mod memory;
pub mod patch;

pub use decode::{decode, normalize};
pub use engine::{ActiveCheats, ApplyReport, CheatStage};
pub use memory::{AddressSpace, MemoryView, Width};
pub use patch::{CheatHandle, CheatPatch, CheatSummary, Condition, PatchOp};
