//! Engine integration for retrobridge
//!
//! This crate joins an emulation engine to a host: the [`EngineAdapter`]
//! contract, the frame pacer, the engine thread that owns the adapter while a
//! session runs, save-state files and the [`Bridge`] control surface.

pub mod adapter;
pub mod engine_thread;
pub mod engines;
pub mod pacing;
pub mod registry;
pub mod runner;
pub mod savestate;
pub mod session;

pub use adapter::{EngineAdapter, EngineFault, FirmwareSet, FrameOutput, GameAsset, SaveStateBlob};
pub use engine_thread::{FrameLoop, SessionCounters};
pub use engines::NullEngine;
pub use pacing::{FramePacer, PaceDecision};
pub use registry::{EngineFactory, EngineInstance, EngineRegistry, InstanceLease};
pub use runner::{Bridge, SessionStats};
pub use savestate::SaveStateManager;
pub use session::{LifecycleOp, SessionState};
