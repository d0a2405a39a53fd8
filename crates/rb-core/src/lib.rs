//! Core types for the retrobridge emulation runtime
//!
//! This crate provides the foundational types, error handling,
//! configuration, and logging infrastructure shared by every other crate.

pub mod clock;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod logging;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use descriptor::{
    AudioFormat, CheatFamily, EngineDescriptor, PixelFormat, SystemId, VideoFormat,
};
pub use error::{BridgeError, CheatError, LifecycleError, Result, SetupError, StateError};
pub use frame::{AudioFrame, Sample, VideoFrame};

/// Most players an input snapshot can carry
pub const MAX_PLAYERS: usize = 8;
