//! Built-in engine adapters

pub mod null;

pub use null::NullEngine;
