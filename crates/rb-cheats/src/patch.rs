//! Decoded cheat patches

use crate::memory::{AddressSpace, MemoryView, Width};
use rb_core::CheatFamily;
use serde::Serialize;
use std::fmt;

/// Opaque handle returned for an accepted cheat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CheatHandle(pub u64);

impl fmt::Display for CheatHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cheat#{}", self.0)
    }
}

/// Guard evaluated before a write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    pub space: AddressSpace,
    pub address: u32,
    pub width: Width,
    pub equals: u32,
}

impl Condition {
    fn holds(&self, memory: &dyn MemoryView) -> bool {
        memory.read(self.space, self.address, self.width) == Some(self.equals)
    }
}

/// One decoded memory write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOp {
    pub space: AddressSpace,
    pub address: u32,
    pub width: Width,
    pub value: u32,
    pub condition: Option<Condition>,
}

impl PatchOp {
    pub(crate) fn set(space: AddressSpace, address: u32, width: Width, value: u32) -> Self {
        Self {
            space,
            address,
            width,
            value: value & width.mask(),
            condition: None,
        }
    }

    /// Perform the write if its guard holds. Returns whether memory was written.
    pub fn apply(&self, memory: &mut dyn MemoryView) -> bool {
        if let Some(condition) = &self.condition {
            if !condition.holds(memory) {
                return false;
            }
        }
        memory.write(self.space, self.address, self.width, self.value)
    }
}

/// A successfully decoded cheat. Codes that fail to decode never become a
/// `CheatPatch`; they are returned to the host as errors instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheatPatch {
    pub handle: CheatHandle,
    pub family: CheatFamily,
    /// Normalized source text
    pub code: String,
    pub ops: Vec<PatchOp>,
}

impl CheatPatch {
    pub fn summary(&self) -> CheatSummary {
        CheatSummary {
            handle: self.handle,
            family: self.family.tag(),
            code: self.code.clone(),
            operations: self.ops.len(),
        }
    }
}

/// Host-facing description of an active cheat
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheatSummary {
    pub handle: CheatHandle,
    pub family: &'static str,
    pub code: String,
    pub operations: usize,
}
