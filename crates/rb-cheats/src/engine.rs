//! Cheat engine
//!
//! The control thread edits a [`CheatStage`] without ever waiting on the
//! engine. The engine thread keeps an [`ActiveCheats`] copy, refreshes it at
//! frame boundaries when the stage generation changes, and re-asserts every
//! patch before each frame runs.

use crate::decode::{decode, normalize};
use crate::memory::MemoryView;
use crate::patch::{CheatHandle, CheatPatch, CheatSummary};
use parking_lot::Mutex;
use rb_core::{CheatError, CheatFamily, EngineDescriptor};
use std::sync::atomic::{AtomicU64, Ordering};

/// Staged cheat set, shared between the control and engine threads
pub struct CheatStage {
    system: &'static str,
    families: &'static [CheatFamily],
    patches: Mutex<Vec<CheatPatch>>,
    generation: AtomicU64,
    next_handle: AtomicU64,
    rejected: AtomicU64,
}

impl CheatStage {
    pub fn new(descriptor: &EngineDescriptor) -> Self {
        Self {
            system: descriptor.system.as_str(),
            families: descriptor.cheat_families,
            patches: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            next_handle: AtomicU64::new(1),
            rejected: AtomicU64::new(0),
        }
    }

    /// Decode and stage a code. Family and format problems are reported
    /// here, never at apply time.
    pub fn insert(&self, family: &str, code: &str) -> Result<CheatHandle, CheatError> {
        let result = self.try_insert(family, code);
        if let Err(e) = &result {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("Rejected cheat for {}: {}", self.system, e);
        }
        result
    }

    fn try_insert(&self, family: &str, code: &str) -> Result<CheatHandle, CheatError> {
        let family: CheatFamily = family.parse()?;
        if !self.families.contains(&family) {
            return Err(CheatError::UnsupportedFamily(format!(
                "{} codes are not supported on {}",
                family, self.system
            )));
        }

        let ops = decode(family, code)?;
        let code = normalize(code);

        let mut patches = self.patches.lock();
        if patches.iter().any(|p| p.family == family && p.code == code) {
            return Err(CheatError::InvalidCode(format!(
                "duplicate of an active {} code",
                family
            )));
        }

        let handle = CheatHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        tracing::debug!("Added {} ({}, {} ops)", handle, family, ops.len());
        patches.push(CheatPatch {
            handle,
            family,
            code,
            ops,
        });
        self.generation.fetch_add(1, Ordering::Release);
        Ok(handle)
    }

    pub fn remove(&self, handle: CheatHandle) -> Result<(), CheatError> {
        let mut patches = self.patches.lock();
        let index = patches
            .iter()
            .position(|p| p.handle == handle)
            .ok_or(CheatError::UnknownHandle(handle.0))?;
        patches.remove(index);
        self.generation.fetch_add(1, Ordering::Release);
        tracing::debug!("Removed {}", handle);
        Ok(())
    }

    pub fn clear(&self) {
        let mut patches = self.patches.lock();
        if !patches.is_empty() {
            patches.clear();
            self.generation.fetch_add(1, Ordering::Release);
        }
    }

    pub fn len(&self) -> usize {
        self.patches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list(&self) -> Vec<CheatSummary> {
        self.patches.lock().iter().map(CheatPatch::summary).collect()
    }

    /// Codes refused at insertion since the stage was created
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Outcome of applying the active set to memory for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: u32,
    /// Guards that did not hold, or unmapped targets
    pub skipped: u32,
}

/// Engine-thread copy of the staged cheat set
#[derive(Debug, Default)]
pub struct ActiveCheats {
    generation: u64,
    patches: Vec<CheatPatch>,
    applied_total: u64,
}

impl ActiveCheats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick up staged edits. Only copies when the stage has changed.
    pub fn sync(&mut self, stage: &CheatStage) -> bool {
        if stage.generation() == self.generation {
            return false;
        }

        let patches = stage.patches.lock();
        self.patches.clone_from(&patches);
        self.generation = stage.generation();
        tracing::trace!("Active cheat set now holds {} patches", self.patches.len());
        true
    }

    /// Write every patch into `memory`
    pub fn apply(&mut self, memory: &mut dyn MemoryView) -> ApplyReport {
        let mut report = ApplyReport::default();
        for op in self.patches.iter().flat_map(|p| p.ops.iter()) {
            if op.apply(memory) {
                report.applied += 1;
            } else {
                report.skipped += 1;
            }
        }
        self.applied_total += report.applied as u64;
        report
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn contains(&self, handle: CheatHandle) -> bool {
        self.patches.iter().any(|p| p.handle == handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheatPatch> {
        self.patches.iter()
    }

    /// Writes performed since this set was created
    pub fn applied_total(&self) -> u64 {
        self.applied_total
    }
}
