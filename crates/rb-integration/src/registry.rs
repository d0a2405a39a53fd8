//! Engine registration
//!
//! Maps a system identifier to its descriptor and a factory. Engines that are
//! not re-entrant may only have one live instance per process; asking for a
//! second one fails with `EngineBusy` until the first is dropped.

use crate::adapter::EngineAdapter;
use crate::engines::NullEngine;
use rb_core::descriptor::systems;
use rb_core::{BridgeError, EngineDescriptor, LifecycleError, SystemId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Builds a fresh adapter for a descriptor
pub type EngineFactory = Box<dyn Fn(&EngineDescriptor) -> Box<dyn EngineAdapter> + Send + Sync>;

struct Entry {
    descriptor: EngineDescriptor,
    factory: EngineFactory,
    live: Arc<AtomicUsize>,
}

/// Keeps an engine type's live-instance count up while held
#[derive(Debug)]
pub struct InstanceLease {
    system: SystemId,
    live: Arc<AtomicUsize>,
}

impl InstanceLease {
    pub fn system(&self) -> SystemId {
        self.system
    }
}

impl Drop for InstanceLease {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
        tracing::debug!("Released {} engine instance", self.system);
    }
}

/// An adapter together with the lease that admitted it
pub struct EngineInstance {
    pub adapter: Box<dyn EngineAdapter>,
    pub lease: Option<InstanceLease>,
}

impl From<Box<dyn EngineAdapter>> for EngineInstance {
    fn from(adapter: Box<dyn EngineAdapter>) -> Self {
        Self {
            adapter,
            lease: None,
        }
    }
}

/// System id -> descriptor + factory
#[derive(Default)]
pub struct EngineRegistry {
    entries: BTreeMap<SystemId, Entry>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the null engine standing in for every built-in system
    pub fn with_null_engines() -> Self {
        let mut registry = Self::new();
        for descriptor in systems::ALL {
            let factory: EngineFactory = Box::new(|desc: &EngineDescriptor| {
                Box::new(NullEngine::new(*desc)) as Box<dyn EngineAdapter>
            });
            if let Err(e) = registry.register(descriptor, factory) {
                tracing::error!("Skipping built-in {}: {}", descriptor.system, e);
            }
        }
        registry
    }

    /// Register (or replace) the engine for `descriptor.system`. Fails if
    /// the descriptor's timing or audio format is unusable.
    pub fn register(
        &mut self,
        descriptor: EngineDescriptor,
        factory: EngineFactory,
    ) -> Result<(), BridgeError> {
        descriptor.check()?;
        tracing::debug!("Registered {} engine ({})", descriptor.system, descriptor.name);
        self.entries.insert(
            descriptor.system,
            Entry {
                descriptor,
                factory,
                live: Arc::new(AtomicUsize::new(0)),
            },
        );
        Ok(())
    }

    pub fn descriptor(&self, system: &str) -> Option<&EngineDescriptor> {
        self.entries
            .values()
            .find(|entry| entry.descriptor.system.as_str() == system)
            .map(|entry| &entry.descriptor)
    }

    pub fn systems(&self) -> Vec<SystemId> {
        self.entries.keys().copied().collect()
    }

    /// Number of live instances of `system`
    pub fn live_instances(&self, system: &str) -> usize {
        self.entries
            .values()
            .find(|entry| entry.descriptor.system.as_str() == system)
            .map_or(0, |entry| entry.live.load(Ordering::Acquire))
    }

    /// Build a new adapter for `system`
    pub fn instantiate(&self, system: &str) -> Result<EngineInstance, BridgeError> {
        let entry = self
            .entries
            .values()
            .find(|entry| entry.descriptor.system.as_str() == system)
            .ok_or_else(|| LifecycleError::UnknownSystem(system.to_string()))?;

        if entry.descriptor.reentrant {
            entry.live.fetch_add(1, Ordering::AcqRel);
        } else if entry
            .live
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LifecycleError::EngineBusy(system.to_string()).into());
        }

        let lease = InstanceLease {
            system: entry.descriptor.system,
            live: Arc::clone(&entry.live),
        };
        let adapter = (entry.factory)(&entry.descriptor);
        tracing::info!("Created {} engine instance", entry.descriptor.name);

        Ok(EngineInstance {
            adapter,
            lease: Some(lease),
        })
    }
}
