//! In-memory instance table rebuilt from console enumeration.
//!
//! The registry is a cache: the console is the system of record, and
//! [`InstanceRegistry::refresh`] is the only way names enter or leave it
//! outside of explicit create/remove.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::application::ports::InstanceConsole;
use crate::domain::console::{ConsoleEntry, parse_list2};
use crate::domain::error::FleetError;
use crate::domain::instance::{Instance, LifecyclePhase};
use crate::domain::port::PortResolver;

/// Thread-safe name → [`Instance`] table.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: RwLock<BTreeMap<String, Instance>>,
    resolver: PortResolver,
}

impl InstanceRegistry {
    #[must_use]
    pub fn new(resolver: PortResolver) -> Self {
        Self {
            instances: RwLock::default(),
            resolver,
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &PortResolver {
        &self.resolver
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Instance>> {
        self.instances.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Instance>> {
        self.instances.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-enumerate the console and merge the result.
    ///
    /// Existing entries get index/pid updated (and status, unless an
    /// operation is mid-flight); new names are inserted at the formula port;
    /// names the console no longer reports are evicted. Returns the fresh
    /// enumeration for callers that need the running set.
    ///
    /// # Errors
    ///
    /// Propagates console failures unchanged.
    pub async fn refresh(&self, console: &impl InstanceConsole) -> Result<Vec<ConsoleEntry>> {
        let output = console.list2().await.context("enumerating instances")?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() && stdout.trim().is_empty() {
            return Err(FleetError::ConsoleFailed {
                operation: "list2".to_string(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        let entries = parse_list2(&stdout);
        self.merge(&entries);
        Ok(entries)
    }

    fn merge(&self, entries: &[ConsoleEntry]) {
        let mut table = self.write();
        let before = table.len();
        table.retain(|name, _| entries.iter().any(|e| &e.name == name));
        let evicted = before - table.len();
        if evicted > 0 {
            tracing::info!(evicted, "dropped instances no longer known to the console");
        }

        for entry in entries {
            let observed = if entry.is_running() {
                LifecyclePhase::Running
            } else {
                LifecyclePhase::Stopped
            };
            let now = Utc::now();
            match table.get_mut(&entry.name) {
                Some(inst) => {
                    if inst.index != entry.index {
                        tracing::debug!(name = %entry.name, old = inst.index, new = entry.index, "index changed");
                        inst.index = entry.index;
                        inst.port = self.resolver.expected_port(entry.index);
                    }
                    inst.pid = entry.pid;
                    if !is_transitional(inst.phase) {
                        inst.phase = observed;
                        inst.status = observed.status();
                    }
                    inst.updated_at = now;
                }
                None => {
                    let mut inst = Instance::new(
                        entry.name.clone(),
                        entry.index,
                        self.resolver.expected_port(entry.index),
                    );
                    inst.pid = entry.pid;
                    inst.phase = observed;
                    inst.status = observed.status();
                    table.insert(entry.name.clone(), inst);
                }
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Instance> {
        self.read().get(name).cloned()
    }

    /// Like [`get`](Self::get) but fails with `InstanceNotFound`.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InstanceNotFound`] listing the known names.
    pub fn require(&self, name: &str) -> Result<Instance, FleetError> {
        self.get(name).ok_or_else(|| FleetError::InstanceNotFound {
            name: name.to_string(),
            known: self.names(),
        })
    }

    /// All instances ordered by index.
    #[must_use]
    pub fn all(&self) -> Vec<Instance> {
        let mut all: Vec<Instance> = self.read().values().cloned().collect();
        all.sort_by_key(|i| i.index);
        all
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn insert(&self, instance: Instance) {
        self.write().insert(instance.name.clone(), instance);
    }

    pub fn remove(&self, name: &str) -> Option<Instance> {
        self.write().remove(name)
    }

    /// Update the cached bridge port.
    pub fn set_port(&self, name: &str, port: u16) {
        if let Some(inst) = self.write().get_mut(name) {
            if inst.port != port {
                tracing::info!(name, old = inst.port, new = port, "adopting bridge port");
                inst.port = port;
                inst.updated_at = Utc::now();
            }
        }
    }

    /// Move `name` along the lifecycle state machine.
    ///
    /// # Errors
    ///
    /// Returns [`FleetError::InvalidTransition`] for an illegal move and
    /// [`FleetError::InstanceNotFound`] for an unknown name.
    pub fn transition(&self, name: &str, next: LifecyclePhase) -> Result<(), FleetError> {
        let mut table = self.write();
        let Some(inst) = table.get_mut(name) else {
            drop(table);
            return Err(FleetError::InstanceNotFound {
                name: name.to_string(),
                known: self.names(),
            });
        };
        if inst.phase == next {
            return Ok(());
        }
        if !inst.phase.can_transition_to(next) {
            return Err(FleetError::InvalidTransition {
                name: name.to_string(),
                from: inst.phase,
                to: next,
            });
        }
        tracing::debug!(name, from = %inst.phase, to = %next, "phase");
        set_phase(inst, next);
        Ok(())
    }

    /// Force `name` into `phase` after observing the external tools.
    ///
    /// Reconciliation reports what the console and bridge say, so it is not
    /// bound by the transition table. Unknown names are ignored.
    pub fn reconcile_phase(&self, name: &str, phase: LifecyclePhase) {
        if let Some(inst) = self.write().get_mut(name) {
            if inst.phase != phase {
                tracing::debug!(name, from = %inst.phase, to = %phase, "reconciled");
                set_phase(inst, phase);
            }
        }
    }
}

fn set_phase(inst: &mut Instance, phase: LifecyclePhase) {
    if phase == LifecyclePhase::Stopped {
        inst.pid = None;
    }
    inst.phase = phase;
    inst.status = phase.status();
    inst.updated_at = Utc::now();
}

/// Phases owned by an in-flight lifecycle call; refresh must not clobber them.
fn is_transitional(phase: LifecyclePhase) -> bool {
    !matches!(
        phase,
        LifecyclePhase::Stopped | LifecyclePhase::Running | LifecyclePhase::Failed
    )
}
