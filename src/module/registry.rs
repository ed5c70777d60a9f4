//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Rtx.
//! The Rtx project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Module Registry
//!
//! Tracks every module id the runtime has reserved, split into static and
//! dynamic sets, each with a pending and a loaded half, plus the fixed core
//! set. A reservation checks all of them under a single lock, so two
//! concurrent reservations of the same id can never both succeed and the
//! result does not depend on which set happens to be checked first.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::{Result, RtError};
use crate::module::context::RtModuleHandle;
use crate::module::descriptor::{RtModuleDescriptor, RtModuleKind};

/// Which pending set a reservation goes into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RtPendingSet {
    StaticPending,
    DynamicPending,
}

impl RtPendingSet {
    pub fn is_dynamic(self) -> bool {
        matches!(self, RtPendingSet::DynamicPending)
    }
}

/// The set a conflicting id was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RtConflictSource {
    Core,
    StaticPending,
    StaticLoaded,
    DynamicPending,
    DynamicLoaded,
}

impl RtConflictSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RtConflictSource::Core => "core",
            RtConflictSource::StaticPending => "static-pending",
            RtConflictSource::StaticLoaded => "static-loaded",
            RtConflictSource::DynamicPending => "dynamic-pending",
            RtConflictSource::DynamicLoaded => "dynamic-loaded",
        }
    }
}

impl fmt::Display for RtConflictSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RtConflict {
    pub module_id: String,
    /// The name that collided: the module id or the assembly name.
    pub name: String,
    pub against: RtConflictSource,
}

impl RtConflict {
    /// Conflicts against the core set indicate a packaging error.
    pub fn is_fatal(&self) -> bool {
        self.against == RtConflictSource::Core
    }

    pub fn into_error(self) -> RtError {
        RtError::conflict(self.module_id, format!("{} ({})", self.name, self.against))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RtReservation {
    Accepted,
    Conflict(RtConflict),
}

impl RtReservation {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RtReservation::Accepted)
    }
}

#[derive(Clone, Debug)]
struct LoadedEntry {
    descriptor: RtModuleDescriptor,
    handle: RtModuleHandle,
    dynamic: bool,
}

#[derive(Debug, Default)]
struct RegistryState {
    static_pending: HashMap<String, RtModuleDescriptor>,
    dynamic_pending: HashMap<String, RtModuleDescriptor>,
    loaded: HashMap<String, LoadedEntry>,
    load_order: Vec<String>,
    by_handle: HashMap<RtModuleHandle, String>,
}

impl RegistryState {
    fn find(&self, id: &str) -> Option<RtConflictSource> {
        if self.static_pending.contains_key(id) {
            return Some(RtConflictSource::StaticPending);
        }
        if self.dynamic_pending.contains_key(id) {
            return Some(RtConflictSource::DynamicPending);
        }
        self.loaded.get(id).map(|e| {
            if e.dynamic {
                RtConflictSource::DynamicLoaded
            } else {
                RtConflictSource::StaticLoaded
            }
        })
    }

    /// Where a module with this assembly name is already pending or loaded.
    fn find_assembly(&self, assembly_name: &str) -> Option<RtConflictSource> {
        let named = |d: &RtModuleDescriptor| d.assembly_name == assembly_name;
        if self.static_pending.values().any(named) {
            return Some(RtConflictSource::StaticPending);
        }
        if self.dynamic_pending.values().any(named) {
            return Some(RtConflictSource::DynamicPending);
        }
        self.loaded
            .values()
            .find(|e| named(&e.descriptor))
            .map(|e| {
                if e.dynamic {
                    RtConflictSource::DynamicLoaded
                } else {
                    RtConflictSource::StaticLoaded
                }
            })
    }

    fn remove_loaded(&mut self, id: &str) -> Option<RtModuleDescriptor> {
        let entry = self.loaded.remove(id)?;
        self.by_handle.remove(&entry.handle);
        self.load_order.retain(|loaded| loaded != id);
        Some(entry.descriptor)
    }

    fn pending_mut(&mut self, set: RtPendingSet) -> &mut HashMap<String, RtModuleDescriptor> {
        match set {
            RtPendingSet::StaticPending => &mut self.static_pending,
            RtPendingSet::DynamicPending => &mut self.dynamic_pending,
        }
    }

    fn take_pending(&mut self, id: &str) -> Option<(RtModuleDescriptor, bool)> {
        if let Some(d) = self.static_pending.remove(id) {
            return Some((d, false));
        }
        self.dynamic_pending.remove(id).map(|d| (d, true))
    }
}

#[derive(Debug, Default)]
pub struct RtModuleRegistry {
    core: HashSet<String>,
    state: Mutex<RegistryState>,
}

impl RtModuleRegistry {
    pub fn new<I, S>(core_modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RtModuleRegistry {
            core: core_modules.into_iter().map(Into::into).collect(),
            state: Mutex::new(RegistryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_core_module(&self, name: &str) -> bool {
        self.core.contains(name)
    }

    /// Reserve `descriptor.module_id` in `into`. Conflicts are logged and
    /// returned, never raised.
    pub fn reserve_module_id(
        &self,
        descriptor: &RtModuleDescriptor,
        into: RtPendingSet,
    ) -> RtReservation {
        let id = descriptor.module_id.as_str();
        let mut state = self.state();

        let conflict = if self.core.contains(id) {
            Some((id.to_string(), RtConflictSource::Core))
        } else if self.core.contains(descriptor.assembly_name.as_str()) {
            Some((descriptor.assembly_name.clone(), RtConflictSource::Core))
        } else {
            state
                .find(id)
                .map(|source| (id.to_string(), source))
                .or_else(|| {
                    state
                        .find_assembly(&descriptor.assembly_name)
                        .map(|source| (descriptor.assembly_name.clone(), source))
                })
        };

        if let Some((name, against)) = conflict {
            log::error!(
                target: "rtx.mod",
                "mod.registry.conflict: module identity already taken - module={}, assembly={}, name={}, against={}",
                id,
                descriptor.assembly_name,
                name,
                against
            );
            return RtReservation::Conflict(RtConflict {
                module_id: id.to_string(),
                name,
                against,
            });
        }

        state
            .pending_mut(into)
            .insert(id.to_string(), descriptor.clone());
        log::debug!(
            target: "rtx.mod",
            "mod.registry.reserved: module id reserved - module={}, set={:?}",
            id,
            into
        );
        RtReservation::Accepted
    }

    /// Move a pending reservation to the loaded set once linking succeeded.
    pub fn promote_pending_to_loaded(&self, module_id: &str, handle: RtModuleHandle) -> Result<()> {
        let mut state = self.state();
        let (descriptor, dynamic) = state.take_pending(module_id).ok_or_else(|| {
            RtError::sequence(format!("module '{}' is not pending", module_id))
        })?;
        state.by_handle.insert(handle, module_id.to_string());
        state.load_order.push(module_id.to_string());
        state.loaded.insert(
            module_id.to_string(),
            LoadedEntry {
                descriptor,
                handle,
                dynamic,
            },
        );
        Ok(())
    }

    /// Drop a pending reservation after a failed or aborted load.
    pub fn release_pending(&self, module_id: &str) -> bool {
        let released = self.state().take_pending(module_id).is_some();
        if released {
            log::debug!(
                target: "rtx.mod",
                "mod.registry.released: pending reservation released - module={}",
                module_id
            );
        }
        released
    }

    /// Forget one loaded module. Returns its descriptor if it was loaded.
    pub fn release_loaded(&self, module_id: &str) -> Option<RtModuleDescriptor> {
        let released = self.state().remove_loaded(module_id);
        if released.is_some() {
            log::debug!(
                target: "rtx.mod",
                "mod.registry.unloaded: loaded module released - module={}",
                module_id
            );
        }
        released
    }

    /// Forget every dynamic module, after its context was unloaded. Returns
    /// the released descriptors in load order.
    pub fn release_dynamic_loaded(&self) -> Vec<RtModuleDescriptor> {
        let mut state = self.state();
        let dynamic_ids: Vec<String> = state
            .load_order
            .iter()
            .filter(|id| state.loaded.get(*id).map_or(false, |e| e.dynamic))
            .cloned()
            .collect();

        dynamic_ids
            .iter()
            .filter_map(|id| state.remove_loaded(id))
            .collect()
    }

    pub fn is_hot_reloadable(&self, handle: RtModuleHandle) -> bool {
        let state = self.state();
        state
            .by_handle
            .get(&handle)
            .and_then(|id| state.loaded.get(id))
            .map_or(false, |e| e.dynamic && e.descriptor.supports_reload)
    }

    pub fn module_kind(&self, handle: RtModuleHandle) -> Option<RtModuleKind> {
        let state = self.state();
        state
            .by_handle
            .get(&handle)
            .and_then(|id| state.loaded.get(id))
            .map(|e| e.descriptor.kind())
    }

    pub fn handle_of(&self, module_id: &str) -> Option<RtModuleHandle> {
        self.state().loaded.get(module_id).map(|e| e.handle)
    }

    pub fn descriptor(&self, module_id: &str) -> Option<RtModuleDescriptor> {
        let state = self.state();
        if let Some(entry) = state.loaded.get(module_id) {
            return Some(entry.descriptor.clone());
        }
        state
            .static_pending
            .get(module_id)
            .or_else(|| state.dynamic_pending.get(module_id))
            .cloned()
    }

    /// Whether `module_id` is pending or loaded anywhere.
    pub fn contains(&self, module_id: &str) -> bool {
        self.state().find(module_id).is_some()
    }

    /// Whether `name` matches a known module id or assembly name.
    pub fn knows_name(&self, name: &str) -> bool {
        if self.core.contains(name) {
            return true;
        }
        let state = self.state();
        state.find(name).is_some()
            || state
                .loaded
                .values()
                .any(|e| e.descriptor.assembly_name == name)
            || state
                .static_pending
                .values()
                .chain(state.dynamic_pending.values())
                .any(|d| d.assembly_name == name)
    }

    /// Loaded modules in load order.
    pub fn list_loaded_modules(&self) -> Vec<RtModuleDescriptor> {
        let state = self.state();
        state
            .load_order
            .iter()
            .filter_map(|id| state.loaded.get(id))
            .map(|e| e.descriptor.clone())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        let state = self.state();
        state.static_pending.len() + state.dynamic_pending.len()
    }
}
