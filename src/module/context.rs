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

//! # Load Contexts
//!
//! A load context owns a group of linked modules, their entry points and the
//! regions that keep their code alive. Broadcasts walk modules in load order
//! and entry points in discovery order.
//!
//! Only a reload-capable context may be unloaded, and only as a whole:
//!
//! 1. `shutdown` on every entry point,
//! 2. `dispose` on every entry point,
//! 3. entry points dropped, then regions dropped,
//! 4. bookkeeping cleared and the generation bumped.
//!
//! Handles carry the generation they were issued in, so a handle into an
//! unloaded generation is reported stale instead of aliasing a new module.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{Result, RtError};
use crate::module::descriptor::RtModuleDescriptor;
use crate::module::entry::{
    RtDependencies, RtEntryPointHost, RtEntryState, RtFrameArgs, RtRunLevel, RtTestingCallbacks,
    RtUpdateLevel,
};
use crate::module::image::RtModuleImage;
use crate::module::linker::{RtLoadRegion, RtModuleLinker};

/// Generation-scoped reference to a module inside a load context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RtModuleHandle {
    context: u32,
    generation: u32,
    slot: u32,
}

impl RtModuleHandle {
    pub fn new(context: u32, generation: u32, slot: u32) -> Self {
        RtModuleHandle {
            context,
            generation,
            slot,
        }
    }

    pub fn context(&self) -> u32 {
        self.context
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }
}

impl fmt::Display for RtModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.context, self.generation, self.slot)
    }
}

struct ModuleSlot {
    descriptor: RtModuleDescriptor,
    image: RtModuleImage,
    handle: RtModuleHandle,
    entries: Vec<RtEntryPointHost>,
}

/// A module removed by [`RtLoadContext::unload`], with the bytes it was
/// loaded from.
#[derive(Clone, Debug)]
pub struct RtUnloadedModule {
    pub descriptor: RtModuleDescriptor,
    pub image: RtModuleImage,
}

pub struct RtLoadContext {
    id: u32,
    name: String,
    supports_reload: bool,
    generation: u32,
    reloading: bool,
    linker: Arc<dyn RtModuleLinker>,
    dependencies: Arc<RtDependencies>,
    testing_callbacks: RtTestingCallbacks,
    pending: HashMap<String, RtModuleDescriptor>,
    loaded: HashMap<String, RtModuleDescriptor>,
    // Declared before `regions`: entry points must drop before their code.
    modules: Vec<ModuleSlot>,
    regions: Vec<RtLoadRegion>,
}

impl fmt::Debug for RtLoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtLoadContext")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("supports_reload", &self.supports_reload)
            .field("generation", &self.generation)
            .field("modules", &self.modules.len())
            .finish()
    }
}

impl RtLoadContext {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        supports_reload: bool,
        linker: Arc<dyn RtModuleLinker>,
    ) -> Self {
        RtLoadContext {
            id,
            name: name.into(),
            supports_reload,
            generation: 0,
            reloading: false,
            linker,
            dependencies: Arc::new(RtDependencies::new()),
            testing_callbacks: Arc::new(Vec::new()),
            pending: HashMap::new(),
            loaded: HashMap::new(),
            modules: Vec::new(),
            regions: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supports_reload(&self) -> bool {
        self.supports_reload
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Applies to entry points created by later loads.
    pub fn set_dependencies(&mut self, dependencies: Arc<RtDependencies>) {
        self.dependencies = dependencies;
    }

    pub fn set_testing_callbacks(&mut self, callbacks: RtTestingCallbacks) {
        self.testing_callbacks = callbacks;
    }

    /// Marks the following run level broadcasts as part of a live reload.
    pub fn set_reloading(&mut self, reloading: bool) {
        self.reloading = reloading && self.supports_reload;
    }

    pub fn is_reloading(&self) -> bool {
        self.reloading
    }

    /// Link `descriptor` and build its entry points in manifest order.
    pub fn load(
        &mut self,
        descriptor: RtModuleDescriptor,
        image: RtModuleImage,
    ) -> Result<RtModuleHandle> {
        let module_id = descriptor.module_id.clone();
        if self.loaded.contains_key(&module_id) || self.pending.contains_key(&module_id) {
            log::error!(
                target: "rtx.mod.context",
                "mod.context.duplicate: module already present in context - context={}, module={}",
                self.name,
                module_id
            );
            return Err(RtError::conflict(&module_id, format!("context '{}'", self.name)));
        }

        self.pending.insert(module_id.clone(), descriptor.clone());
        let linked = match self.linker.link(&descriptor, &image) {
            Ok(linked) => linked,
            Err(e) => {
                self.pending.remove(&module_id);
                log::error!(
                    target: "rtx.mod.context",
                    "mod.context.link_failed: module could not be linked - context={}, module={}, error={}",
                    self.name,
                    module_id,
                    e
                );
                return Err(e);
            }
        };

        let shared_id: Arc<str> = Arc::from(module_id.as_str());
        let entries: Vec<RtEntryPointHost> = linked
            .manifest
            .entry_points()
            .iter()
            .enumerate()
            .map(|(index, factory)| {
                RtEntryPointHost::new(
                    shared_id.clone(),
                    index,
                    factory(),
                    self.dependencies.clone(),
                    self.testing_callbacks.clone(),
                )
            })
            .collect();

        let handle = RtModuleHandle::new(self.id, self.generation, self.modules.len() as u32);
        self.pending.remove(&module_id);
        self.loaded.insert(module_id.clone(), descriptor.clone());

        log::info!(
            target: "rtx.mod.context",
            "mod.context.loaded: module loaded - context={}, module={}, version={}, entry_points={}, handle={}",
            self.name,
            module_id,
            descriptor.version,
            entries.len(),
            handle
        );

        self.modules.push(ModuleSlot {
            descriptor,
            image,
            handle,
            entries,
        });
        self.regions.push(linked.region);
        Ok(handle)
    }

    pub fn broadcast_run_level(&mut self, level: RtRunLevel) {
        if level == RtRunLevel::Error {
            log::error!(
                target: "rtx.mod.context",
                "mod.context.unknown_run_level: Unknown RunLevel - context={}, level={:?}",
                self.name,
                level
            );
            return;
        }
        let reloading = self.reloading;
        for module in &mut self.modules {
            for entry in &mut module.entries {
                entry.run_level(level, reloading);
            }
        }
    }

    #[inline]
    pub fn broadcast_update(&mut self, level: RtUpdateLevel, args: &RtFrameArgs) {
        for module in &mut self.modules {
            for entry in &mut module.entries {
                entry.update(level, args);
            }
        }
    }

    fn shutdown_then_dispose(&mut self) {
        for module in &mut self.modules {
            for entry in &mut module.entries {
                if entry.state() < RtEntryState::ShuttingDown {
                    entry.shutdown();
                }
            }
        }
        for module in &mut self.modules {
            for entry in &mut module.entries {
                if entry.state() == RtEntryState::ShuttingDown {
                    entry.dispose();
                }
            }
        }
    }

    /// Shut down and dispose every entry point. Valid for any context; the
    /// modules stay linked until the context is dropped.
    pub fn shutdown(&mut self) {
        self.shutdown_then_dispose();
        log::info!(
            target: "rtx.mod.context",
            "mod.context.shutdown: context shut down - context={}, modules={}",
            self.name,
            self.modules.len()
        );
    }

    /// Tear the whole context down. Fails for contexts that were not built
    /// reload-capable.
    pub fn unload(&mut self) -> Result<Vec<RtUnloadedModule>> {
        if !self.supports_reload {
            log::error!(
                target: "rtx.mod.context",
                "mod.context.unload_rejected: context does not support unloading - context={}",
                self.name
            );
            return Err(RtError::sequence(format!(
                "context '{}' does not support unloading",
                self.name
            )));
        }

        self.shutdown_then_dispose();

        let modules = std::mem::take(&mut self.modules);
        let mut unloaded = Vec::with_capacity(modules.len());
        for slot in modules {
            drop(slot.entries);
            unloaded.push(RtUnloadedModule {
                descriptor: slot.descriptor,
                image: slot.image,
            });
        }
        let region_count = self.regions.len();
        self.regions.clear();
        self.loaded.clear();
        self.pending.clear();
        self.reloading = false;
        self.generation = self.generation.wrapping_add(1);

        log::info!(
            target: "rtx.mod.context",
            "mod.context.unloaded: context unloaded - context={}, modules={}, regions={}, generation={}",
            self.name,
            unloaded.len(),
            region_count,
            self.generation
        );
        Ok(unloaded)
    }

    fn require_reload(&self, what: &str) -> Result<()> {
        if self.supports_reload {
            Ok(())
        } else {
            Err(RtError::sequence(format!(
                "{} is not supported in context '{}'",
                what, self.name
            )))
        }
    }

    pub fn broadcast_reload_start(&mut self) -> Result<()> {
        self.require_reload("reload start")?;
        for module in &mut self.modules {
            for entry in &mut module.entries {
                entry.notify_reload_triggered();
            }
        }
        Ok(())
    }

    pub fn broadcast_reload_complete(&mut self) -> Result<()> {
        self.require_reload("reload completion")?;
        for module in &mut self.modules {
            for entry in &mut module.entries {
                entry.notify_reload_completed();
            }
        }
        Ok(())
    }

    /// Whether `handle` points into this context's current generation.
    pub fn is_live(&self, handle: RtModuleHandle) -> bool {
        handle.context == self.id
            && handle.generation == self.generation
            && (handle.slot as usize) < self.modules.len()
    }

    fn slot(&self, handle: RtModuleHandle) -> Option<&ModuleSlot> {
        if self.is_live(handle) {
            self.modules.get(handle.slot as usize)
        } else {
            None
        }
    }

    pub fn descriptor(&self, handle: RtModuleHandle) -> Option<&RtModuleDescriptor> {
        self.slot(handle).map(|s| &s.descriptor)
    }

    pub fn entry_states(&self, handle: RtModuleHandle) -> Option<Vec<RtEntryState>> {
        self.slot(handle)
            .map(|s| s.entries.iter().map(RtEntryPointHost::state).collect())
    }

    pub fn handles(&self) -> Vec<RtModuleHandle> {
        self.modules.iter().map(|s| s.handle).collect()
    }

    pub fn contains(&self, module_id: &str) -> bool {
        self.loaded.contains_key(module_id)
    }

    pub fn loaded_modules(&self) -> Vec<&RtModuleDescriptor> {
        self.modules.iter().map(|s| &s.descriptor).collect()
    }

    pub fn pending_modules(&self) -> Vec<&RtModuleDescriptor> {
        self.pending.values().collect()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn entry_point_count(&self) -> usize {
        self.modules.iter().map(|s| s.entries.len()).sum()
    }
}

impl Drop for RtLoadContext {
    fn drop(&mut self) {
        self.modules.clear();
        self.regions.clear();
    }
}
