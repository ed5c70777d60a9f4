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

//! # Module Manager
//!
//! Drives the load pipeline for every module the host hands in:
//!
//! 1. inspect the image (no code runs),
//! 2. check the sandbox reference policy,
//! 3. reserve the module id in the registry,
//! 4. link into the static or dynamic load context,
//! 5. promote the reservation, or release it if linking failed.
//!
//! Modules that declare live reload support go to the dynamic context when
//! live reload is enabled; everything else goes to the static context.
//! Broadcasts reach the static context first, then the dynamic one.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::RtConfig;
use crate::errors::{Result, RtError};
use crate::module::context::{RtLoadContext, RtModuleHandle};
use crate::module::descriptor::{RtModuleDescriptor, RtModuleKind};
use crate::module::entry::{RtDependencies, RtFrameArgs, RtRunLevel, RtTestingCallbacks, RtUpdateLevel};
use crate::module::image::RtModuleImage;
use crate::module::inspector::RtModuleInspector;
use crate::module::linker::RtModuleLinker;
use crate::module::registry::{RtModuleRegistry, RtPendingSet, RtReservation};

pub const STATIC_CONTEXT_ID: u32 = 0;
pub const DYNAMIC_CONTEXT_ID: u32 = 1;

/// A module left out of a batch, and why.
#[derive(Debug)]
pub struct RtSkippedModule {
    /// Module id, or the image path when the image could not be inspected.
    pub name: String,
    pub error: RtError,
}

#[derive(Debug, Default)]
pub struct RtBatchReport {
    /// Loaded modules in load order.
    pub loaded: Vec<(String, RtModuleHandle)>,
    pub skipped: Vec<RtSkippedModule>,
}

impl RtBatchReport {
    pub fn loaded_ids(&self) -> Vec<&str> {
        self.loaded.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn skipped_names(&self) -> Vec<&str> {
        self.skipped.iter().map(|s| s.name.as_str()).collect()
    }
}

pub(super) struct LoadFailure {
    pub(super) error: RtError,
    pub(super) fatal: bool,
}

impl From<RtError> for LoadFailure {
    fn from(error: RtError) -> Self {
        LoadFailure { error, fatal: false }
    }
}

pub struct RtModuleManager {
    pub(super) config: RtConfig,
    pub(super) registry: RtModuleRegistry,
    pub(super) inspector: RtModuleInspector,
    pub(super) static_context: RtLoadContext,
    pub(super) dynamic_context: RtLoadContext,
    pub(super) mid_reload: bool,
    pub(super) staged_images: HashMap<String, RtModuleImage>,
}

impl RtModuleManager {
    pub fn new(config: RtConfig, linker: Arc<dyn RtModuleLinker>) -> Self {
        let registry = RtModuleRegistry::new(config.core_modules.iter().cloned());
        let inspector = RtModuleInspector::new(config.content_prefix.clone());
        RtModuleManager {
            registry,
            inspector,
            static_context: RtLoadContext::new(STATIC_CONTEXT_ID, "static", false, linker.clone()),
            dynamic_context: RtLoadContext::new(DYNAMIC_CONTEXT_ID, "dynamic", true, linker),
            mid_reload: false,
            staged_images: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RtConfig {
        &self.config
    }

    pub fn registry(&self) -> &RtModuleRegistry {
        &self.registry
    }

    pub fn inspector(&self) -> &RtModuleInspector {
        &self.inspector
    }

    pub fn static_context(&self) -> &RtLoadContext {
        &self.static_context
    }

    pub fn dynamic_context(&self) -> &RtLoadContext {
        &self.dynamic_context
    }

    pub fn is_mid_reload(&self) -> bool {
        self.mid_reload
    }

    pub fn set_dependencies(&mut self, dependencies: Arc<RtDependencies>) {
        self.static_context.set_dependencies(dependencies.clone());
        self.dynamic_context.set_dependencies(dependencies);
    }

    pub fn set_testing_callbacks(&mut self, callbacks: RtTestingCallbacks) {
        self.static_context.set_testing_callbacks(callbacks.clone());
        self.dynamic_context.set_testing_callbacks(callbacks);
    }

    fn wants_dynamic(&self, descriptor: &RtModuleDescriptor) -> bool {
        self.config.live_reload_enabled && descriptor.supports_reload
    }

    /// Check a sandboxed module's references. Core modules, modules the
    /// registry already knows, names in `batch` and allow-listed prefixes
    /// pass.
    pub fn check_sandbox(&self, descriptor: &RtModuleDescriptor, batch: &HashSet<String>) -> Result<()> {
        if !self.config.sandboxing_enabled || !descriptor.is_sandboxed {
            return Ok(());
        }
        for reference in &descriptor.referenced_module_names {
            let allowed = self.registry.knows_name(reference)
                || batch.contains(reference)
                || self.config.sandbox.allows(reference);
            if !allowed {
                log::error!(
                    target: "rtx.mod.loader",
                    "mod.sandbox.rejected: sandboxed module references a disallowed module - module={}, reference={}",
                    descriptor.module_id,
                    reference
                );
                return Err(RtError::sandbox(
                    &descriptor.module_id,
                    format!("reference '{}' is not allowed", reference),
                ));
            }
        }
        Ok(())
    }

    pub(super) fn load_checked(
        &mut self,
        descriptor: RtModuleDescriptor,
        image: RtModuleImage,
        batch: &HashSet<String>,
    ) -> std::result::Result<RtModuleHandle, LoadFailure> {
        self.check_sandbox(&descriptor, batch)?;

        let dynamic = self.wants_dynamic(&descriptor);
        let set = if dynamic {
            RtPendingSet::DynamicPending
        } else {
            RtPendingSet::StaticPending
        };
        if let RtReservation::Conflict(conflict) = self.registry.reserve_module_id(&descriptor, set) {
            let fatal = conflict.is_fatal();
            return Err(LoadFailure {
                error: conflict.into_error(),
                fatal,
            });
        }

        let module_id = descriptor.module_id.clone();
        let context = if dynamic {
            &mut self.dynamic_context
        } else {
            &mut self.static_context
        };
        match context.load(descriptor, image) {
            Ok(handle) => {
                self.registry.promote_pending_to_loaded(&module_id, handle)?;
                Ok(handle)
            }
            Err(error) => {
                self.registry.release_pending(&module_id);
                Err(error.into())
            }
        }
    }

    /// Inspect and load one module read from `stream`. The stream is left
    /// at its original position.
    pub fn load_module<R: Read + Seek>(
        &mut self,
        stream: &mut R,
        declared_path: Option<&Path>,
    ) -> Result<RtModuleHandle> {
        let image = RtModuleImage::read_from(stream, declared_path)?;
        self.load_image(image)
    }

    pub fn load_image(&mut self, image: RtModuleImage) -> Result<RtModuleHandle> {
        let descriptor = self.inspector.inspect_image(&image)?;
        self.load_checked(descriptor, image, &HashSet::new())
            .map_err(|f| f.error)
    }

    fn inspect_all(&self, images: &[RtModuleImage]) -> Vec<Result<RtModuleDescriptor>> {
        // Entry points are not Sync, so only the inspector crosses threads.
        let inspector = &self.inspector;
        #[cfg(feature = "parallel")]
        {
            images
                .par_iter()
                .map(|image| inspector.inspect_image(image))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            images
                .iter()
                .map(|image| inspector.inspect_image(image))
                .collect()
        }
    }

    /// Load a set of modules. Images are inspected up front (in parallel
    /// with the `parallel` feature), then loaded so that every module comes
    /// after the batch members it references; ties keep input order.
    ///
    /// A module that fails is skipped and reported, as are modules that
    /// reference it. A clash with a core module aborts the batch with the
    /// conflict error; modules loaded before it stay loaded.
    pub fn load_batch(&mut self, images: Vec<RtModuleImage>) -> Result<RtBatchReport> {
        let mut report = RtBatchReport::default();
        let inspected = self.inspect_all(&images);

        let mut candidates: Vec<(RtModuleDescriptor, RtModuleImage)> = Vec::new();
        for (result, image) in inspected.into_iter().zip(images) {
            match result {
                Ok(descriptor) => candidates.push((descriptor, image)),
                Err(error) => {
                    log::error!(
                        target: "rtx.mod.loader",
                        "mod.batch.inspect_failed: module image rejected - path={}, error={}",
                        image.display_path(),
                        error
                    );
                    report.skipped.push(RtSkippedModule {
                        name: image.display_path(),
                        error,
                    });
                }
            }
        }

        let batch: HashSet<String> = candidates
            .iter()
            .flat_map(|(d, _)| [d.module_id.clone(), d.assembly_name.clone()])
            .collect();

        let (order, cyclic) = load_order(&candidates);
        let mut slots: Vec<Option<(RtModuleDescriptor, RtModuleImage)>> =
            candidates.into_iter().map(Some).collect();

        let mut failed: HashSet<String> = HashSet::new();
        for index in cyclic {
            if let Some((descriptor, _)) = slots[index].take() {
                log::error!(
                    target: "rtx.mod.loader",
                    "mod.batch.cycle: module is part of a reference cycle - module={}",
                    descriptor.module_id
                );
                mark_failed(&self.registry, &mut failed, &descriptor);
                report.skipped.push(RtSkippedModule {
                    name: descriptor.module_id.clone(),
                    error: RtError::validation(format!(
                        "circular reference involving '{}'",
                        descriptor.module_id
                    )),
                });
            }
        }

        for index in order {
            let (descriptor, image) = match slots[index].take() {
                Some(entry) => entry,
                None => continue,
            };

            if let Some(missing) = descriptor
                .referenced_module_names
                .iter()
                .find(|r| failed.contains(r.as_str()))
            {
                log::warn!(
                    target: "rtx.mod.loader",
                    "mod.batch.dependency_skipped: module skipped because a dependency failed - module={}, dependency={}",
                    descriptor.module_id,
                    missing
                );
                let error = RtError::link(
                    &descriptor.module_id,
                    format!("dependency '{}' was not loaded", missing),
                );
                mark_failed(&self.registry, &mut failed, &descriptor);
                report.skipped.push(RtSkippedModule {
                    name: descriptor.module_id,
                    error,
                });
                continue;
            }

            let module_id = descriptor.module_id.clone();
            let names = descriptor.clone();
            match self.load_checked(descriptor, image, &batch) {
                Ok(handle) => report.loaded.push((module_id, handle)),
                Err(failure) if failure.fatal => {
                    log::error!(
                        target: "rtx.mod.loader",
                        "mod.batch.aborted: module clashes with a core module, batch aborted - module={}, loaded={}",
                        module_id,
                        report.loaded.len()
                    );
                    return Err(failure.error);
                }
                Err(failure) => {
                    mark_failed(&self.registry, &mut failed, &names);
                    report.skipped.push(RtSkippedModule {
                        name: module_id,
                        error: failure.error,
                    });
                }
            }
        }

        log::info!(
            target: "rtx.mod.loader",
            "mod.batch.done: batch load finished - loaded={}, skipped={}",
            report.loaded.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    pub fn broadcast_run_level(&mut self, level: RtRunLevel) {
        self.static_context.broadcast_run_level(level);
        self.dynamic_context.broadcast_run_level(level);
    }

    /// Dynamic modules are skipped while a live reload is in flight.
    pub fn broadcast_update(&mut self, level: RtUpdateLevel, args: &RtFrameArgs) {
        self.static_context.broadcast_update(level, args);
        if !self.mid_reload {
            self.dynamic_context.broadcast_update(level, args);
        }
    }

    pub fn shutdown(&mut self) {
        self.static_context.shutdown();
        self.dynamic_context.shutdown();
    }

    pub fn is_hot_reloadable(&self, handle: RtModuleHandle) -> bool {
        self.registry.is_hot_reloadable(handle)
    }

    pub fn module_kind(&self, handle: RtModuleHandle) -> Option<RtModuleKind> {
        self.registry.module_kind(handle)
    }

    pub fn list_loaded_modules(&self) -> Vec<RtModuleDescriptor> {
        self.registry.list_loaded_modules()
    }

    /// Context that owns `handle`, if the handle is still live.
    pub fn context_of(&self, handle: RtModuleHandle) -> Option<&RtLoadContext> {
        [&self.static_context, &self.dynamic_context]
            .into_iter()
            .find(|c| c.is_live(handle))
    }
}

/// Records a module that did not load so its dependents are skipped. A name
/// another module still holds, such as the id a rejected duplicate shares
/// with the module that won, stays usable.
pub(super) fn mark_failed(
    registry: &RtModuleRegistry,
    failed: &mut HashSet<String>,
    descriptor: &RtModuleDescriptor,
) {
    for name in [&descriptor.module_id, &descriptor.assembly_name] {
        if !registry.knows_name(name) {
            failed.insert(name.clone());
        }
    }
}

/// Stable topological order over batch members. Returns the load order and
/// the members that sit on or behind a reference cycle.
fn load_order(candidates: &[(RtModuleDescriptor, RtModuleImage)]) -> (Vec<usize>, Vec<usize>) {
    let mut by_name: HashMap<&str, usize> = HashMap::new();
    for (i, (d, _)) in candidates.iter().enumerate() {
        by_name.entry(d.module_id.as_str()).or_insert(i);
        by_name.entry(d.assembly_name.as_str()).or_insert(i);
    }

    let deps: Vec<Vec<usize>> = candidates
        .iter()
        .enumerate()
        .map(|(i, (d, _))| {
            let mut out: Vec<usize> = d
                .referenced_module_names
                .iter()
                .filter_map(|r| by_name.get(r.as_str()).copied())
                .filter(|&j| j != i)
                .collect();
            out.dedup();
            out
        })
        .collect();

    let mut placed = vec![false; candidates.len()];
    let mut order = Vec::with_capacity(candidates.len());
    loop {
        let next = (0..candidates.len())
            .find(|&i| !placed[i] && deps[i].iter().all(|&j| placed[j]));
        match next {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => break,
        }
    }
    let cyclic = (0..candidates.len()).filter(|&i| !placed[i]).collect();
    (order, cyclic)
}
