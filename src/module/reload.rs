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

//! # Live Reload
//!
//! Rebuilds the dynamic load context without restarting the host.
//!
//! ```text
//! start_live_reload
//!   mid_reload = true            (dynamic updates stop)
//!   listeners: live_reload_triggered
//!   dynamic context unload       (shutdown all, dispose all, drop regions)
//!   modules reloaded from their images, or from staged replacements
//!   PreInit / Init / PostInit    (reloaded_* for entry points that opt in)
//!   finalize now if no inspector is open, else wait
//! finish
//!   mid_reload = false           (dynamic updates resume)
//!   listeners: live_reload_completed
//! ```
//!
//! A reload cannot be cancelled once started. If inspection sessions are
//! still open when the new modules are up, finalization waits until the
//! last one closes and the host calls [`RtModuleManager::try_finish_live_reload`].

use std::collections::HashSet;

use crate::errors::{Result, RtError};
use crate::module::context::RtUnloadedModule;
use crate::module::entry::RtRunLevel;
use crate::module::image::RtModuleImage;
use crate::module::manager::{mark_failed, RtModuleManager, RtSkippedModule};

#[derive(Debug, Default)]
pub struct RtReloadReport {
    /// Module ids loaded again, in load order.
    pub reloaded: Vec<String>,
    pub failed: Vec<RtSkippedModule>,
    /// Whether the reload already finalized.
    pub finished: bool,
}

impl RtModuleManager {
    /// Replace the image a dynamic module will be reloaded from.
    pub fn stage_reload_image(&mut self, module_id: impl Into<String>, image: RtModuleImage) -> Result<()> {
        let module_id = module_id.into();
        if !self.dynamic_context.contains(&module_id) {
            return Err(RtError::validation(format!(
                "module '{}' is not loaded in the dynamic context",
                module_id
            )));
        }
        self.staged_images.insert(module_id, image);
        Ok(())
    }

    pub fn start_live_reload(&mut self) -> Result<RtReloadReport> {
        if !self.config.live_reload_enabled {
            log::warn!(
                target: "rtx.mod",
                "mod.reload.disabled: live reload requested but disabled in configuration"
            );
            return Err(RtError::sequence("live reload is disabled"));
        }
        if self.mid_reload {
            log::warn!(
                target: "rtx.mod",
                "mod.reload.busy: a live reload is already in progress"
            );
            return Err(RtError::sequence("a live reload is already in progress"));
        }

        self.mid_reload = true;
        log::info!(
            target: "rtx.mod",
            "mod.reload.start: live reload started - modules={}, generation={}",
            self.dynamic_context.module_count(),
            self.dynamic_context.generation()
        );

        self.dynamic_context.broadcast_reload_start()?;
        let unloaded = self.dynamic_context.unload()?;
        self.registry.release_dynamic_loaded();

        // Modules of this generation may reference each other.
        let batch: HashSet<String> = unloaded
            .iter()
            .flat_map(|m| [m.descriptor.module_id.clone(), m.descriptor.assembly_name.clone()])
            .collect();

        let mut report = RtReloadReport::default();
        let mut failed: HashSet<String> = HashSet::new();
        for RtUnloadedModule { descriptor, image } in unloaded {
            let module_id = descriptor.module_id.clone();
            let (descriptor, image) = match self.staged_images.remove(&module_id) {
                Some(staged) => match self.inspector.inspect_image(&staged) {
                    Ok(fresh) => (fresh, staged),
                    Err(error) => {
                        mark_failed(&self.registry, &mut failed, &descriptor);
                        report.failed.push(RtSkippedModule { name: module_id, error });
                        continue;
                    }
                },
                None => (descriptor, image),
            };

            if !descriptor.supports_reload {
                mark_failed(&self.registry, &mut failed, &descriptor);
                report.failed.push(RtSkippedModule {
                    name: module_id,
                    error: RtError::validation("replacement image no longer supports live reload"),
                });
                continue;
            }

            if let Some(missing) = descriptor
                .referenced_module_names
                .iter()
                .find(|r| failed.contains(r.as_str()))
            {
                log::warn!(
                    target: "rtx.mod",
                    "mod.reload.dependency_skipped: module not reloaded because a dependency failed - module={}, dependency={}",
                    module_id,
                    missing
                );
                let error = RtError::link(
                    &module_id,
                    format!("dependency '{}' was not reloaded", missing),
                );
                mark_failed(&self.registry, &mut failed, &descriptor);
                report.failed.push(RtSkippedModule {
                    name: module_id,
                    error,
                });
                continue;
            }

            let names = descriptor.clone();
            match self.load_checked(descriptor, image, &batch) {
                Ok(_) => report.reloaded.push(module_id),
                Err(failure) => {
                    mark_failed(&self.registry, &mut failed, &names);
                    log::error!(
                        target: "rtx.mod",
                        "mod.reload.module_failed: module could not be reloaded - module={}, error={}",
                        module_id,
                        failure.error
                    );
                    report.failed.push(RtSkippedModule {
                        name: module_id,
                        error: failure.error,
                    });
                }
            }
        }
        self.staged_images.clear();

        self.dynamic_context.set_reloading(true);
        for level in [RtRunLevel::PreInit, RtRunLevel::Init, RtRunLevel::PostInit] {
            self.dynamic_context.broadcast_run_level(level);
        }
        self.dynamic_context.set_reloading(false);

        if self.inspector.gauge().arm() {
            self.finish_live_reload()?;
            report.finished = true;
        } else {
            log::info!(
                target: "rtx.mod",
                "mod.reload.waiting: reload waits for open inspectors - open={}",
                self.inspector.gauge().open_count()
            );
        }
        Ok(report)
    }

    /// Finalize a reload that was waiting for inspectors to close. Returns
    /// true when this call finalized it.
    pub fn try_finish_live_reload(&mut self) -> Result<bool> {
        if !self.mid_reload || !self.inspector.gauge().take_ready() {
            return Ok(false);
        }
        self.finish_live_reload()?;
        Ok(true)
    }

    fn finish_live_reload(&mut self) -> Result<()> {
        if !self.mid_reload {
            return Ok(());
        }
        self.mid_reload = false;
        self.dynamic_context.broadcast_reload_complete()?;
        log::info!(
            target: "rtx.mod",
            "mod.reload.complete: live reload finished - modules={}, generation={}",
            self.dynamic_context.module_count(),
            self.dynamic_context.generation()
        );
        Ok(())
    }
}
