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

//! # Entry Points
//!
//! The lifecycle contract a module exposes to the host, and the host-side
//! wrapper that enforces the lifecycle order.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized -> PreInit -> Init -> PostInit -> Running -> ShuttingDown -> Disposed
//! ```
//!
//! Transitions only move forward. A call that would move backwards, or skip
//! ahead past a phase that never ran, is logged and ignored. Reload does not
//! rewind a host; the old host is disposed and a new one is built.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Run levels broadcast during startup. `Error` is what a host sees for a
/// level it does not understand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RtRunLevel {
    Error,
    PreInit,
    Init,
    PostInit,
}

/// Sub-phase of a frame an update belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RtUpdateLevel {
    PreEngine,
    PostEngine,
    FramePreEngine,
    FramePostEngine,
    InputPreEngine,
    InputPostEngine,
    UserInterface,
}

/// Per-frame timing passed to `update`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RtFrameArgs {
    pub delta_seconds: f32,
    pub tick: u64,
}

impl RtFrameArgs {
    pub fn new(delta_seconds: f32, tick: u64) -> Self {
        RtFrameArgs { delta_seconds, tick }
    }
}

/// Services the host injects into every entry point.
#[derive(Default)]
pub struct RtDependencies {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl RtDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Any + Send + Sync>(mut self, service: T) -> Self {
        self.insert(service);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, service: T) {
        self.services.insert(TypeId::of::<T>(), Arc::new(service));
    }

    pub fn resolve<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|s| s.downcast::<T>().ok())
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for RtDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtDependencies")
            .field("services", &self.services.len())
            .finish()
    }
}

/// Callback records handed to entry points by integration tests.
pub type RtTestingCallbacks = Arc<Vec<Arc<dyn Any + Send + Sync>>>;

/// Implemented by module code. Every hook has an empty default.
pub trait RtEntryPoint: Send {
    fn pre_init(&mut self) {}
    fn init(&mut self) {}
    fn post_init(&mut self) {}
    fn update(&mut self, _level: RtUpdateLevel, _args: &RtFrameArgs) {}
    fn shutdown(&mut self) {}
    fn dispose(&mut self) {}

    fn set_dependencies(&mut self, _dependencies: Arc<RtDependencies>) {}
    fn set_testing_callbacks(&mut self, _callbacks: RtTestingCallbacks) {}

    /// Opt in to `reloaded_*` hooks after a live reload.
    fn as_reloadable(&mut self) -> Option<&mut dyn RtReloadableEntryPoint> {
        None
    }

    /// Opt in to reload start and completion notifications.
    fn as_reload_listener(&mut self) -> Option<&mut dyn RtReloadListener> {
        None
    }
}

/// Replaces the run level hooks for entry points rebuilt by a live reload.
pub trait RtReloadableEntryPoint {
    fn reloaded_pre_init(&mut self) {}
    fn reloaded_init(&mut self) {}
    fn reloaded_post_init(&mut self) {}
}

pub trait RtReloadListener {
    fn live_reload_triggered(&mut self) {}
    fn live_reload_completed(&mut self) {}
}

/// Factory listed in a module manifest. Entry points take no constructor
/// arguments; services arrive through `set_dependencies`.
pub type RtEntryPointFactory = fn() -> Box<dyn RtEntryPoint>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RtEntryState {
    Uninitialized,
    PreInit,
    Init,
    PostInit,
    Running,
    ShuttingDown,
    Disposed,
}

/// Host-side wrapper around one entry point.
pub struct RtEntryPointHost {
    module_id: Arc<str>,
    index: usize,
    state: RtEntryState,
    entry: Box<dyn RtEntryPoint>,
}

impl fmt::Debug for RtEntryPointHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtEntryPointHost")
            .field("module_id", &self.module_id)
            .field("index", &self.index)
            .field("state", &self.state)
            .finish()
    }
}

impl RtEntryPointHost {
    pub fn new(
        module_id: Arc<str>,
        index: usize,
        mut entry: Box<dyn RtEntryPoint>,
        dependencies: Arc<RtDependencies>,
        testing_callbacks: RtTestingCallbacks,
    ) -> Self {
        entry.set_dependencies(dependencies);
        entry.set_testing_callbacks(testing_callbacks);
        RtEntryPointHost {
            module_id,
            index,
            state: RtEntryState::Uninitialized,
            entry,
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// Position within the module's manifest.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> RtEntryState {
        self.state
    }

    pub fn is_reload_listener(&mut self) -> bool {
        self.entry.as_reload_listener().is_some()
    }

    fn advance(&mut self, from: RtEntryState, to: RtEntryState) -> bool {
        if self.state != from {
            log::error!(
                target: "rtx.mod.context",
                "mod.entry.bad_transition: lifecycle call out of order, skipped - module={}, entry={}, state={:?}, requested={:?}",
                self.module_id,
                self.index,
                self.state,
                to
            );
            return false;
        }
        self.state = to;
        true
    }

    /// Run the hook for `level`. Entry points rebuilt by a reload that opt in
    /// get the `reloaded_*` hook in place of the normal one.
    pub fn run_level(&mut self, level: RtRunLevel, reloading: bool) {
        let (from, to) = match level {
            RtRunLevel::PreInit => (RtEntryState::Uninitialized, RtEntryState::PreInit),
            RtRunLevel::Init => (RtEntryState::PreInit, RtEntryState::Init),
            RtRunLevel::PostInit => (RtEntryState::Init, RtEntryState::PostInit),
            RtRunLevel::Error => {
                log::error!(
                    target: "rtx.mod.context",
                    "mod.entry.unknown_run_level: Unknown RunLevel - module={}, entry={}, level={:?}",
                    self.module_id,
                    self.index,
                    level
                );
                return;
            }
        };
        if !self.advance(from, to) {
            return;
        }

        if reloading {
            if let Some(reloadable) = self.entry.as_reloadable() {
                match level {
                    RtRunLevel::PreInit => reloadable.reloaded_pre_init(),
                    RtRunLevel::Init => reloadable.reloaded_init(),
                    RtRunLevel::PostInit => reloadable.reloaded_post_init(),
                    RtRunLevel::Error => {}
                }
                self.finish_post_init(level);
                return;
            }
        }

        match level {
            RtRunLevel::PreInit => self.entry.pre_init(),
            RtRunLevel::Init => self.entry.init(),
            RtRunLevel::PostInit => self.entry.post_init(),
            RtRunLevel::Error => {}
        }
        self.finish_post_init(level);
    }

    fn finish_post_init(&mut self, level: RtRunLevel) {
        if level == RtRunLevel::PostInit {
            self.state = RtEntryState::Running;
        }
    }

    /// Updates reach only running entry points; others are skipped quietly
    /// because a frame may tick while a module is still starting.
    #[inline]
    pub fn update(&mut self, level: RtUpdateLevel, args: &RtFrameArgs) {
        if self.state == RtEntryState::Running {
            self.entry.update(level, args);
        }
    }

    /// Never-initialized entry points still get shutdown so they can release
    /// anything acquired at construction.
    pub fn shutdown(&mut self) {
        if self.state >= RtEntryState::ShuttingDown {
            log::warn!(
                target: "rtx.mod.context",
                "mod.entry.double_shutdown: shutdown requested twice, skipped - module={}, entry={}",
                self.module_id,
                self.index
            );
            return;
        }
        self.state = RtEntryState::ShuttingDown;
        self.entry.shutdown();
    }

    pub fn dispose(&mut self) {
        if self.advance(RtEntryState::ShuttingDown, RtEntryState::Disposed) {
            self.entry.dispose();
        }
    }

    pub fn notify_reload_triggered(&mut self) {
        if let Some(listener) = self.entry.as_reload_listener() {
            listener.live_reload_triggered();
        }
    }

    pub fn notify_reload_completed(&mut self) {
        if let Some(listener) = self.entry.as_reload_listener() {
            listener.live_reload_completed();
        }
    }
}
