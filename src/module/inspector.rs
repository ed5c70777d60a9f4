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

//! # Module Inspector
//!
//! Reads a module image's metadata without linking it, so sandbox and
//! identity checks run before any module code can execute.
//!
//! ## Attribute resolution
//!
//! - `rtx.module` present: its `id`, `is_content_assembly`,
//!   `supports_live_reloading` and `is_sandboxed` properties are used.
//! - `rtx.module` absent: the id is the assembly name, reload is off, the
//!   module is content when its name starts with the content prefix, and it
//!   is sandboxed.
//! - `rtx.skip_if_sandboxed` present: sandboxing is off regardless of the
//!   above, and a deprecation warning is logged.
//!
//! Identity conflicts are not checked here; see the module registry.

use std::io::{Read, Seek};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::DEFAULT_CONTENT_PREFIX;
use crate::errors::{Result, RtError};
use crate::module::attributes::{RtModuleAttribute, MODULE_ATTRIBUTE, SKIP_IF_SANDBOXED_ATTRIBUTE};
use crate::module::descriptor::{RtModuleDescriptor, RtModuleVersion};
use crate::module::image::RtModuleImage;

#[derive(Debug, Default)]
struct GaugeInner {
    open: AtomicUsize,
    waiting: AtomicBool,
    ready: AtomicBool,
}

/// Count of open inspection sessions.
///
/// A pending live reload arms the gauge; the reload may finalize once the
/// count is zero. Exactly one party (the last guard dropped or the arming
/// call itself) observes the transition and marks the gauge ready.
#[derive(Clone, Debug, Default)]
pub struct RtInspectorGauge {
    inner: Arc<GaugeInner>,
}

impl RtInspectorGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.inner.open.load(Ordering::Acquire)
    }

    pub fn acquire(&self) -> RtInspectorGuard {
        self.inner.open.fetch_add(1, Ordering::AcqRel);
        RtInspectorGuard {
            gauge: self.clone(),
        }
    }

    /// Wait for the count to drain. Returns true when it already has.
    pub fn arm(&self) -> bool {
        self.inner.ready.store(false, Ordering::Release);
        self.inner.waiting.store(true, Ordering::Release);
        if self.open_count() == 0 && self.inner.waiting.swap(false, Ordering::AcqRel) {
            return true;
        }
        false
    }

    /// Whether a drain happened since the last `arm`. Clears the flag.
    pub fn take_ready(&self) -> bool {
        self.inner.ready.swap(false, Ordering::AcqRel)
    }

    pub fn is_waiting(&self) -> bool {
        self.inner.waiting.load(Ordering::Acquire)
    }

    fn release(&self) {
        let previous = self.inner.open.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 && self.inner.waiting.swap(false, Ordering::AcqRel) {
            self.inner.ready.store(true, Ordering::Release);
            log::debug!(target: "rtx.mod.loader", "mod.inspector.drained: last inspector closed while a reload was waiting");
        }
    }
}

/// One open inspection session. Dropping it closes the session.
#[derive(Debug)]
pub struct RtInspectorGuard {
    gauge: RtInspectorGauge,
}

impl Drop for RtInspectorGuard {
    fn drop(&mut self) {
        self.gauge.release();
    }
}

#[derive(Clone, Debug)]
pub struct RtModuleInspector {
    content_prefix: String,
    force_sandbox: bool,
    gauge: RtInspectorGauge,
}

impl Default for RtModuleInspector {
    fn default() -> Self {
        Self::new(DEFAULT_CONTENT_PREFIX)
    }
}

impl RtModuleInspector {
    pub fn new(content_prefix: impl Into<String>) -> Self {
        RtModuleInspector {
            content_prefix: content_prefix.into(),
            force_sandbox: false,
            gauge: RtInspectorGauge::new(),
        }
    }

    /// Sandbox every inspected module unless it carries the legacy marker.
    pub fn with_forced_sandbox(mut self, force: bool) -> Self {
        self.force_sandbox = force;
        self
    }

    pub fn with_gauge(mut self, gauge: RtInspectorGauge) -> Self {
        self.gauge = gauge;
        self
    }

    pub fn gauge(&self) -> &RtInspectorGauge {
        &self.gauge
    }

    pub fn content_prefix(&self) -> &str {
        &self.content_prefix
    }

    /// Hold an inspection session open, for callers that inspect in steps.
    pub fn open_session(&self) -> RtInspectorGuard {
        self.gauge.acquire()
    }

    /// Inspect the remainder of `stream`. The stream is left where it was.
    pub fn inspect<R: Read + Seek>(
        &self,
        stream: &mut R,
        declared_path: Option<&Path>,
    ) -> Result<RtModuleDescriptor> {
        let image = RtModuleImage::read_from(stream, declared_path)?;
        self.inspect_image(&image)
    }

    pub fn inspect_image(&self, image: &RtModuleImage) -> Result<RtModuleDescriptor> {
        let _session = self.gauge.acquire();
        let path = image.display_path();

        let metadata = image.metadata()?;
        let assembly_name = metadata.assembly_name.trim().to_string();
        if assembly_name.is_empty() {
            return Err(RtError::bad_image(path, "assembly name is empty"));
        }
        let version = RtModuleVersion::parse(&metadata.version)
            .map_err(|e| RtError::bad_image(&path, e.to_string()))?;
        let declared_attributes = metadata
            .attribute_map()
            .map_err(|e| RtError::bad_image(&path, e.to_string()))?;
        if metadata.references.iter().any(|r| r.trim().is_empty()) {
            return Err(RtError::bad_image(path, "empty module reference"));
        }

        let declared = match declared_attributes.get(MODULE_ATTRIBUTE) {
            Some(bag) => Some(
                RtModuleAttribute::from_bag(bag)
                    .map_err(|e| RtError::bad_image(&path, e.to_string()))?,
            ),
            None => None,
        };

        let (module_id, is_content_module, supports_reload, mut is_sandboxed) = match &declared {
            Some(attr) => (
                attr.id.clone().unwrap_or_else(|| assembly_name.clone()),
                attr.is_content_assembly,
                attr.supports_live_reloading,
                attr.is_sandboxed,
            ),
            None => (
                assembly_name.clone(),
                assembly_name.starts_with(self.content_prefix.as_str()),
                false,
                true,
            ),
        };

        is_sandboxed |= self.force_sandbox;

        if declared_attributes.contains_key(SKIP_IF_SANDBOXED_ATTRIBUTE) {
            log::warn!(
                target: "rtx.mod.loader",
                "mod.inspect.legacy_sandbox_marker: deprecated skip-if-sandboxed marker disables sandboxing - assembly={}, declared_sandboxed={}",
                assembly_name,
                is_sandboxed
            );
            is_sandboxed = false;
        }

        log::debug!(
            target: "rtx.mod.loader",
            "mod.inspect: module inspected - assembly={}, module={}, version={}, content={}, reload={}, sandboxed={}, references={}",
            assembly_name,
            module_id,
            version,
            is_content_module,
            supports_reload,
            is_sandboxed,
            metadata.references.len()
        );

        Ok(RtModuleDescriptor {
            assembly_name,
            module_id,
            is_content_module,
            supports_reload,
            is_sandboxed,
            referenced_module_names: metadata.references,
            declared_attributes,
            version,
            library: metadata.library,
            fingerprint: image.fingerprint().to_string(),
            path: image.path().map(Path::to_path_buf),
        })
    }
}
