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

//! # Module Linkers
//!
//! A linker turns an inspected image into a manifest of entry point
//! factories plus the region that keeps the module's code alive. Nothing
//! outside this file knows how a module's code got into the process.
//!
//! - [`RtStaticLinker`]: manifests compiled into the host, keyed by assembly
//!   name.
//! - [`RtNativeLinker`]: extracts the image's library entry to a private
//!   directory, opens it with `libloading` and calls its
//!   `rtx_module_manifest` export.
//! - [`RtLinkerChain`]: first linker that accepts the descriptor wins.
//!
//! ## Native modules
//!
//! ```ignore
//! #[no_mangle]
//! pub fn rtx_module_manifest() -> rtx::RtModuleManifest {
//!     rtx::RtModuleManifest::new().with(|| Box::new(MyEntry::default()))
//! }
//! ```
//!
//! The export uses the Rust ABI, so modules must be built with the same
//! compiler and `rtx` version as the host.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use libloading::{Library, Symbol};
use tempfile::TempDir;

use crate::errors::{Result, RtError};
use crate::module::descriptor::RtModuleDescriptor;
use crate::module::entry::RtEntryPointFactory;
use crate::module::image::RtModuleImage;

/// Exported symbol a native module must provide.
pub const MANIFEST_SYMBOL: &[u8] = b"rtx_module_manifest\0";

pub type RtManifestFn = fn() -> RtModuleManifest;

/// Ordered entry point factories of one module. Order is discovery order.
#[derive(Clone, Default)]
pub struct RtModuleManifest {
    entry_points: Vec<RtEntryPointFactory>,
}

impl RtModuleManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, factory: RtEntryPointFactory) -> Self {
        self.entry_points.push(factory);
        self
    }

    pub fn entry_points(&self) -> &[RtEntryPointFactory] {
        &self.entry_points
    }

    pub fn len(&self) -> usize {
        self.entry_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_points.is_empty()
    }
}

impl fmt::Debug for RtModuleManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtModuleManifest")
            .field("entry_points", &self.entry_points.len())
            .finish()
    }
}

/// Keeps a module's code mapped. Must outlive every entry point built from
/// the module; the load context drops entry points first.
pub struct RtLoadRegion {
    label: String,
    // Field order matters: the library unmaps before its directory goes.
    library: Option<Library>,
    extracted: Option<TempDir>,
}

impl RtLoadRegion {
    /// A region for code that is part of the host binary.
    pub fn in_process(label: impl Into<String>) -> Self {
        RtLoadRegion {
            label: label.into(),
            library: None,
            extracted: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_native(&self) -> bool {
        self.library.is_some()
    }

    pub fn extracted_dir(&self) -> Option<&Path> {
        self.extracted.as_ref().map(TempDir::path)
    }
}

impl fmt::Debug for RtLoadRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtLoadRegion")
            .field("label", &self.label)
            .field("native", &self.is_native())
            .finish()
    }
}

#[derive(Debug)]
pub struct RtLinkedModule {
    pub manifest: RtModuleManifest,
    pub region: RtLoadRegion,
}

pub trait RtModuleLinker: Send + Sync {
    /// Whether this linker knows how to link `descriptor`.
    fn accepts(&self, _descriptor: &RtModuleDescriptor) -> bool {
        true
    }

    fn link(&self, descriptor: &RtModuleDescriptor, image: &RtModuleImage) -> Result<RtLinkedModule>;
}

#[derive(Clone, Debug, Default)]
pub struct RtStaticLinker {
    manifests: HashMap<String, RtModuleManifest>,
}

impl RtStaticLinker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, assembly_name: impl Into<String>, manifest: RtModuleManifest) {
        self.manifests.insert(assembly_name.into(), manifest);
    }

    pub fn with(mut self, assembly_name: impl Into<String>, manifest: RtModuleManifest) -> Self {
        self.register(assembly_name, manifest);
        self
    }
}

impl RtModuleLinker for RtStaticLinker {
    fn accepts(&self, descriptor: &RtModuleDescriptor) -> bool {
        self.manifests.contains_key(&descriptor.assembly_name)
    }

    fn link(&self, descriptor: &RtModuleDescriptor, _image: &RtModuleImage) -> Result<RtLinkedModule> {
        let manifest = self
            .manifests
            .get(&descriptor.assembly_name)
            .cloned()
            .ok_or_else(|| {
                RtError::link(
                    &descriptor.module_id,
                    format!("no manifest registered for '{}'", descriptor.assembly_name),
                )
            })?;
        Ok(RtLinkedModule {
            manifest,
            region: RtLoadRegion::in_process(&descriptor.module_id),
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct RtNativeLinker;

impl RtNativeLinker {
    pub fn new() -> Self {
        RtNativeLinker
    }
}

impl RtModuleLinker for RtNativeLinker {
    fn accepts(&self, descriptor: &RtModuleDescriptor) -> bool {
        descriptor.library.is_some()
    }

    fn link(&self, descriptor: &RtModuleDescriptor, image: &RtModuleImage) -> Result<RtLinkedModule> {
        let module_id = descriptor.module_id.as_str();
        let entry = descriptor
            .library
            .as_deref()
            .ok_or_else(|| RtError::link(module_id, "module declares no library"))?;
        let file_name = Path::new(entry)
            .file_name()
            .ok_or_else(|| RtError::link(module_id, format!("bad library entry '{}'", entry)))?;

        let bytes = image.read_entry(entry)?;
        let dir = tempfile::Builder::new().prefix("rtx-module-").tempdir()?;
        let path = dir.path().join(file_name);
        fs::write(&path, &bytes)?;

        // SAFETY: the library is a module built against this crate. Its
        // initializers run here, after sandbox and identity checks passed.
        let library = unsafe { Library::new(&path) }
            .map_err(|e| RtError::link(module_id, format!("failed to open library: {}", e)))?;

        let manifest = {
            // SAFETY: the symbol type matches the documented export.
            let symbol: Symbol<RtManifestFn> = unsafe { library.get(MANIFEST_SYMBOL) }
                .map_err(|e| RtError::link(module_id, format!("missing manifest export: {}", e)))?;
            symbol()
        };

        log::info!(
            target: "rtx.mod.loader",
            "mod.link.native: native module linked - module={}, library={}, entry_points={}",
            module_id,
            entry,
            manifest.len()
        );

        Ok(RtLinkedModule {
            manifest,
            region: RtLoadRegion {
                label: module_id.to_string(),
                library: Some(library),
                extracted: Some(dir),
            },
        })
    }
}

/// Tries each linker in order.
#[derive(Default)]
pub struct RtLinkerChain {
    linkers: Vec<Box<dyn RtModuleLinker>>,
}

impl RtLinkerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, linker: impl RtModuleLinker + 'static) -> Self {
        self.linkers.push(Box::new(linker));
        self
    }
}

impl RtModuleLinker for RtLinkerChain {
    fn accepts(&self, descriptor: &RtModuleDescriptor) -> bool {
        self.linkers.iter().any(|l| l.accepts(descriptor))
    }

    fn link(&self, descriptor: &RtModuleDescriptor, image: &RtModuleImage) -> Result<RtLinkedModule> {
        match self.linkers.iter().find(|l| l.accepts(descriptor)) {
            Some(linker) => linker.link(descriptor, image),
            None => Err(RtError::link(
                &descriptor.module_id,
                "no linker accepts this module",
            )),
        }
    }
}
