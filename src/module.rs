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

//! # Rtx Module Runtime
//!
//! Loading, sandboxing and lifecycle of pluggable modules.
//!
//! ## Core Concepts
//!
//! - **RtModuleImage**: the bytes of one module, a ZIP with a `module.json`
//! - **RtModuleInspector**: reads an image's metadata without linking it
//! - **RtModuleRegistry**: module id reservations and conflict detection
//! - **RtLoadContext**: owns linked modules and drives their entry points
//! - **RtModuleManager**: the full pipeline across static and dynamic contexts

pub mod attributes;
pub mod context;
pub mod descriptor;
pub mod entry;
pub mod image;
pub mod inspector;
pub mod linker;
pub mod manager;
#[cfg(feature = "live-reload")]
pub mod reload;
pub mod registry;

pub use attributes::{
    RtAttributeRecord, RtAttributeValue, RtModuleAttribute, RtModuleMetadata, RtPropertyBag,
    MODULE_ATTRIBUTE, SKIP_IF_SANDBOXED_ATTRIBUTE,
};
pub use context::{RtLoadContext, RtModuleHandle, RtUnloadedModule};
pub use descriptor::{RtModuleDescriptor, RtModuleKind, RtModuleVersion};
pub use entry::{
    RtDependencies, RtEntryPoint, RtEntryPointFactory, RtEntryPointHost, RtEntryState,
    RtFrameArgs, RtReloadListener, RtReloadableEntryPoint, RtRunLevel, RtTestingCallbacks,
    RtUpdateLevel,
};
pub use image::{RtModuleImage, METADATA_ENTRY};
pub use inspector::{RtInspectorGauge, RtInspectorGuard, RtModuleInspector};
pub use linker::{
    RtLinkedModule, RtLinkerChain, RtLoadRegion, RtManifestFn, RtModuleLinker, RtModuleManifest,
    RtNativeLinker, RtStaticLinker, MANIFEST_SYMBOL,
};
pub use manager::{RtBatchReport, RtModuleManager, RtSkippedModule, DYNAMIC_CONTEXT_ID, STATIC_CONTEXT_ID};
#[cfg(feature = "live-reload")]
pub use reload::RtReloadReport;
pub use registry::{RtConflict, RtConflictSource, RtModuleRegistry, RtPendingSet, RtReservation};
