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

//! # Rtx Core Library
//!
//! Module loading and typed event dispatch for game engines.
//!
//! ## Module Overview
//!
//! - **module**: inspection, registry, load contexts, entry points, the module
//!   manager and the live reload protocol
//! - **events**: the registration-locked typed event bus shared by named
//!   events, sensors and telemetry
//! - **config**: runtime configuration loaded from JSON or YAML
//! - **logger**: an optional `log` sink with per-target levels
//! - **errors**: the `RtError` type and `Result` alias
//!
//! ## Feature Flags
//!
//! - `parallel`: inspects batch images on the Rayon thread pool
//! - `live-reload`: the dynamic context reload protocol
//! - `full`: enables all features
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use rtx::{RtConfig, RtModuleImage, RtModuleManager, RtModuleManifest, RtModuleMetadata, RtRunLevel, RtStaticLinker};
//!
//! let linker = RtStaticLinker::new().with("Content.Shared", RtModuleManifest::new());
//! let mut manager = RtModuleManager::new(RtConfig::default(), Arc::new(linker));
//!
//! let image = RtModuleImage::pack(&RtModuleMetadata::new("Content.Shared"), &[]).unwrap();
//! manager.load_image(image).unwrap();
//! manager.broadcast_run_level(RtRunLevel::PreInit);
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return `Result<T, RtError>`. Soft conditions such
//! as unsubscribing twice log a warning instead of failing.

pub mod config;
pub mod errors;
pub mod events;
pub mod logger;
pub mod module;

pub use config::{RtConfig, RtConfigBuilder, RtSandboxConfig, DEFAULT_CONTENT_PREFIX};
pub use errors::{Result, RtError};
pub use events::{
    RtEventBus, RtEventController, RtEventId, RtEventTransport, RtIdFilter, RtIdRegistrar,
    RtNullTransport, RtOrigin, RtOutboundEvent, RtSubscriberToken, RtTableState,
    DEFAULT_CATEGORY,
};
pub use logger::{RtLogConfig, RtLogConfigBuilder, RtLogger, RtMemoryHandler};
pub use module::{
    RtBatchReport, RtDependencies, RtEntryPoint, RtEntryPointFactory, RtEntryState, RtFrameArgs,
    RtLoadContext, RtModuleAttribute, RtModuleDescriptor, RtModuleHandle, RtModuleImage,
    RtModuleInspector, RtModuleKind, RtModuleLinker, RtModuleManager, RtModuleManifest,
    RtModuleMetadata, RtModuleRegistry, RtModuleVersion, RtNativeLinker, RtReloadListener,
    RtReloadableEntryPoint, RtRunLevel, RtStaticLinker, RtUpdateLevel,
};
