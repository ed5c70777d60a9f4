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

//! # Rtx Logger Module
//!
//! Structured log sink for the `log` facade.
//!
//! Every component in Rtx logs through `log::{debug,info,warn,error}!` with a
//! hierarchical target (`rtx.mod`, `rtx.mod.loader`, `rtgt.named_events`, ...)
//! and an event-first message (`mod.registry.conflict: ... - key=value`).
//! Hosts may install their own logger; [`RtLogger`] is the one shipped with
//! the crate and is configured by [`RtLogConfig`].

pub mod config;
pub mod core;

pub use self::config::{RtLogConfig, RtLogConfigBuilder};
pub use self::core::{RtLogHandler, RtLogRecord, RtLogger, RtMemoryHandler, RtStderrHandler};
