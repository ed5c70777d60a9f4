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

//! # Rtx Configuration
//!
//! Host-facing configuration for the module runtime. Configuration is plain
//! serde data; files may be JSON or YAML and are chosen by extension.
//!
//! ```yaml
//! content_prefix: "Content."
//! sandboxing_enabled: true
//! live_reload_enabled: true
//! is_server: false
//! core_modules: ["Robust.Shared", "Robust.Client"]
//! sandbox:
//!   allowed_references: ["System.", "Robust."]
//! log:
//!   default_level: INFO
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, RtError};
use crate::logger::{RtLogConfig, RtLogConfigBuilder};

pub const DEFAULT_CONTENT_PREFIX: &str = "Content.";

/// Reference policy applied to sandboxed modules.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RtSandboxConfig {
    /// Name prefixes a sandboxed module may reference besides core modules
    /// and modules already known to the runtime.
    pub allowed_references: Vec<String>,
}

impl RtSandboxConfig {
    pub fn allows(&self, reference: &str) -> bool {
        self.allowed_references
            .iter()
            .any(|prefix| reference.starts_with(prefix.as_str()))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RtConfig {
    pub content_prefix: String,
    pub sandboxing_enabled: bool,
    pub live_reload_enabled: bool,
    /// Whether this process is the authority for networked events.
    pub is_server: bool,
    /// Assemblies that are always present and can never be shadowed.
    pub core_modules: Vec<String>,
    pub sandbox: RtSandboxConfig,
    pub log: RtLogConfig,
}

impl Default for RtConfig {
    fn default() -> Self {
        RtConfig {
            content_prefix: DEFAULT_CONTENT_PREFIX.to_string(),
            sandboxing_enabled: true,
            live_reload_enabled: false,
            is_server: false,
            core_modules: Vec::new(),
            sandbox: RtSandboxConfig::default(),
            log: RtLogConfig::default(),
        }
    }
}

impl RtConfig {
    pub fn builder() -> RtConfigBuilder {
        RtConfigBuilder::default()
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let builder: RtConfigBuilder = serde_json::from_str(text)?;
        builder.validated()
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let builder: RtConfigBuilder = serde_yaml::from_str(text)?;
        builder.validated()
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => Self::from_json_str(&text),
            "yaml" | "yml" => Self::from_yaml_str(&text),
            other => Err(RtError::validation(format!(
                "unsupported config extension '{}' for {}",
                other,
                path.display()
            ))),
        }
    }

    pub fn is_core_module(&self, name: &str) -> bool {
        self.core_modules.iter().any(|m| m == name)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RtConfigBuilder {
    pub content_prefix: Option<String>,
    pub sandboxing_enabled: Option<bool>,
    pub live_reload_enabled: Option<bool>,
    pub is_server: Option<bool>,
    pub core_modules: Option<Vec<String>>,
    pub sandbox: Option<RtSandboxConfig>,
    pub log: Option<RtLogConfigBuilder>,
}

impl RtConfigBuilder {
    pub fn content_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.content_prefix = Some(prefix.into());
        self
    }

    pub fn sandboxing_enabled(mut self, enabled: bool) -> Self {
        self.sandboxing_enabled = Some(enabled);
        self
    }

    pub fn live_reload_enabled(mut self, enabled: bool) -> Self {
        self.live_reload_enabled = Some(enabled);
        self
    }

    pub fn is_server(mut self, is_server: bool) -> Self {
        self.is_server = Some(is_server);
        self
    }

    pub fn core_module(mut self, name: impl Into<String>) -> Self {
        self.core_modules.get_or_insert_with(Vec::new).push(name.into());
        self
    }

    pub fn allow_reference(mut self, prefix: impl Into<String>) -> Self {
        self.sandbox
            .get_or_insert_with(RtSandboxConfig::default)
            .allowed_references
            .push(prefix.into());
        self
    }

    pub fn build(self) -> RtConfig {
        let base = RtConfig::default();
        RtConfig {
            content_prefix: self.content_prefix.unwrap_or(base.content_prefix),
            sandboxing_enabled: self.sandboxing_enabled.unwrap_or(base.sandboxing_enabled),
            live_reload_enabled: self
                .live_reload_enabled
                .unwrap_or(base.live_reload_enabled),
            is_server: self.is_server.unwrap_or(base.is_server),
            core_modules: self.core_modules.unwrap_or(base.core_modules),
            sandbox: self.sandbox.unwrap_or(base.sandbox),
            log: self.log.map(RtLogConfigBuilder::build).unwrap_or(base.log),
        }
    }

    /// Build and reject values the runtime cannot work with.
    pub fn validated(self) -> Result<RtConfig> {
        let config = self.build();
        if config.content_prefix.is_empty() {
            return Err(RtError::validation("content_prefix must not be empty"));
        }
        if let Some(empty) = config.core_modules.iter().position(|m| m.is_empty()) {
            return Err(RtError::validation(format!(
                "core_modules[{}] is empty",
                empty
            )));
        }
        Ok(config)
    }

    pub fn from_json(value: &Value) -> Result<RtConfig> {
        let builder: RtConfigBuilder = serde_json::from_value(value.clone())?;
        builder.validated()
    }
}
