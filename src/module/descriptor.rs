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

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, RtError};
use crate::module::attributes::RtPropertyBag;

/// Module version in `major.minor.patch[-pre]` form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RtModuleVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub pre_release: Option<String>,
}

impl RtModuleVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        RtModuleVersion {
            major,
            minor,
            patch,
            pre_release: None,
        }
    }

    pub fn parse(version_str: &str) -> Result<Self> {
        let parts: Vec<&str> = version_str.trim().splitn(3, '.').collect();
        if parts.len() < 3 {
            return Err(RtError::validation(format!(
                "invalid version '{}', expected major.minor.patch",
                version_str
            )));
        }

        let major = parts[0]
            .parse::<u32>()
            .map_err(|_| RtError::validation("invalid major version"))?;
        let minor = parts[1]
            .parse::<u32>()
            .map_err(|_| RtError::validation("invalid minor version"))?;

        let (patch_str, pre_release) = match parts[2].split_once('-') {
            Some((patch, pre)) if !pre.is_empty() => (patch, Some(pre.to_string())),
            Some(_) => return Err(RtError::validation("empty pre-release tag")),
            None => (parts[2], None),
        };
        let patch = patch_str
            .parse::<u32>()
            .map_err(|_| RtError::validation("invalid patch version"))?;

        Ok(RtModuleVersion {
            major,
            minor,
            patch,
            pre_release,
        })
    }
}

impl Default for RtModuleVersion {
    fn default() -> Self {
        RtModuleVersion::new(1, 0, 0)
    }
}

impl fmt::Display for RtModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pre_release {
            Some(pre) => write!(f, "{}.{}.{}-{}", self.major, self.minor, self.patch, pre),
            None => write!(f, "{}.{}.{}", self.major, self.minor, self.patch),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RtModuleKind {
    Content,
    Engine,
}

/// Everything the runtime knows about a module before it is linked.
/// Produced by the inspector and never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RtModuleDescriptor {
    pub assembly_name: String,
    pub module_id: String,
    pub is_content_module: bool,
    pub supports_reload: bool,
    pub is_sandboxed: bool,
    /// In declaration order.
    pub referenced_module_names: Vec<String>,
    pub declared_attributes: BTreeMap<String, RtPropertyBag>,
    pub version: RtModuleVersion,
    pub library: Option<String>,
    pub fingerprint: String,
    pub path: Option<PathBuf>,
}

impl RtModuleDescriptor {
    pub fn kind(&self) -> RtModuleKind {
        if self.is_content_module {
            RtModuleKind::Content
        } else {
            RtModuleKind::Engine
        }
    }

    pub fn has_attribute(&self, type_id: &str) -> bool {
        self.declared_attributes.contains_key(type_id)
    }

    pub fn references(&self, name: &str) -> bool {
        self.referenced_module_names.iter().any(|r| r == name)
    }
}
