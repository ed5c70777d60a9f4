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

//! Module metadata as stored in the `module.json` entry of a module image,
//! plus decoding of the declarative attributes the runtime understands.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, RtError};

/// Declarative module attribute: id, content flag, reload and sandbox flags.
pub const MODULE_ATTRIBUTE: &str = "rtx.module";

/// Legacy marker that turns sandboxing off for the module that carries it.
pub const SKIP_IF_SANDBOXED_ATTRIBUTE: &str = "rtx.skip_if_sandboxed";

/// One property value of a declared attribute.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RtAttributeValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

/// Decoded property bag of one attribute.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RtPropertyBag(BTreeMap<String, RtAttributeValue>);

impl RtPropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: RtAttributeValue) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&RtAttributeValue> {
        self.0.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(RtAttributeValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(RtAttributeValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(RtAttributeValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn get_str_array(&self, key: &str) -> Option<&[String]> {
        match self.0.get(key) {
            Some(RtAttributeValue::List(items)) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn typed_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.0.get(key) {
            None => Ok(default),
            Some(RtAttributeValue::Bool(b)) => Ok(*b),
            Some(other) => Err(RtError::validation(format!(
                "property '{}' must be a bool, got {:?}",
                key, other
            ))),
        }
    }
}

/// One `{type, properties}` record in the metadata entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RtAttributeRecord {
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(default)]
    pub properties: RtPropertyBag,
}

impl RtAttributeRecord {
    pub fn new(type_id: impl Into<String>, properties: RtPropertyBag) -> Self {
        RtAttributeRecord {
            type_id: type_id.into(),
            properties,
        }
    }
}

/// Contents of the `module.json` entry.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RtModuleMetadata {
    pub assembly_name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub references: Vec<String>,
    /// Archive entry holding the native library, if the module ships one.
    #[serde(default)]
    pub library: Option<String>,
    #[serde(default)]
    pub attributes: Vec<RtAttributeRecord>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl RtModuleMetadata {
    pub fn new(assembly_name: impl Into<String>) -> Self {
        RtModuleMetadata {
            assembly_name: assembly_name.into(),
            version: default_version(),
            references: Vec::new(),
            library: None,
            attributes: Vec::new(),
        }
    }

    pub fn reference(mut self, name: impl Into<String>) -> Self {
        self.references.push(name.into());
        self
    }

    pub fn attribute(mut self, record: RtAttributeRecord) -> Self {
        self.attributes.push(record);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn library(mut self, entry: impl Into<String>) -> Self {
        self.library = Some(entry.into());
        self
    }

    /// Attribute records keyed by type. A type may appear only once.
    pub fn attribute_map(&self) -> Result<BTreeMap<String, RtPropertyBag>> {
        let mut out = BTreeMap::new();
        for record in &self.attributes {
            if record.type_id.is_empty() {
                return Err(RtError::validation("attribute type must not be empty"));
            }
            if out
                .insert(record.type_id.clone(), record.properties.clone())
                .is_some()
            {
                return Err(RtError::validation(format!(
                    "attribute '{}' declared more than once",
                    record.type_id
                )));
            }
        }
        Ok(out)
    }
}

/// Decoded form of [`MODULE_ATTRIBUTE`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RtModuleAttribute {
    pub id: Option<String>,
    pub is_content_assembly: bool,
    pub supports_live_reloading: bool,
    pub is_sandboxed: bool,
}

impl Default for RtModuleAttribute {
    fn default() -> Self {
        RtModuleAttribute {
            id: None,
            is_content_assembly: true,
            supports_live_reloading: false,
            is_sandboxed: true,
        }
    }
}

impl RtModuleAttribute {
    pub fn from_bag(bag: &RtPropertyBag) -> Result<Self> {
        let base = RtModuleAttribute::default();
        let id = match bag.get("id") {
            None => None,
            Some(RtAttributeValue::Text(s)) if s.is_empty() => {
                return Err(RtError::validation("declared module id is empty"));
            }
            Some(RtAttributeValue::Text(s)) => Some(s.clone()),
            Some(other) => {
                return Err(RtError::validation(format!(
                    "property 'id' must be a string, got {:?}",
                    other
                )));
            }
        };
        Ok(RtModuleAttribute {
            id,
            is_content_assembly: bag.typed_bool("is_content_assembly", base.is_content_assembly)?,
            supports_live_reloading: bag
                .typed_bool("supports_live_reloading", base.supports_live_reloading)?,
            is_sandboxed: bag.typed_bool("is_sandboxed", base.is_sandboxed)?,
        })
    }

    pub fn to_record(&self) -> RtAttributeRecord {
        let mut bag = RtPropertyBag::new()
            .with("is_content_assembly", RtAttributeValue::Bool(self.is_content_assembly))
            .with(
                "supports_live_reloading",
                RtAttributeValue::Bool(self.supports_live_reloading),
            )
            .with("is_sandboxed", RtAttributeValue::Bool(self.is_sandboxed));
        if let Some(id) = &self.id {
            bag = bag.with("id", RtAttributeValue::Text(id.clone()));
        }
        RtAttributeRecord::new(MODULE_ATTRIBUTE, bag)
    }
}
