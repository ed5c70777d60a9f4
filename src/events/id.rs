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

//! # Event Identifiers
//!
//! An event id is a `(name, category)` pair. Ids render as `category:name`
//! and carry a stable 64-bit hash derived with BLAKE3, so both ends of a
//! networked hand-off agree on it without exchanging strings.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Category used when an id is built from a bare name.
pub const DEFAULT_CATEGORY: &str = "unsorted";

#[derive(Clone)]
pub struct RtEventId {
    name: Arc<str>,
    category: Arc<str>,
    hash: u64,
}

impl RtEventId {
    pub fn new(name: impl AsRef<str>, category: impl AsRef<str>) -> Self {
        let name: Arc<str> = Arc::from(name.as_ref());
        let category: Arc<str> = Arc::from(category.as_ref());
        let hash = stable_hash(&name, &category);
        Self {
            name,
            category,
            hash,
        }
    }

    /// Id in the default category.
    pub fn named(name: impl AsRef<str>) -> Self {
        Self::new(name, DEFAULT_CATEGORY)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn stable_hash(&self) -> u64 {
        self.hash
    }
}

fn stable_hash(name: &str, category: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(category.as_bytes());
    hasher.update(&[0]);
    hasher.update(name.as_bytes());
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(head)
}

impl PartialEq for RtEventId {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.name == other.name && self.category == other.category
    }
}

impl Eq for RtEventId {}

impl Hash for RtEventId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for RtEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}

impl fmt::Debug for RtEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RtEventId({})", self)
    }
}

impl From<&str> for RtEventId {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for RtEventId {
    fn from(name: String) -> Self {
        Self::named(name)
    }
}

impl From<(&str, &str)> for RtEventId {
    fn from((name, category): (&str, &str)) -> Self {
        Self::new(name, category)
    }
}

impl From<&RtEventId> for RtEventId {
    fn from(id: &RtEventId) -> Self {
        id.clone()
    }
}
