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

//! # Event Controllers
//!
//! A controller declares the event ids it owns in `define_ids`. The bus runs
//! that callback once, while registration is open, and hands it an
//! `RtIdRegistrar` that only exists for the duration of the call. The ids a
//! controller declares are remembered so `subscribe_all` can find them by
//! payload type.

use std::any::TypeId;
use std::collections::HashMap;

use crate::errors::Result;
use crate::events::bus::RtEventBus;
use crate::events::id::RtEventId;
use crate::events::origin::RtOrigin;

pub trait RtEventController {
    /// Name used in logs and in `RtEventBus::controller_names`.
    fn name(&self) -> &str;

    /// Declares this controller's ids. `is_server` is the authority flag.
    fn define_ids(&self, ids: &mut RtIdRegistrar<'_>, is_server: bool) -> Result<()>;
}

/// Ids one controller declared, grouped by payload type.
#[derive(Debug, Default)]
pub(crate) struct RtControllerRecord {
    pub(crate) name: String,
    pub(crate) ids: HashMap<TypeId, Vec<RtEventId>>,
}

/// Registration handle passed to `RtEventController::define_ids`.
pub struct RtIdRegistrar<'a> {
    bus: &'a mut RtEventBus,
    record: RtControllerRecord,
}

impl<'a> RtIdRegistrar<'a> {
    pub(crate) fn new(bus: &'a mut RtEventBus, name: &str) -> Self {
        Self {
            bus,
            record: RtControllerRecord {
                name: name.to_string(),
                ids: HashMap::new(),
            },
        }
    }

    pub(crate) fn finish(self) -> RtControllerRecord {
        self.record
    }

    pub fn is_server(&self) -> bool {
        self.bus.is_server()
    }

    /// Registers `category:name` for payload `T`.
    pub fn register_id<T: 'static>(
        &mut self,
        name: &str,
        category: &str,
        allowed: RtOrigin,
    ) -> Result<RtEventId> {
        let id = RtEventId::new(name, category);
        self.bus.register_event_id::<T>(&id, allowed)?;
        let ids = self.record.ids.entry(TypeId::of::<T>()).or_default();
        if !ids.contains(&id) {
            ids.push(id.clone());
        }
        Ok(id)
    }

    /// Registers a local-only id.
    pub fn register_local<T: 'static>(&mut self, name: &str, category: &str) -> Result<RtEventId> {
        self.register_id::<T>(name, category, RtOrigin::LOCAL)
    }

    /// Registers an id raised by the authority: both origins on the server,
    /// networked only on clients.
    pub fn register_authoritative_id<T: 'static>(
        &mut self,
        name: &str,
        category: &str,
    ) -> Result<RtEventId> {
        let allowed = if self.bus.is_server() {
            RtOrigin::BOTH
        } else {
            RtOrigin::NETWORKED
        };
        self.register_id::<T>(name, category, allowed)
    }
}
