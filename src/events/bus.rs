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

//! # Event Bus
//!
//! Typed multicast keyed by `(payload type, event id)`.
//!
//! ## Lifecycle
//!
//! 1. `startup` (or a fresh bus): registration is open. Ids are registered
//!    directly or through controllers, and subscriptions are added.
//! 2. `post_start`: the table is locked and snapshotted. From here on
//!    registration and subscription changes fail with a sequence error and
//!    raises read the snapshot.
//! 3. `shutdown` / `cleanup`: the table is locked and cleared.
//!
//! ## Dispatch
//!
//! A raise with a `LOCAL` target runs the enabled subscribers whose mask
//! contains `LOCAL`, in subscription order. A `NETWORKED` target hands the
//! payload to the transport. `BOTH` does the local part first.
//!
//! Named events, sensors and telemetry are the same bus with different
//! channel names; the channel only changes the log target.

use std::any::{type_name, Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::config::RtConfig;
use crate::errors::{Result, RtError};
use crate::events::controller::{RtControllerRecord, RtEventController, RtIdRegistrar};
use crate::events::id::RtEventId;
use crate::events::origin::RtOrigin;
use crate::events::table::{
    RtEventTable, RtHandler, RtSubscriberToken, RtSubscription, RtTableState,
};
use crate::events::transport::{RtEventTransport, RtNullTransport, RtOutboundEvent};

pub const NAMED_EVENTS_CHANNEL: &str = "named_events";
pub const SENSORS_CHANNEL: &str = "sensors";
pub const TELEMETRY_CHANNEL: &str = "telemetry";

/// Selects controller-declared ids for `subscribe_all` and `unsubscribe_all`.
#[derive(Clone, Debug)]
pub struct RtIdFilter {
    origins: RtOrigin,
    category: Option<String>,
    ignore: Vec<RtEventId>,
}

impl Default for RtIdFilter {
    fn default() -> Self {
        Self {
            origins: RtOrigin::BOTH,
            category: None,
            ignore: Vec::new(),
        }
    }
}

impl RtIdFilter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Origins to subscribe with, intersected with each id's allowed set.
    pub fn origins(mut self, origins: RtOrigin) -> Self {
        self.origins = origins;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn ignore(mut self, id: impl Into<RtEventId>) -> Self {
        self.ignore.push(id.into());
        self
    }

    fn admits(&self, id: &RtEventId) -> bool {
        if let Some(category) = &self.category {
            if category != id.category() {
                return false;
            }
        }
        !self.ignore.contains(id)
    }
}

pub struct RtEventBus {
    channel: String,
    target: String,
    is_server: bool,
    transport: Arc<dyn RtEventTransport>,
    table: RtEventTable,
    controllers: Vec<RtControllerRecord>,
}

impl fmt::Debug for RtEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtEventBus")
            .field("channel", &self.channel)
            .field("is_server", &self.is_server)
            .field("state", &self.table.state())
            .field("registrations", &self.table.len())
            .field("controllers", &self.controllers.len())
            .finish()
    }
}

impl RtEventBus {
    /// A bus with open registration and no network transport.
    pub fn new(channel: impl Into<String>, is_server: bool) -> Self {
        let channel = channel.into();
        let target = format!("rtgt.{}", channel);
        Self {
            channel,
            target,
            is_server,
            transport: Arc::new(RtNullTransport),
            table: RtEventTable::default(),
            controllers: Vec::new(),
        }
    }

    pub fn named_events(is_server: bool) -> Self {
        Self::new(NAMED_EVENTS_CHANNEL, is_server)
    }

    pub fn sensors(is_server: bool) -> Self {
        Self::new(SENSORS_CHANNEL, is_server)
    }

    pub fn telemetry(is_server: bool) -> Self {
        Self::new(TELEMETRY_CHANNEL, is_server)
    }

    /// A bus whose authority flag comes from the runtime configuration.
    pub fn from_config(config: &RtConfig, channel: impl Into<String>) -> Self {
        Self::new(channel, config.is_server)
    }

    pub fn with_transport(mut self, transport: Arc<dyn RtEventTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    pub fn state(&self) -> RtTableState {
        self.table.state()
    }

    pub fn is_locked(&self) -> bool {
        self.table.is_locked()
    }

    /// Number of `(type, id)` registrations.
    pub fn registration_count(&self) -> usize {
        self.table.len()
    }

    pub fn is_registered<T: 'static>(&self, id: &RtEventId) -> bool {
        self.table.slot::<T>(id).is_some()
    }

    pub fn allowed_origins<T: 'static>(&self, id: &RtEventId) -> Option<RtOrigin> {
        self.table.slot::<T>(id).map(|slot| slot.allowed())
    }

    /// Enabled and disabled subscribers of a registration.
    pub fn subscriber_count<T: 'static>(&self, id: &RtEventId) -> usize {
        self.table
            .slot::<T>(id)
            .map(|slot| slot.subscriber_count())
            .unwrap_or(0)
    }

    pub fn enabled_subscriber_count<T: 'static>(&self, id: &RtEventId) -> usize {
        self.table
            .slot::<T>(id)
            .map(|slot| slot.enabled_count())
            .unwrap_or(0)
    }

    pub fn is_triggered<T: 'static>(&self, id: &RtEventId) -> bool {
        self.table
            .slot::<T>(id)
            .map(|slot| slot.is_triggered())
            .unwrap_or(false)
    }

    pub fn controller_names(&self) -> Vec<&str> {
        self.controllers.iter().map(|c| c.name.as_str()).collect()
    }

    fn ensure_unlocked(&self, action: &str, id: Option<&RtEventId>) -> Result<()> {
        if !self.table.is_locked() {
            return Ok(());
        }
        let shown = id.map(|i| i.to_string()).unwrap_or_default();
        log::error!(
            target: self.target.as_str(),
            "events.locked: registrations are locked - action={}, id={}",
            action,
            shown
        );
        Err(RtError::sequence(format!(
            "registrations locked, cannot {} '{}'; register events from a controller during setup",
            action, shown
        )))
    }

    /// Registers payload `T` under `id`.
    ///
    /// Registering the same pair again logs a warning and keeps the first
    /// registration.
    pub fn register_event_id<T: 'static>(
        &mut self,
        id: impl Into<RtEventId>,
        allowed: RtOrigin,
    ) -> Result<()> {
        let id = id.into();
        if allowed.is_empty() {
            return Err(RtError::validation(format!(
                "event '{}' has an invalid origin value",
                id
            )));
        }
        self.ensure_unlocked("register", Some(&id))?;

        if self.table.insert::<T>(id.clone(), allowed) {
            log::debug!(
                target: self.target.as_str(),
                "events.register: event id registered - id={}, type={}, allowed={}",
                id,
                type_name::<T>(),
                allowed
            );
        } else {
            log::warn!(
                target: self.target.as_str(),
                "events.register.duplicate: event id was already registered - id={}, type={}",
                id,
                type_name::<T>()
            );
        }
        Ok(())
    }

    fn add_subscription<T: 'static>(
        &mut self,
        id: &RtEventId,
        origin: RtOrigin,
        token: RtSubscriberToken,
        handler: RtHandler<T>,
    ) -> Result<()> {
        self.ensure_unlocked("subscribe to", Some(id))?;
        if origin.is_empty() {
            return Err(RtError::validation(format!(
                "subscription to '{}' has an empty origin mask",
                id
            )));
        }
        let target = self.target.as_str();
        let slot = match self.table.slot_mut::<T>(id) {
            Some(slot) => slot,
            None => {
                return Err(RtError::sequence(format!(
                    "cannot subscribe to unregistered event '{}' ({})",
                    id,
                    type_name::<T>()
                )))
            }
        };
        if !slot.allowed().contains(origin) {
            return Err(RtError::sequence(format!(
                "subscription origin {} is not allowed for event '{}' (allowed {})",
                origin,
                id,
                slot.allowed()
            )));
        }
        if !slot.add(RtSubscription {
            mask: origin,
            token,
            handler,
        }) {
            log::error!(
                target: target,
                "events.subscribe.duplicate: subscriber already subscribed - id={}, type={}, token={}",
                id,
                type_name::<T>(),
                token
            );
            return Err(RtError::conflict(id.to_string(), format!("subscription {}", token)));
        }
        Ok(())
    }

    /// Subscribes a handler that reads the payload.
    pub fn subscribe<T, F>(
        &mut self,
        id: &RtEventId,
        origin: RtOrigin,
        token: RtSubscriberToken,
        handler: F,
    ) -> Result<()>
    where
        T: 'static,
        F: Fn(&RtEventId, &T) + Send + Sync + 'static,
    {
        let handler: RtHandler<T> =
            Arc::new(move |id: &RtEventId, payload: &mut T| handler(id, &*payload));
        self.add_subscription(id, origin, token, handler)
    }

    /// Subscribes a handler that may modify the payload. Later subscribers
    /// and the caller see the change.
    pub fn subscribe_ref<T, F>(
        &mut self,
        id: &RtEventId,
        origin: RtOrigin,
        token: RtSubscriberToken,
        handler: F,
    ) -> Result<()>
    where
        T: 'static,
        F: Fn(&RtEventId, &mut T) + Send + Sync + 'static,
    {
        self.add_subscription(id, origin, token, Arc::new(handler))
    }

    /// Removes a subscription. Returns whether one was removed.
    ///
    /// An unknown id or token is not an error; `warn_if_missing` logs it.
    pub fn unsubscribe<T: 'static>(
        &mut self,
        id: &RtEventId,
        token: RtSubscriberToken,
        warn_if_missing: bool,
    ) -> Result<bool> {
        self.ensure_unlocked("unsubscribe from", Some(id))?;
        let removed = self
            .table
            .slot_mut::<T>(id)
            .map(|slot| slot.remove(token))
            .unwrap_or(false);
        if !removed && warn_if_missing {
            log::warn!(
                target: self.target.as_str(),
                "events.unsubscribe.missing: no such subscription - id={}, type={}, token={}",
                id,
                type_name::<T>(),
                token
            );
        }
        Ok(removed)
    }

    /// Enables or disables a subscription without losing its place in the
    /// table. Returns whether the subscription exists.
    pub fn set_subscription_enabled<T: 'static>(
        &mut self,
        id: &RtEventId,
        token: RtSubscriberToken,
        enabled: bool,
    ) -> Result<bool> {
        self.ensure_unlocked("toggle a subscription on", Some(id))?;
        Ok(self
            .table
            .slot_mut::<T>(id)
            .map(|slot| slot.set_enabled(token, enabled))
            .unwrap_or(false))
    }

    /// Raises an event. Returns the number of local handlers invoked.
    ///
    /// Unregistered pairs are ignored. A target outside the registration's
    /// allowed origins logs a warning and does nothing. A one-shot raise
    /// fires once until `reset_one_shot`.
    pub fn raise<T: 'static>(
        &self,
        id: &RtEventId,
        payload: &mut T,
        one_shot: bool,
        target: RtOrigin,
    ) -> usize {
        let slot = match self.table.slot::<T>(id) {
            Some(slot) => slot,
            None => return 0,
        };
        let effective = target & slot.allowed();
        if effective.is_empty() {
            log::warn!(
                target: self.target.as_str(),
                "events.raise.invalid_target: target not allowed for event - id={}, type={}, target={}, allowed={}",
                id,
                type_name::<T>(),
                target,
                slot.allowed()
            );
            return 0;
        }
        if one_shot && !slot.latch() {
            return 0;
        }

        let mut invoked = 0;
        if effective.has_local() {
            invoked = slot.dispatch(id, payload, RtOrigin::LOCAL);
        }
        if effective.has_networked() {
            let payload: &T = payload;
            self.transport.send(RtOutboundEvent {
                id,
                type_id: TypeId::of::<T>(),
                type_name: type_name::<T>(),
                payload: payload as &dyn Any,
                one_shot,
                is_server: self.is_server,
            });
        }
        invoked
    }

    /// `raise` with a local target and no latch.
    pub fn raise_local<T: 'static>(&self, id: &RtEventId, payload: &mut T) -> usize {
        self.raise(id, payload, false, RtOrigin::LOCAL)
    }

    /// Delivers an event that arrived from the network to subscribers whose
    /// mask contains `NETWORKED`.
    pub fn receive_networked<T: 'static>(
        &self,
        id: &RtEventId,
        payload: &mut T,
        one_shot: bool,
    ) -> usize {
        let slot = match self.table.slot::<T>(id) {
            Some(slot) => slot,
            None => {
                log::error!(
                    target: self.target.as_str(),
                    "events.receive.unknown: no registration for networked event - id={}, type={}",
                    id,
                    type_name::<T>()
                );
                return 0;
            }
        };
        if one_shot && !slot.latch() {
            return 0;
        }
        slot.dispatch(id, payload, RtOrigin::NETWORKED)
    }

    /// Re-arms a one-shot event. Returns false for an unregistered pair.
    pub fn reset_one_shot<T: 'static>(&self, id: &RtEventId) -> bool {
        match self.table.slot::<T>(id) {
            Some(slot) => {
                slot.reset_latch();
                true
            }
            None => false,
        }
    }

    /// Locks or unlocks registration. Setting the current state again does
    /// nothing.
    pub fn set_lock(&mut self, locked: bool) {
        if self.table.is_locked() == locked {
            return;
        }
        if locked {
            log::debug!(target: self.target.as_str(), "events.lock: locking registrations");
            self.table.lock();
        } else {
            log::debug!(target: self.target.as_str(), "events.unlock: unlocking registrations");
            self.table.unlock();
        }
    }

    pub fn startup(&mut self) {
        log::debug!(target: self.target.as_str(), "events.startup: initializing - channel={}", self.channel);
        self.set_lock(false);
    }

    pub fn post_start(&mut self) {
        self.set_lock(true);
        log::debug!(
            target: self.target.as_str(),
            "events.ready: init complete - channel={}, registrations={}",
            self.channel,
            self.table.len()
        );
    }

    pub fn shutdown(&mut self) {
        self.terminate();
    }

    pub fn cleanup(&mut self) {
        self.terminate();
    }

    fn terminate(&mut self) {
        self.set_lock(true);
        self.table.clear();
        self.controllers.clear();
        log::debug!(target: self.target.as_str(), "events.terminate: table cleared - channel={}", self.channel);
    }

    /// Runs a controller's `define_ids` and remembers the ids it declared.
    pub fn register_controller(&mut self, controller: &dyn RtEventController) -> Result<()> {
        self.ensure_unlocked("register controller", None)?;
        let is_server = self.is_server;
        let mut registrar = RtIdRegistrar::new(self, controller.name());
        let outcome = controller.define_ids(&mut registrar, is_server);
        let record = registrar.finish();
        outcome?;

        log::info!(
            target: self.target.as_str(),
            "events.controller.registered: controller ids defined - controller={}, ids={}",
            record.name,
            record.ids.values().map(Vec::len).sum::<usize>()
        );
        self.controllers.push(record);
        Ok(())
    }

    /// Controller-declared ids for payload `T`, in declaration order.
    fn declared_ids<T: 'static>(&self, filter: &RtIdFilter) -> Vec<RtEventId> {
        let mut seen = HashSet::new();
        self.controllers
            .iter()
            .filter_map(|c| c.ids.get(&TypeId::of::<T>()))
            .flatten()
            .filter(|id| filter.admits(id) && seen.insert((*id).clone()))
            .cloned()
            .collect()
    }

    fn subscribe_all_handler<T: 'static>(
        &mut self,
        token: RtSubscriberToken,
        filter: &RtIdFilter,
        handler: RtHandler<T>,
    ) -> Result<usize> {
        self.ensure_unlocked("subscribe to all of", None)?;

        // Every target is checked before the first insert, so a failure
        // leaves the table as it was.
        let mut planned = Vec::new();
        for id in self.declared_ids::<T>(filter) {
            let slot = match self.table.slot::<T>(&id) {
                Some(slot) => slot,
                None => continue,
            };
            let mask = filter.origins & slot.allowed();
            if mask.is_empty() {
                continue;
            }
            if slot.contains(token) {
                log::error!(
                    target: self.target.as_str(),
                    "events.subscribe.duplicate: subscriber already subscribed - id={}, type={}, token={}",
                    id,
                    type_name::<T>(),
                    token
                );
                return Err(RtError::conflict(id.to_string(), format!("subscription {}", token)));
            }
            planned.push((id, mask));
        }

        for (id, mask) in &planned {
            self.add_subscription(id, *mask, token, Arc::clone(&handler))?;
        }
        Ok(planned.len())
    }

    /// Subscribes one handler to every controller-declared id of payload
    /// `T` that passes `filter`. Returns the number of subscriptions made.
    pub fn subscribe_all<T, F>(
        &mut self,
        token: RtSubscriberToken,
        filter: &RtIdFilter,
        handler: F,
    ) -> Result<usize>
    where
        T: 'static,
        F: Fn(&RtEventId, &T) + Send + Sync + 'static,
    {
        let handler: RtHandler<T> =
            Arc::new(move |id: &RtEventId, payload: &mut T| handler(id, &*payload));
        self.subscribe_all_handler(token, filter, handler)
    }

    pub fn subscribe_all_ref<T, F>(
        &mut self,
        token: RtSubscriberToken,
        filter: &RtIdFilter,
        handler: F,
    ) -> Result<usize>
    where
        T: 'static,
        F: Fn(&RtEventId, &mut T) + Send + Sync + 'static,
    {
        self.subscribe_all_handler(token, filter, Arc::new(handler))
    }

    /// Removes `token` from every controller-declared id of payload `T` that
    /// passes the filter's category and ignore list. Returns the number
    /// removed.
    pub fn unsubscribe_all<T: 'static>(
        &mut self,
        token: RtSubscriberToken,
        filter: &RtIdFilter,
    ) -> Result<usize> {
        self.ensure_unlocked("unsubscribe from all of", None)?;
        let mut count = 0;
        for id in self.declared_ids::<T>(filter) {
            if self.unsubscribe::<T>(&id, token, false)? {
                count += 1;
            }
        }
        Ok(count)
    }
}
