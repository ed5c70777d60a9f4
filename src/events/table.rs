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

//! # Event Table
//!
//! Registration slots keyed by payload type and event id. Each payload type
//! gets one typed map behind a type-erased box; lookups downcast once per
//! type and then work on concrete `RtSlot<T>` values.
//!
//! While unlocked the table mutates its builder map in place. Locking
//! copies the builder into an immutable `Arc` snapshot that every lookup
//! reads until the table is unlocked again. One-shot latches are shared
//! between a slot and its snapshot copy.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::events::id::RtEventId;
use crate::events::origin::RtOrigin;

/// Handler signature every subscription is stored as.
pub type RtHandler<T> = Arc<dyn Fn(&RtEventId, &mut T) + Send + Sync>;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identity of a subscriber, used to detect duplicates and to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RtSubscriberToken(u64);

impl RtSubscriberToken {
    /// A token no other call to `next` returns.
    pub fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RtSubscriberToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of the table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RtTableState {
    Unlocked,
    Locked,
    /// Terminated; everything was dropped and registration stays closed
    /// until the table is unlocked again.
    Cleared,
}

pub(crate) struct RtSubscription<T> {
    pub(crate) mask: RtOrigin,
    pub(crate) token: RtSubscriberToken,
    pub(crate) handler: RtHandler<T>,
}

impl<T> Clone for RtSubscription<T> {
    fn clone(&self) -> Self {
        Self {
            mask: self.mask,
            token: self.token,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Subscribers of one `(type, id)` registration.
pub(crate) struct RtSlot<T> {
    allowed: RtOrigin,
    enabled: Vec<RtSubscription<T>>,
    disabled: Vec<RtSubscription<T>>,
    triggered: Arc<AtomicBool>,
}

impl<T> Clone for RtSlot<T> {
    fn clone(&self) -> Self {
        Self {
            allowed: self.allowed,
            enabled: self.enabled.clone(),
            disabled: self.disabled.clone(),
            triggered: Arc::clone(&self.triggered),
        }
    }
}

impl<T> RtSlot<T> {
    pub(crate) fn new(allowed: RtOrigin) -> Self {
        Self {
            allowed,
            enabled: Vec::new(),
            disabled: Vec::new(),
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn allowed(&self) -> RtOrigin {
        self.allowed
    }

    pub(crate) fn contains(&self, token: RtSubscriberToken) -> bool {
        self.enabled.iter().chain(self.disabled.iter()).any(|s| s.token == token)
    }

    /// Appends the subscription. Returns false if its token is already here.
    pub(crate) fn add(&mut self, subscription: RtSubscription<T>) -> bool {
        if self.contains(subscription.token) {
            return false;
        }
        self.enabled.push(subscription);
        true
    }

    pub(crate) fn remove(&mut self, token: RtSubscriberToken) -> bool {
        if let Some(pos) = self.enabled.iter().position(|s| s.token == token) {
            self.enabled.remove(pos);
            return true;
        }
        if let Some(pos) = self.disabled.iter().position(|s| s.token == token) {
            self.disabled.remove(pos);
            return true;
        }
        false
    }

    /// Moves a subscription between the enabled and disabled lists.
    ///
    /// A re-enabled subscription goes to the back of the enabled list.
    pub(crate) fn set_enabled(&mut self, token: RtSubscriberToken, enabled: bool) -> bool {
        let (from, to) = if enabled {
            (&mut self.disabled, &mut self.enabled)
        } else {
            (&mut self.enabled, &mut self.disabled)
        };
        if let Some(pos) = from.iter().position(|s| s.token == token) {
            let subscription = from.remove(pos);
            to.push(subscription);
            return true;
        }
        to.iter().any(|s| s.token == token)
    }

    pub(crate) fn enabled_count(&self) -> usize {
        self.enabled.len()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.enabled.len() + self.disabled.len()
    }

    /// Sets the one-shot latch. Returns false if it was already set.
    pub(crate) fn latch(&self) -> bool {
        !self.triggered.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn reset_latch(&self) {
        self.triggered.store(false, Ordering::Release);
    }

    pub(crate) fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Invokes enabled subscribers whose mask intersects `filter`, in
    /// subscription order.
    pub(crate) fn dispatch(&self, id: &RtEventId, payload: &mut T, filter: RtOrigin) -> usize {
        let mut invoked = 0;
        for subscription in &self.enabled {
            if subscription.mask.intersects(filter) {
                (subscription.handler)(id, payload);
                invoked += 1;
            }
        }
        invoked
    }
}

/// All slots for one payload type.
pub(crate) struct RtTypedSlots<T> {
    slots: HashMap<RtEventId, RtSlot<T>>,
}

impl<T> Default for RtTypedSlots<T> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<T> RtTypedSlots<T> {
    pub(crate) fn get(&self, id: &RtEventId) -> Option<&RtSlot<T>> {
        self.slots.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &RtEventId) -> Option<&mut RtSlot<T>> {
        self.slots.get_mut(id)
    }
}

pub(crate) trait RtErasedSlots: Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn clone_box(&self) -> Box<dyn RtErasedSlots>;
    fn len(&self) -> usize;
}

impl<T: 'static> RtErasedSlots for RtTypedSlots<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn clone_box(&self) -> Box<dyn RtErasedSlots> {
        Box::new(RtTypedSlots {
            slots: self.slots.clone(),
        })
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

type SlotMap = HashMap<TypeId, Box<dyn RtErasedSlots>>;

fn typed<T: 'static>(map: &SlotMap) -> Option<&RtTypedSlots<T>> {
    map.get(&TypeId::of::<T>())
        .and_then(|slots| slots.as_any().downcast_ref::<RtTypedSlots<T>>())
}

pub(crate) struct RtEventTable {
    builder: SlotMap,
    snapshot: Option<Arc<SlotMap>>,
    state: RtTableState,
}

impl Default for RtEventTable {
    fn default() -> Self {
        Self {
            builder: HashMap::new(),
            snapshot: None,
            state: RtTableState::Unlocked,
        }
    }
}

impl RtEventTable {
    pub(crate) fn state(&self) -> RtTableState {
        self.state
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.state != RtTableState::Unlocked
    }

    /// Slot as seen by dispatch: the snapshot when locked, else the builder.
    pub(crate) fn slot<T: 'static>(&self, id: &RtEventId) -> Option<&RtSlot<T>> {
        let map = match &self.snapshot {
            Some(snapshot) => snapshot.as_ref(),
            None => &self.builder,
        };
        typed::<T>(map).and_then(|slots| slots.get(id))
    }

    /// Mutable builder slot. Callers check the lock first.
    pub(crate) fn slot_mut<T: 'static>(&mut self, id: &RtEventId) -> Option<&mut RtSlot<T>> {
        self.builder
            .get_mut(&TypeId::of::<T>())
            .and_then(|slots| slots.as_any_mut().downcast_mut::<RtTypedSlots<T>>())
            .and_then(|slots| slots.get_mut(id))
    }

    /// Inserts a slot unless one exists. Returns false for an existing one.
    pub(crate) fn insert<T: 'static>(&mut self, id: RtEventId, allowed: RtOrigin) -> bool {
        let entry = self
            .builder
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(RtTypedSlots::<T>::default()));
        match entry.as_any_mut().downcast_mut::<RtTypedSlots<T>>() {
            Some(slots) => {
                if slots.slots.contains_key(&id) {
                    false
                } else {
                    slots.slots.insert(id, RtSlot::new(allowed));
                    true
                }
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.builder.values().map(|slots| slots.len()).sum()
    }

    pub(crate) fn lock(&mut self) {
        let copy: SlotMap = self
            .builder
            .iter()
            .map(|(type_id, slots)| (*type_id, slots.clone_box()))
            .collect();
        self.snapshot = Some(Arc::new(copy));
        self.state = RtTableState::Locked;
    }

    pub(crate) fn unlock(&mut self) {
        self.snapshot = None;
        self.state = RtTableState::Unlocked;
    }

    pub(crate) fn clear(&mut self) {
        self.builder.clear();
        self.snapshot = None;
        self.state = RtTableState::Cleared;
    }
}
