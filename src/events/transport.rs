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

//! # Event Transport
//!
//! The networked half of a raise. The bus hands the payload to a transport
//! after local subscribers have run; serialization and delivery belong to
//! the host. The receiving side feeds inbound events back through
//! `RtEventBus::receive_networked`.

use std::any::{Any, TypeId};

use crate::events::id::RtEventId;

/// One networked raise, borrowed for the duration of `send`.
pub struct RtOutboundEvent<'a> {
    pub id: &'a RtEventId,
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub payload: &'a dyn Any,
    pub one_shot: bool,
    /// Whether the raising process is the authority.
    pub is_server: bool,
}

impl RtOutboundEvent<'_> {
    pub fn downcast<T: 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

pub trait RtEventTransport: Send + Sync {
    fn send(&self, event: RtOutboundEvent<'_>);
}

/// Drops every outbound event. Used when the host has no network layer.
#[derive(Clone, Copy, Debug, Default)]
pub struct RtNullTransport;

impl RtEventTransport for RtNullTransport {
    fn send(&self, _event: RtOutboundEvent<'_>) {}
}
