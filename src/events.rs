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

//! # Rtx Events
//!
//! Typed event dispatch between independently built modules.
//!
//! ## Core Concepts
//!
//! - **RtEventId**: `(name, category)` identifier, rendered `category:name`
//! - **RtOrigin**: local and networked flags for registrations, masks and targets
//! - **RtEventBus**: registration-locked table of typed subscribers
//! - **RtEventController**: declares ids during setup through an `RtIdRegistrar`
//! - **RtEventTransport**: receives the networked half of a raise

pub mod bus;
pub mod controller;
pub mod id;
pub mod origin;
pub mod table;
pub mod transport;

pub use bus::{RtEventBus, RtIdFilter, NAMED_EVENTS_CHANNEL, SENSORS_CHANNEL, TELEMETRY_CHANNEL};
pub use controller::{RtEventController, RtIdRegistrar};
pub use id::{RtEventId, DEFAULT_CATEGORY};
pub use origin::RtOrigin;
pub use table::{RtHandler, RtSubscriberToken, RtTableState};
pub use transport::{RtEventTransport, RtNullTransport, RtOutboundEvent};
