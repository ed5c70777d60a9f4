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

//! # Event Origins
//!
//! Where an event may come from, and where a raise sends it.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Local and networked delivery flags.
    ///
    /// Registrations store the allowed origins, subscriptions a mask and
    /// raises a target. `NETWORKED` keeps bit 2 so masks stay compatible with
    /// peers that reserve bit 1.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RtOrigin: u8 {
        const LOCAL = 1 << 0;
        const NETWORKED = 1 << 2;
        const BOTH = Self::LOCAL.bits() | Self::NETWORKED.bits();
    }
}

impl RtOrigin {
    pub fn has_local(self) -> bool {
        self.contains(RtOrigin::LOCAL)
    }

    pub fn has_networked(self) -> bool {
        self.contains(RtOrigin::NETWORKED)
    }
}

impl fmt::Display for RtOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (self.has_local(), self.has_networked()) {
            (true, true) => "Both",
            (true, false) => "Local",
            (false, true) => "Networked",
            (false, false) => "None",
        };
        f.write_str(name)
    }
}
