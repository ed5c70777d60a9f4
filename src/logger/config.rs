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

use std::collections::HashMap;

use log::{Level, LevelFilter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Configuration for [`RtLogger`](super::RtLogger).
///
/// `target_levels` overrides `default_level` for a target prefix; the longest
/// matching prefix wins, so `rtx.mod.loader` can be quieter than `rtx.mod`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RtLogConfig {
    pub default_level: String,
    pub target_levels: HashMap<String, String>,
    pub console_enabled: bool,
    pub json_format_console: bool,
}

impl Default for RtLogConfig {
    fn default() -> Self {
        RtLogConfig {
            default_level: "INFO".to_string(),
            target_levels: HashMap::new(),
            console_enabled: true,
            json_format_console: false,
        }
    }
}

impl RtLogConfig {
    pub fn should_log(&self, target: &str, level: Level) -> bool {
        level <= self.threshold_for(target)
    }

    /// Effective threshold for a target.
    pub fn threshold_for(&self, target: &str) -> LevelFilter {
        let mut best: Option<(&str, &str)> = None;
        for (prefix, level) in &self.target_levels {
            let matches = target == prefix
                || (target.starts_with(prefix.as_str())
                    && target[prefix.len()..].starts_with('.'));
            if matches && best.map_or(true, |(p, _)| prefix.len() > p.len()) {
                best = Some((prefix.as_str(), level.as_str()));
            }
        }
        match best {
            Some((_, level)) => parse_level(level),
            None => parse_level(&self.default_level),
        }
    }

    /// The most verbose level any target may log at, for `log::set_max_level`.
    pub fn max_level(&self) -> LevelFilter {
        self.target_levels
            .values()
            .map(|l| parse_level(l))
            .fold(parse_level(&self.default_level), |a, b| a.max(b))
    }
}

fn parse_level(s: &str) -> LevelFilter {
    match s.to_ascii_uppercase().as_str() {
        "OFF" => LevelFilter::Off,
        "ERROR" => LevelFilter::Error,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" | "VERBOSE" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RtLogConfigBuilder {
    pub default_level: Option<String>,
    pub target_levels: Option<HashMap<String, String>>,
    pub console_enabled: Option<bool>,
    pub json_format_console: Option<bool>,
}

impl RtLogConfigBuilder {
    pub fn build(self) -> RtLogConfig {
        let base = RtLogConfig::default();
        RtLogConfig {
            default_level: self.default_level.unwrap_or(base.default_level),
            target_levels: self.target_levels.unwrap_or(base.target_levels),
            console_enabled: self.console_enabled.unwrap_or(base.console_enabled),
            json_format_console: self
                .json_format_console
                .unwrap_or(base.json_format_console),
        }
    }

    /// Lenient JSON load: unknown or malformed input falls back to defaults.
    pub fn from_json(value: &Value) -> RtLogConfig {
        let builder: RtLogConfigBuilder = serde_json::from_value(value.clone())
            .unwrap_or_else(|_| RtLogConfigBuilder::default());
        builder.build()
    }
}
