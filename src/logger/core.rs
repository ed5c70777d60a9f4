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

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{Level, Log, Metadata, Record};
use serde_json::{json, Map, Value};

use super::config::RtLogConfig;
use crate::errors::{Result, RtError};

/// One emitted log line, split into its event name, message and fields.
///
/// Rtx messages follow `event.name: human message - key=value, key=value`.
/// Lines that do not follow the shape keep the whole text as the message and
/// use the target as the event.
#[derive(Clone, Debug)]
pub struct RtLogRecord {
    pub level: Level,
    pub target: String,
    pub event: String,
    pub message: String,
    pub fields: Map<String, Value>,
    pub timestamp: SystemTime,
}

impl RtLogRecord {
    pub fn parse(level: Level, target: &str, text: &str) -> Self {
        let (event, rest) = match text.split_once(": ") {
            Some((event, rest)) if !event.is_empty() && !event.contains(' ') => {
                (event.to_string(), rest)
            }
            _ => (target.to_string(), text),
        };

        let mut fields = Map::new();
        let message = match rest.rsplit_once(" - ") {
            Some((message, tail)) if tail.contains('=') => {
                for pair in tail.split(", ") {
                    if let Some((k, v)) = pair.split_once('=') {
                        fields.insert(k.trim().to_string(), json!(v.trim()));
                    }
                }
                message.to_string()
            }
            _ => rest.to_string(),
        };

        RtLogRecord {
            level,
            target: target.to_string(),
            event,
            message,
            fields,
            timestamp: SystemTime::now(),
        }
    }

    pub fn to_json(&self) -> Value {
        let ts = self
            .timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();

        let mut data = Map::new();
        data.insert("level".into(), json!(self.level.as_str()));
        data.insert("target".into(), json!(self.target));
        data.insert("event".into(), json!(self.event));
        data.insert("message".into(), json!(self.message));
        data.insert("timestamp_ms".into(), json!(ts));
        data.insert("fields".into(), Value::Object(self.fields.clone()));
        Value::Object(data)
    }

    pub fn to_text(&self) -> String {
        let mut line = format!(
            "[{:<5}] [{}] {}: {}",
            self.level.as_str(),
            self.target,
            self.event,
            self.message
        );
        if !self.fields.is_empty() {
            let rendered: Vec<String> = self
                .fields
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{}={}", k, s),
                    other => format!("{}={}", k, other),
                })
                .collect();
            line.push_str(" - ");
            line.push_str(&rendered.join(", "));
        }
        line
    }
}

pub trait RtLogHandler: Send + Sync {
    fn handle(&self, record: &RtLogRecord);
}

pub struct RtStderrHandler {
    json: bool,
}

impl RtStderrHandler {
    pub fn new(json: bool) -> Self {
        RtStderrHandler { json }
    }
}

impl RtLogHandler for RtStderrHandler {
    fn handle(&self, record: &RtLogRecord) {
        let line = if self.json {
            record.to_json().to_string()
        } else {
            record.to_text()
        };
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }
}

/// Keeps records in memory. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct RtMemoryHandler {
    records: Arc<Mutex<Vec<RtLogRecord>>>,
}

impl RtMemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RtLogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records whose event name equals `event`.
    pub fn events(&self, event: &str) -> Vec<RtLogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.event == event)
            .collect()
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl RtLogHandler for RtMemoryHandler {
    fn handle(&self, record: &RtLogRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
    }
}

/// `log::Log` implementation that filters by [`RtLogConfig`] and fans records
/// out to its handlers.
pub struct RtLogger {
    config: RtLogConfig,
    handlers: Vec<Box<dyn RtLogHandler>>,
}

impl RtLogger {
    pub fn new(config: RtLogConfig) -> Self {
        let mut handlers: Vec<Box<dyn RtLogHandler>> = Vec::new();
        if config.console_enabled {
            handlers.push(Box::new(RtStderrHandler::new(config.json_format_console)));
        }
        RtLogger { config, handlers }
    }

    pub fn with_handler(mut self, handler: impl RtLogHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn config(&self) -> &RtLogConfig {
        &self.config
    }

    /// Install as the process-wide logger. Only the first install succeeds.
    pub fn install(self) -> Result<()> {
        let max = self.config.max_level();
        log::set_boxed_logger(Box::new(self))
            .map_err(|e| RtError::internal(format!("logger already installed: {}", e)))?;
        log::set_max_level(max);
        Ok(())
    }
}

impl Log for RtLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.config.should_log(metadata.target(), metadata.level())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let parsed = RtLogRecord::parse(
            record.level(),
            record.target(),
            &record.args().to_string(),
        );
        for h in &self.handlers {
            h.handle(&parsed);
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
