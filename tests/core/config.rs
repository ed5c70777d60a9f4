//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Rtx.
//! The Rtx project belongs to the Dunimd Team.

//! Configuration loading tests: JSON and YAML files, builder values and the
//! logger configuration nested under `log`.

use std::fs;

use log::{Level, LevelFilter, Log, Record};
use rtx::events::RtEventBus;
use rtx::logger::RtLogger;
use rtx::{RtConfig, RtConfigBuilder, RtError, RtLogConfig, RtMemoryHandler};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_load_yaml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("runtime.yaml");
    fs::write(
        &path,
        r#"
content_prefix: "Game."
live_reload_enabled: true
is_server: true
core_modules: ["Robust.Shared", "Robust.Server"]
sandbox:
  allowed_references: ["System."]
log:
  default_level: WARN
  target_levels:
    rtx.mod.loader: DEBUG
"#,
    )
    .unwrap();

    let config = RtConfig::from_path(&path).unwrap();
    assert_eq!(config.content_prefix, "Game.");
    assert!(config.live_reload_enabled);
    assert!(config.is_server);
    assert!(config.sandboxing_enabled);
    assert!(config.is_core_module("Robust.Server"));
    assert!(config.sandbox.allows("System.Collections"));
    assert!(!config.sandbox.allows("Microsoft.Win32"));

    assert_eq!(config.log.threshold_for("rtx.mod"), LevelFilter::Warn);
    assert_eq!(config.log.threshold_for("rtx.mod.loader"), LevelFilter::Debug);
    assert_eq!(config.log.max_level(), LevelFilter::Debug);
    assert!(config.log.console_enabled);
}

#[test]
fn test_load_json_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("runtime.json");
    fs::write(
        &path,
        r#"{"sandboxing_enabled": false, "core_modules": ["Robust.Client"]}"#,
    )
    .unwrap();

    let config = RtConfig::from_path(&path).unwrap();
    assert!(!config.sandboxing_enabled);
    assert!(!config.live_reload_enabled);
    assert_eq!(config.content_prefix, "Content.");
    assert_eq!(config.core_modules, vec!["Robust.Client".to_string()]);
    assert_eq!(config.log, RtLogConfig::default());
}

#[test]
fn test_yml_extension_and_case() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("runtime.YML");
    fs::write(&path, "is_server: true\n").unwrap();

    assert!(RtConfig::from_path(&path).unwrap().is_server);
}

#[test]
fn test_unsupported_extension_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("runtime.toml");
    fs::write(&path, "is_server = true\n").unwrap();

    let err = RtConfig::from_path(&path).unwrap_err();
    assert!(matches!(err, RtError::Validation { ref message } if message.contains("toml")));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = RtConfig::from_path(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, RtError::Io(_)));
}

#[test]
fn test_malformed_yaml_is_serde_error() {
    let err = RtConfig::from_yaml_str("core_modules: {not: [a list").unwrap_err();
    assert!(matches!(err, RtError::Serde(_)));
}

#[test]
fn test_builder_from_json_value() {
    let value = json!({
        "content_prefix": "Content.",
        "core_modules": ["Robust.Shared"],
        "log": { "console_enabled": false, "json_format_console": true }
    });
    let config = RtConfigBuilder::from_json(&value).unwrap();
    assert!(config.is_core_module("Robust.Shared"));
    assert!(!config.log.console_enabled);
    assert!(config.log.json_format_console);
    assert_eq!(config.log.default_level, "INFO");
}

#[test]
fn test_empty_core_module_rejected() {
    let value = json!({ "core_modules": ["Robust.Shared", ""] });
    let err = RtConfigBuilder::from_json(&value).unwrap_err();
    assert!(matches!(err, RtError::Validation { ref message } if message.contains("core_modules[1]")));
}

#[test]
fn test_bus_follows_server_flag() {
    let config = RtConfig::from_json_str(r#"{"is_server": true}"#).unwrap();
    let bus = RtEventBus::from_config(&config, "sensors");
    assert!(bus.is_server());
    assert_eq!(bus.channel(), "sensors");
}

#[test]
fn test_logger_filters_and_parses_records() {
    let config = RtConfig::from_yaml_str(
        r#"
log:
  default_level: WARN
  console_enabled: false
  target_levels:
    rtx.mod: DEBUG
"#,
    )
    .unwrap();
    let memory = RtMemoryHandler::new();
    let logger = RtLogger::new(config.log.clone()).with_handler(memory.clone());

    logger.log(
        &Record::builder()
            .level(Level::Debug)
            .target("rtx.mod.loader")
            .args(format_args!(
                "mod.loader.linked: module linked - module=Content.Client, entries=2"
            ))
            .build(),
    );
    logger.log(
        &Record::builder()
            .level(Level::Info)
            .target("rtgt.sensors")
            .args(format_args!("events.lock: table locked - locked=true"))
            .build(),
    );

    let records = memory.records();
    assert_eq!(records.len(), 1);
    let linked = &memory.events("mod.loader.linked")[0];
    assert_eq!(linked.message, "module linked");
    assert_eq!(linked.fields["module"], json!("Content.Client"));
    assert_eq!(linked.fields["entries"], json!("2"));

    memory.clear();
    assert!(memory.records().is_empty());
}
