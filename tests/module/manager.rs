//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Rtx.
//! The Rtx project belongs to the Dunimd Team.

#[path = "../common/mod.rs"]
mod common;

use std::io::Cursor;
use std::sync::Arc;

use common::{callbacks, declared_image, hooks, image, journal, linker, plain_image, Journal};
use rtx::module::{
    RtModuleImage, RtModuleKind, RtModuleManager, RtModuleMetadata, RtRunLevel,
    DYNAMIC_CONTEXT_ID, STATIC_CONTEXT_ID,
};
use rtx::{RtConfig, RtError};

fn manager(config: RtConfig, j: &Journal) -> RtModuleManager {
    let mut manager = RtModuleManager::new(
        config,
        Arc::new(linker(&["A", "B", "C", "D", "Dep", "Content.Evil"])),
    );
    manager.set_testing_callbacks(callbacks(j));
    manager
}

fn referencing(name: &str, references: &[&str]) -> RtModuleImage {
    let metadata = references
        .iter()
        .fold(RtModuleMetadata::new(name), |m, r| m.reference(*r));
    image(metadata)
}

#[test]
fn test_second_module_with_same_id_leaves_first_loaded() {
    let j = journal();
    let mut m = manager(RtConfig::default(), &j);
    let first = m.load_image(declared_image("A", "Content.Core", false)).unwrap();

    let err = m.load_image(declared_image("B", "Content.Core", false)).unwrap_err();
    assert!(err.is_conflict());

    let loaded = m.list_loaded_modules();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].assembly_name, "A");
    assert_eq!(m.registry().handle_of("Content.Core"), Some(first));
    assert_eq!(m.static_context().module_count(), 1);
    assert_eq!(m.registry().pending_count(), 0);
}

#[test]
fn test_rejected_duplicate_does_not_fail_dependents_of_the_winner() {
    let j = journal();
    let mut m = manager(RtConfig::default(), &j);
    let report = m
        .load_batch(vec![
            declared_image("A", "Content.Core", false),
            declared_image("B", "Content.Core", false),
            referencing("C", &["Content.Core"]),
        ])
        .unwrap();

    assert_eq!(report.loaded_ids(), vec!["Content.Core", "C"]);
    assert_eq!(report.skipped_names(), vec!["Content.Core"]);
    assert!(report.skipped[0].error.is_conflict());
    assert_eq!(m.list_loaded_modules()[0].assembly_name, "A");
}

#[test]
fn test_same_assembly_under_a_second_id_is_rejected() {
    let j = journal();
    let mut m = manager(RtConfig::default(), &j);
    m.load_image(declared_image("A", "Content.One", false)).unwrap();

    let err = m.load_image(declared_image("A", "Content.Two", false)).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(m.list_loaded_modules().len(), 1);
    assert_eq!(m.static_context().module_count(), 1);
    assert!(!m.registry().contains("Content.Two"));
}

#[test]
fn test_batch_orders_dependencies_first() {
    let j = journal();
    let mut m = manager(RtConfig::default(), &j);
    let report = m
        .load_batch(vec![referencing("Y", &["X"]), plain_image("X")])
        .unwrap();
    assert_eq!(report.loaded_ids(), vec!["X", "Y"]);
    assert!(report.skipped.is_empty());

    m.broadcast_run_level(RtRunLevel::PreInit);
    m.broadcast_run_level(RtRunLevel::Init);
    assert_eq!(hooks(&j, "Init"), vec!["X1.Init", "X2.Init", "Y1.Init"]);
}

#[test]
fn test_core_clash_aborts_batch_keeping_earlier_loads() {
    let j = journal();
    let config = RtConfig::builder().core_module("Robust.Shared").build();
    let mut m = manager(config, &j);
    let err = m
        .load_batch(vec![
            plain_image("X"),
            declared_image("Content.Evil", "Robust.Shared", false),
            plain_image("Y"),
        ])
        .unwrap_err();
    assert!(err.is_conflict());
    assert!(m.registry().contains("X"));
    assert!(!m.registry().contains("Y"));
    assert_eq!(m.registry().pending_count(), 0);
}

#[test]
fn test_cycles_and_their_dependents_are_skipped() {
    let j = journal();
    let mut m = manager(RtConfig::default(), &j);
    let report = m
        .load_batch(vec![
            referencing("A", &["B"]),
            referencing("B", &["A"]),
            referencing("C", &["A"]),
            plain_image("D"),
        ])
        .unwrap();
    assert_eq!(report.loaded_ids(), vec!["D"]);
    let mut skipped = report.skipped_names();
    skipped.sort();
    assert_eq!(skipped, vec!["A", "B", "C"]);
    assert!(report
        .skipped
        .iter()
        .all(|s| matches!(s.error, RtError::Validation { .. })));
}

#[test]
fn test_failed_dependency_skips_dependents() {
    let j = journal();
    let mut m = manager(RtConfig::default(), &j);
    let report = m
        .load_batch(vec![plain_image("Unknown"), referencing("Dep", &["Unknown"]), plain_image("X")])
        .unwrap();
    assert_eq!(report.loaded_ids(), vec!["X"]);
    assert_eq!(report.skipped_names(), vec!["Unknown", "Dep"]);
    assert!(report.skipped.iter().all(|s| matches!(s.error, RtError::Link { .. })));
}

#[test]
fn test_unreadable_image_is_reported_by_path() {
    let j = journal();
    let mut m = manager(RtConfig::default(), &j);
    let garbage = RtModuleImage::from_bytes(b"garbage".to_vec(), Some("mods/broken.rtm".into()));
    let report = m.load_batch(vec![garbage, plain_image("Y")]).unwrap();
    assert_eq!(report.loaded_ids(), vec!["Y"]);
    assert_eq!(report.skipped_names(), vec!["mods/broken.rtm"]);
    assert!(matches!(report.skipped[0].error, RtError::BadImage { .. }));
}

#[test]
fn test_sandbox_reference_policy() {
    let j = journal();
    let mut strict = manager(RtConfig::default(), &j);
    let err = strict.load_image(referencing("A", &["System.IO"])).unwrap_err();
    assert!(matches!(err, RtError::Sandbox { .. }));
    assert!(!strict.registry().contains("A"));

    let allowed = RtConfig::builder().allow_reference("System.").build();
    let mut relaxed = manager(allowed, &j);
    relaxed.load_image(referencing("A", &["System.IO"])).unwrap();

    let off = RtConfig::builder().sandboxing_enabled(false).build();
    let mut open = manager(off, &j);
    open.load_image(referencing("A", &["Anything"])).unwrap();
}

#[test]
fn test_sandboxed_module_may_reference_loaded_and_core_modules() {
    let j = journal();
    let config = RtConfig::builder().core_module("Robust.Shared").build();
    let mut m = manager(config, &j);
    m.load_image(plain_image("X")).unwrap();
    m.load_image(referencing("A", &["X", "Robust.Shared"])).unwrap();
    assert!(m.registry().contains("A"));
}

#[test]
fn test_reload_capable_modules_go_dynamic_when_enabled() {
    let j = journal();
    let config = RtConfig::builder().live_reload_enabled(true).build();
    let mut m = manager(config, &j);
    let hot = m.load_image(declared_image("R", "Content.Hot", true)).unwrap();
    let cold = m.load_image(plain_image("X")).unwrap();

    assert_eq!(hot.context(), DYNAMIC_CONTEXT_ID);
    assert_eq!(cold.context(), STATIC_CONTEXT_ID);
    assert!(m.is_hot_reloadable(hot));
    assert!(!m.is_hot_reloadable(cold));
    assert_eq!(m.module_kind(hot), Some(RtModuleKind::Content));
    assert_eq!(m.module_kind(cold), Some(RtModuleKind::Engine));
    assert_eq!(m.context_of(hot).map(|c| c.name()), Some("dynamic"));

    m.broadcast_run_level(RtRunLevel::PreInit);
    m.broadcast_run_level(RtRunLevel::Init);
    assert_eq!(hooks(&j, "Init"), vec!["X1.Init", "X2.Init", "R1.Init"]);
}

#[test]
fn test_reload_flag_ignored_when_live_reload_disabled() {
    let j = journal();
    let mut m = manager(RtConfig::default(), &j);
    let handle = m.load_image(declared_image("R", "Content.Hot", true)).unwrap();
    assert_eq!(handle.context(), STATIC_CONTEXT_ID);
    assert!(!m.is_hot_reloadable(handle));
}

#[test]
fn test_load_module_from_stream() {
    let j = journal();
    let mut m = manager(RtConfig::default(), &j);
    let mut stream = Cursor::new(plain_image("Y").bytes().to_vec());
    let handle = m.load_module(&mut stream, None).unwrap();
    assert_eq!(m.static_context().descriptor(handle).unwrap().module_id, "Y");
}

#[test]
fn test_shutdown_reaches_every_context() {
    let j = journal();
    let config = RtConfig::builder().live_reload_enabled(true).build();
    let mut m = manager(config, &j);
    m.load_image(plain_image("Y")).unwrap();
    m.load_image(declared_image("R", "Content.Hot", true)).unwrap();
    m.shutdown();
    assert_eq!(hooks(&j, "Dispose"), vec!["Y1.Dispose", "R1.Dispose"]);
}
