//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Rtx.
//! The Rtx project belongs to the Dunimd Team.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{callbacks, entries, hooks, journal, linker, plain_image, Journal};
use rtx::module::{
    RtEntryState, RtFrameArgs, RtLoadContext, RtModuleHandle, RtModuleInspector, RtRunLevel,
    RtUpdateLevel,
};

fn context(supports_reload: bool, journal: &Journal) -> RtLoadContext {
    let mut ctx = RtLoadContext::new(7, "test", supports_reload, Arc::new(linker(&["Empty"])));
    ctx.set_testing_callbacks(callbacks(journal));
    ctx
}

fn load(ctx: &mut RtLoadContext, name: &str) -> RtModuleHandle {
    let image = plain_image(name);
    let descriptor = RtModuleInspector::default().inspect_image(&image).unwrap();
    ctx.load(descriptor, image).unwrap()
}

#[test]
fn test_init_broadcast_follows_load_then_manifest_order() {
    let j = journal();
    let mut ctx = context(false, &j);
    load(&mut ctx, "X");
    load(&mut ctx, "Y");
    assert_eq!(ctx.entry_point_count(), 3);

    ctx.broadcast_run_level(RtRunLevel::PreInit);
    ctx.broadcast_run_level(RtRunLevel::Init);
    assert_eq!(hooks(&j, "Init"), vec!["X1.Init", "X2.Init", "Y1.Init"]);
}

#[test]
fn test_unload_shuts_everything_down_before_disposing() {
    let j = journal();
    let mut ctx = context(true, &j);
    let handle = load(&mut ctx, "X");
    for level in [RtRunLevel::PreInit, RtRunLevel::Init, RtRunLevel::PostInit] {
        ctx.broadcast_run_level(level);
    }
    j.lock().unwrap().clear();

    let unloaded = ctx.unload().unwrap();
    assert_eq!(unloaded.len(), 1);
    assert_eq!(unloaded[0].descriptor.module_id, "X");
    assert_eq!(
        entries(&j),
        vec!["X1.Shutdown", "X2.Shutdown", "X1.Dispose", "X2.Dispose"]
    );
    assert_eq!(ctx.module_count(), 0);
    assert_eq!(ctx.generation(), 1);
    assert!(!ctx.is_live(handle));
    assert!(ctx.descriptor(handle).is_none());
}

#[test]
fn test_static_context_refuses_unload() {
    let j = journal();
    let mut ctx = context(false, &j);
    load(&mut ctx, "X");
    let err = ctx.unload().unwrap_err();
    assert!(err.is_sequence());
    assert_eq!(ctx.module_count(), 1);
    assert!(entries(&j).is_empty());
    assert!(ctx.broadcast_reload_start().unwrap_err().is_sequence());
}

#[test]
fn test_updates_reach_running_entries_only() {
    let j = journal();
    let mut ctx = context(false, &j);
    let handle = load(&mut ctx, "Y");
    let args = RtFrameArgs::new(0.016, 1);

    ctx.broadcast_update(RtUpdateLevel::FramePreEngine, &args);
    assert!(hooks(&j, "Update").is_empty());

    for level in [RtRunLevel::PreInit, RtRunLevel::Init, RtRunLevel::PostInit] {
        ctx.broadcast_run_level(level);
    }
    ctx.broadcast_update(RtUpdateLevel::FramePreEngine, &args);
    assert_eq!(hooks(&j, "Update"), vec!["Y1.Update"]);
    assert_eq!(ctx.entry_states(handle), Some(vec![RtEntryState::Running]));
}

#[test]
fn test_error_run_level_is_ignored() {
    let j = journal();
    let mut ctx = context(false, &j);
    let handle = load(&mut ctx, "X");
    ctx.broadcast_run_level(RtRunLevel::Error);
    assert!(entries(&j).is_empty());
    assert_eq!(
        ctx.entry_states(handle),
        Some(vec![RtEntryState::Uninitialized, RtEntryState::Uninitialized])
    );
}

#[test]
fn test_duplicate_and_unlinkable_modules_fail() {
    let j = journal();
    let mut ctx = context(false, &j);
    load(&mut ctx, "Empty");

    let image = plain_image("Empty");
    let descriptor = RtModuleInspector::default().inspect_image(&image).unwrap();
    assert!(ctx.load(descriptor, image).unwrap_err().is_conflict());

    let unknown = plain_image("Unknown");
    let descriptor = RtModuleInspector::default().inspect_image(&unknown).unwrap();
    let err = ctx.load(descriptor, unknown).unwrap_err();
    assert!(matches!(err, rtx::RtError::Link { .. }));
    assert!(ctx.pending_modules().is_empty());
    assert!(!ctx.contains("Unknown"));
}

#[test]
fn test_shutdown_without_init_still_disposes() {
    let j = journal();
    let mut ctx = context(false, &j);
    let handle = load(&mut ctx, "Y");
    ctx.shutdown();
    assert_eq!(entries(&j), vec!["Y1.Shutdown", "Y1.Dispose"]);
    assert_eq!(ctx.entry_states(handle), Some(vec![RtEntryState::Disposed]));
}
