//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Rtx.
//! The Rtx project belongs to the Dunimd Team.

#[path = "../common/mod.rs"]
mod common;

use std::thread;

use common::{declared_image, plain_image};
use rtx::module::{
    RtConflictSource, RtModuleDescriptor, RtModuleHandle, RtModuleInspector, RtModuleRegistry,
    RtPendingSet, RtReservation,
};

fn descriptor(assembly: &str, id: &str) -> RtModuleDescriptor {
    RtModuleInspector::default()
        .inspect_image(&declared_image(assembly, id, false))
        .unwrap()
}

fn conflict_source(reservation: RtReservation) -> Option<RtConflictSource> {
    match reservation {
        RtReservation::Accepted => None,
        RtReservation::Conflict(conflict) => Some(conflict.against),
    }
}

#[test]
fn test_second_content_core_is_rejected_and_first_survives() {
    let registry = RtModuleRegistry::default();
    let a = descriptor("Content.Core.A", "Content.Core");
    let b = descriptor("Content.Core.B", "Content.Core");
    let handle = RtModuleHandle::new(0, 0, 0);

    assert!(registry.reserve_module_id(&a, RtPendingSet::StaticPending).is_accepted());
    registry.promote_pending_to_loaded("Content.Core", handle).unwrap();

    let source = conflict_source(registry.reserve_module_id(&b, RtPendingSet::StaticPending));
    assert_eq!(source, Some(RtConflictSource::StaticLoaded));

    let loaded = registry.list_loaded_modules();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].assembly_name, "Content.Core.A");
    assert_eq!(registry.handle_of("Content.Core"), Some(handle));
    assert_eq!(registry.pending_count(), 0);
}

#[test]
fn test_duplicate_detected_whichever_set_holds_the_first() {
    let first = descriptor("Content.First", "Content.Shared");
    let second = descriptor("Content.Second", "Content.Shared");

    for (into_first, into_second) in [
        (RtPendingSet::StaticPending, RtPendingSet::DynamicPending),
        (RtPendingSet::DynamicPending, RtPendingSet::StaticPending),
        (RtPendingSet::StaticPending, RtPendingSet::StaticPending),
        (RtPendingSet::DynamicPending, RtPendingSet::DynamicPending),
    ] {
        let registry = RtModuleRegistry::default();
        assert!(registry.reserve_module_id(&first, into_first).is_accepted());
        assert!(!registry.reserve_module_id(&second, into_second).is_accepted());

        registry
            .promote_pending_to_loaded("Content.Shared", RtModuleHandle::new(0, 0, 0))
            .unwrap();
        assert!(!registry.reserve_module_id(&second, into_second).is_accepted());
    }
}

#[test]
fn test_core_clash_by_id_or_assembly_is_fatal() {
    let registry = RtModuleRegistry::new(["Robust.Shared"]);

    let by_id = descriptor("Content.Sneaky", "Robust.Shared");
    match registry.reserve_module_id(&by_id, RtPendingSet::StaticPending) {
        RtReservation::Conflict(conflict) => assert!(conflict.is_fatal()),
        RtReservation::Accepted => panic!("core id accepted"),
    }

    let by_assembly = RtModuleInspector::default()
        .inspect_image(&declared_image("Robust.Shared", "Content.Renamed", false))
        .unwrap();
    let conflict = match registry.reserve_module_id(&by_assembly, RtPendingSet::DynamicPending) {
        RtReservation::Conflict(conflict) => conflict,
        RtReservation::Accepted => panic!("core assembly accepted"),
    };
    assert_eq!(conflict.name, "Robust.Shared");
    assert!(conflict.into_error().is_conflict());
}

#[test]
fn test_release_pending_frees_the_id() {
    let registry = RtModuleRegistry::default();
    let d = RtModuleInspector::default()
        .inspect_image(&plain_image("Content.Retry"))
        .unwrap();
    assert!(registry.reserve_module_id(&d, RtPendingSet::StaticPending).is_accepted());
    assert!(registry.release_pending("Content.Retry"));
    assert!(!registry.release_pending("Content.Retry"));
    assert!(registry.reserve_module_id(&d, RtPendingSet::StaticPending).is_accepted());
}

#[test]
fn test_promote_requires_pending() {
    let registry = RtModuleRegistry::default();
    let err = registry
        .promote_pending_to_loaded("Content.Ghost", RtModuleHandle::new(0, 0, 0))
        .unwrap_err();
    assert!(err.is_sequence());
}

#[test]
fn test_hot_reloadable_only_for_dynamic_reload_modules() {
    let registry = RtModuleRegistry::default();
    let dynamic = RtModuleInspector::default()
        .inspect_image(&declared_image("Content.Hot", "Content.Hot", true))
        .unwrap();
    let fixed = descriptor("Content.Cold", "Content.Cold");
    let hot_handle = RtModuleHandle::new(1, 0, 0);
    let cold_handle = RtModuleHandle::new(0, 0, 0);

    registry.reserve_module_id(&dynamic, RtPendingSet::DynamicPending);
    registry.promote_pending_to_loaded("Content.Hot", hot_handle).unwrap();
    registry.reserve_module_id(&fixed, RtPendingSet::StaticPending);
    registry.promote_pending_to_loaded("Content.Cold", cold_handle).unwrap();

    assert!(registry.is_hot_reloadable(hot_handle));
    assert!(!registry.is_hot_reloadable(cold_handle));
    assert!(!registry.is_hot_reloadable(RtModuleHandle::new(1, 9, 9)));

    let released = registry.release_dynamic_loaded();
    assert_eq!(released.len(), 1);
    assert!(!registry.contains("Content.Hot"));
    assert!(registry.contains("Content.Cold"));
    assert!(registry.knows_name("Content.Cold"));
}

#[test]
fn test_same_assembly_name_under_another_id_conflicts() {
    let registry = RtModuleRegistry::default();
    let one = descriptor("Content.Shared", "Content.One");
    let two = descriptor("Content.Shared", "Content.Two");
    assert!(registry.reserve_module_id(&one, RtPendingSet::StaticPending).is_accepted());

    let conflict = match registry.reserve_module_id(&two, RtPendingSet::DynamicPending) {
        RtReservation::Conflict(conflict) => conflict,
        RtReservation::Accepted => panic!("duplicate assembly accepted"),
    };
    assert_eq!(conflict.name, "Content.Shared");
    assert_eq!(conflict.against, RtConflictSource::StaticPending);
    assert!(!conflict.is_fatal());

    registry
        .promote_pending_to_loaded("Content.One", RtModuleHandle::new(0, 0, 0))
        .unwrap();
    assert_eq!(
        conflict_source(registry.reserve_module_id(&two, RtPendingSet::StaticPending)),
        Some(RtConflictSource::StaticLoaded)
    );
}

#[test]
fn test_concurrent_reservations_accept_exactly_one() {
    let registry = RtModuleRegistry::default();
    let contenders: Vec<RtModuleDescriptor> = (0..8)
        .map(|i| descriptor(&format!("Content.Racer{}", i), "Content.Race"))
        .collect();

    let accepted = thread::scope(|scope| {
        let workers: Vec<_> = contenders
            .iter()
            .enumerate()
            .map(|(i, d)| {
                let registry = &registry;
                let set = if i % 2 == 0 {
                    RtPendingSet::StaticPending
                } else {
                    RtPendingSet::DynamicPending
                };
                scope.spawn(move || registry.reserve_module_id(d, set).is_accepted())
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .filter(|accepted| *accepted)
            .count()
    });

    assert_eq!(accepted, 1);
    assert_eq!(registry.pending_count(), 1);
    assert!(registry.contains("Content.Race"));
}

#[test]
fn test_release_loaded_frees_id_for_a_new_module() {
    let registry = RtModuleRegistry::default();
    let first = descriptor("Content.Old", "Content.Swap");
    let second = descriptor("Content.New", "Content.Swap");
    registry.reserve_module_id(&first, RtPendingSet::DynamicPending);
    registry
        .promote_pending_to_loaded("Content.Swap", RtModuleHandle::new(1, 0, 0))
        .unwrap();

    assert!(!registry.reserve_module_id(&second, RtPendingSet::DynamicPending).is_accepted());
    let released = registry.release_loaded("Content.Swap").unwrap();
    assert_eq!(released.assembly_name, "Content.Old");
    assert!(registry.reserve_module_id(&second, RtPendingSet::DynamicPending).is_accepted());
}
