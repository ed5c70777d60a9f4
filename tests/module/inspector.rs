//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Rtx.
//! The Rtx project belongs to the Dunimd Team.

#[path = "../common/mod.rs"]
mod common;

use std::io::{Cursor, Seek, SeekFrom};

use common::{declared_image, image, plain_image};
use rtx::module::{
    RtAttributeRecord, RtAttributeValue, RtModuleAttribute, RtModuleImage, RtModuleInspector,
    RtModuleKind, RtModuleMetadata, RtPropertyBag, SKIP_IF_SANDBOXED_ATTRIBUTE,
};
use rtx::RtError;

#[test]
fn test_fallback_identity_without_attribute() {
    let inspector = RtModuleInspector::default();
    for name in ["Content.Client", "Robust.Shared.Maths", "Mod"] {
        let descriptor = inspector.inspect_image(&plain_image(name)).unwrap();
        assert_eq!(descriptor.module_id, name);
        assert!(!descriptor.supports_reload);
        assert!(descriptor.is_sandboxed);
        assert_eq!(descriptor.is_content_module, name.starts_with("Content."));
    }
}

#[test]
fn test_declared_attribute_wins() {
    let inspector = RtModuleInspector::default();
    let descriptor = inspector
        .inspect_image(&declared_image("Content.Core.Impl", "Content.Core", true))
        .unwrap();
    assert_eq!(descriptor.assembly_name, "Content.Core.Impl");
    assert_eq!(descriptor.module_id, "Content.Core");
    assert!(descriptor.supports_reload);
    assert_eq!(descriptor.kind(), RtModuleKind::Content);
}

#[test]
fn test_engine_module_kind() {
    let attribute = RtModuleAttribute {
        is_content_assembly: false,
        is_sandboxed: false,
        ..RtModuleAttribute::default()
    };
    let img = image(RtModuleMetadata::new("Robust.Client").attribute(attribute.to_record()));
    let descriptor = RtModuleInspector::default().inspect_image(&img).unwrap();
    assert_eq!(descriptor.kind(), RtModuleKind::Engine);
    assert_eq!(descriptor.module_id, "Robust.Client");
    assert!(!descriptor.is_sandboxed);
}

#[test]
fn test_legacy_marker_disables_sandbox() {
    let marker = RtAttributeRecord::new(SKIP_IF_SANDBOXED_ATTRIBUTE, RtPropertyBag::new());
    let img = image(RtModuleMetadata::new("Content.Legacy").attribute(marker));
    let inspector = RtModuleInspector::default().with_forced_sandbox(true);
    let descriptor = inspector.inspect_image(&img).unwrap();
    assert!(!descriptor.is_sandboxed);
    assert!(descriptor.has_attribute(SKIP_IF_SANDBOXED_ATTRIBUTE));
}

#[test]
fn test_forced_sandbox() {
    let attribute = RtModuleAttribute {
        is_sandboxed: false,
        ..RtModuleAttribute::default()
    };
    let img = image(RtModuleMetadata::new("Content.Trusted").attribute(attribute.to_record()));
    let forced = RtModuleInspector::default().with_forced_sandbox(true);
    assert!(forced.inspect_image(&img).unwrap().is_sandboxed);
    assert!(!RtModuleInspector::default().inspect_image(&img).unwrap().is_sandboxed);
}

#[test]
fn test_wrongly_typed_attribute_is_bad_image() {
    let bag = RtPropertyBag::new().with("supports_live_reloading", RtAttributeValue::Text("yes".into()));
    let record = RtAttributeRecord::new(rtx::module::MODULE_ATTRIBUTE, bag);
    let img = image(RtModuleMetadata::new("Content.Broken").attribute(record));
    let err = RtModuleInspector::default().inspect_image(&img).unwrap_err();
    assert!(matches!(err, RtError::BadImage { .. }));
}

#[test]
fn test_structural_errors_are_bad_image() {
    let inspector = RtModuleInspector::default();

    let not_a_zip = RtModuleImage::from_bytes(b"MZ not an archive".to_vec(), None);
    assert!(matches!(inspector.inspect_image(&not_a_zip), Err(RtError::BadImage { .. })));

    let bad_version = image(RtModuleMetadata::new("Content.A").version("one.two"));
    assert!(matches!(inspector.inspect_image(&bad_version), Err(RtError::BadImage { .. })));

    let blank_name = image(RtModuleMetadata::new("  "));
    assert!(matches!(inspector.inspect_image(&blank_name), Err(RtError::BadImage { .. })));

    let blank_reference = image(RtModuleMetadata::new("Content.A").reference(""));
    assert!(matches!(inspector.inspect_image(&blank_reference), Err(RtError::BadImage { .. })));
}

#[test]
fn test_inspect_stream_restores_position() {
    let img = image(RtModuleMetadata::new("Content.Stream").version("2.1.0-beta"));
    let mut cursor = Cursor::new(img.bytes().to_vec());
    let descriptor = RtModuleInspector::default().inspect(&mut cursor, None).unwrap();
    assert_eq!(descriptor.version.to_string(), "2.1.0-beta");
    assert_eq!(cursor.stream_position().unwrap(), 0);
    assert_eq!(cursor.seek(SeekFrom::End(0)).unwrap() as usize, img.len());
}

#[test]
fn test_fingerprint_tracks_bytes() {
    let a = plain_image("Content.A");
    let b = plain_image("Content.B");
    let inspector = RtModuleInspector::default();
    let da = inspector.inspect_image(&a).unwrap();
    assert_eq!(da.fingerprint, a.fingerprint());
    assert_ne!(a.fingerprint(), b.fingerprint());
}

#[test]
fn test_sessions_are_counted() {
    let inspector = RtModuleInspector::default();
    let gauge = inspector.gauge().clone();
    {
        let _session = inspector.open_session();
        assert_eq!(gauge.open_count(), 1);
        assert!(!gauge.arm());
        assert!(gauge.is_waiting());
    }
    assert_eq!(gauge.open_count(), 0);
    assert!(gauge.take_ready());
    assert!(!gauge.take_ready());
}
