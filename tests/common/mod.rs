//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Rtx.
//! The Rtx project belongs to the Dunimd Team.

//! Fixtures shared by the integration tests: module images and an entry
//! point that records every hook into a journal.

#![allow(dead_code)]

use std::any::Any;
use std::sync::{Arc, Mutex};

use rtx::module::{
    RtEntryPoint, RtFrameArgs, RtModuleAttribute, RtModuleImage, RtModuleManifest,
    RtModuleMetadata, RtReloadListener, RtReloadableEntryPoint, RtStaticLinker,
    RtTestingCallbacks, RtUpdateLevel,
};

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn callbacks(journal: &Journal) -> RtTestingCallbacks {
    Arc::new(vec![journal.clone() as Arc<dyn Any + Send + Sync>])
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Journal lines ending in `.{hook}`, in order.
pub fn hooks(journal: &Journal, hook: &str) -> Vec<String> {
    let suffix = format!(".{}", hook);
    entries(journal)
        .into_iter()
        .filter(|line| line.ends_with(&suffix))
        .collect()
}

pub struct Recorder {
    tag: &'static str,
    journal: Option<Journal>,
    reloadable: bool,
    listener: bool,
}

impl Recorder {
    pub fn new(tag: &'static str) -> Self {
        Recorder {
            tag,
            journal: None,
            reloadable: false,
            listener: false,
        }
    }

    pub fn reloadable(mut self) -> Self {
        self.reloadable = true;
        self
    }

    pub fn listener(mut self) -> Self {
        self.listener = true;
        self
    }

    fn record(&self, hook: &str) {
        if let Some(journal) = &self.journal {
            journal.lock().unwrap().push(format!("{}.{}", self.tag, hook));
        }
    }
}

impl RtEntryPoint for Recorder {
    fn pre_init(&mut self) {
        self.record("PreInit");
    }
    fn init(&mut self) {
        self.record("Init");
    }
    fn post_init(&mut self) {
        self.record("PostInit");
    }
    fn update(&mut self, _level: RtUpdateLevel, _args: &RtFrameArgs) {
        self.record("Update");
    }
    fn shutdown(&mut self) {
        self.record("Shutdown");
    }
    fn dispose(&mut self) {
        self.record("Dispose");
    }
    fn set_testing_callbacks(&mut self, callbacks: RtTestingCallbacks) {
        self.journal = callbacks
            .iter()
            .find_map(|c| c.clone().downcast::<Mutex<Vec<String>>>().ok());
    }
    fn as_reloadable(&mut self) -> Option<&mut dyn RtReloadableEntryPoint> {
        if self.reloadable {
            Some(self)
        } else {
            None
        }
    }
    fn as_reload_listener(&mut self) -> Option<&mut dyn RtReloadListener> {
        if self.listener {
            Some(self)
        } else {
            None
        }
    }
}

impl RtReloadableEntryPoint for Recorder {
    fn reloaded_pre_init(&mut self) {
        self.record("ReloadedPreInit");
    }
    fn reloaded_init(&mut self) {
        self.record("ReloadedInit");
    }
    fn reloaded_post_init(&mut self) {
        self.record("ReloadedPostInit");
    }
}

impl RtReloadListener for Recorder {
    fn live_reload_triggered(&mut self) {
        self.record("ReloadTriggered");
    }
    fn live_reload_completed(&mut self) {
        self.record("ReloadCompleted");
    }
}

pub fn x1() -> Box<dyn RtEntryPoint> {
    Box::new(Recorder::new("X1"))
}

pub fn x2() -> Box<dyn RtEntryPoint> {
    Box::new(Recorder::new("X2"))
}

pub fn y1() -> Box<dyn RtEntryPoint> {
    Box::new(Recorder::new("Y1"))
}

pub fn r1() -> Box<dyn RtEntryPoint> {
    Box::new(Recorder::new("R1").reloadable().listener())
}

pub fn l1() -> Box<dyn RtEntryPoint> {
    Box::new(Recorder::new("L1").listener())
}

pub fn image(metadata: RtModuleMetadata) -> RtModuleImage {
    RtModuleImage::pack(&metadata, &[]).unwrap()
}

/// Image without the declarative module attribute.
pub fn plain_image(assembly_name: &str) -> RtModuleImage {
    image(RtModuleMetadata::new(assembly_name))
}

/// Image declaring `module_id` through the module attribute.
pub fn declared_image(assembly_name: &str, module_id: &str, reload: bool) -> RtModuleImage {
    let attribute = RtModuleAttribute {
        id: Some(module_id.to_string()),
        supports_live_reloading: reload,
        ..RtModuleAttribute::default()
    };
    image(RtModuleMetadata::new(assembly_name).attribute(attribute.to_record()))
}

/// Linker knowing X (X1, X2), Y (Y1), R (R1) and L (L1), plus a module
/// with no entry points for every name in `empty`.
pub fn linker(empty: &[&str]) -> RtStaticLinker {
    let mut linker = RtStaticLinker::new()
        .with("X", RtModuleManifest::new().with(x1).with(x2))
        .with("Y", RtModuleManifest::new().with(y1))
        .with("R", RtModuleManifest::new().with(r1))
        .with("L", RtModuleManifest::new().with(l1));
    for name in empty {
        linker.register(*name, RtModuleManifest::new());
    }
    linker
}
