#![allow(dead_code)]

pub mod archiver;
pub mod media;

use std::{cell::RefCell, io, path::Path, rc::Rc};

use pkg_datastream::{ArchiverOutput, EventHandler, SpaceProbe, VolumeRequest};

/// Free space reported to the session.
pub struct FixedSpace(pub u64);

impl SpaceProbe for FixedSpace {
    fn free_blocks(&self, _: &Path) -> io::Result<u64> {
        Ok(self.0)
    }
}

/// Event handler that stores a description of every event.
#[derive(Clone, Default)]
pub struct RecordedEvents(pub Rc<RefCell<Vec<String>>>);

impl RecordedEvents {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }
}

impl EventHandler for RecordedEvents {
    fn header_retry(&self, _: &Path, attempt: u32) {
        self.0.borrow_mut().push(format!("retry {attempt}"));
    }

    fn header_acquired(&self, _: &Path, _: usize, packages: usize) {
        self.0.borrow_mut().push(format!("header {packages}"));
    }

    fn package_located(&self, name: &str, parts: u32, volume: u32) {
        self.0
            .borrow_mut()
            .push(format!("located {name} {parts} {volume}"));
    }

    fn part_extracted(&self, name: &str, index: u32, parts: u32) {
        self.0
            .borrow_mut()
            .push(format!("extracted {name} {index}/{parts}"));
    }

    fn parts_skipped(&self, count: u32) {
        self.0.borrow_mut().push(format!("skipped {count}"));
    }

    fn volume_requested(&self, request: &VolumeRequest<'_>) {
        self.0.borrow_mut().push(request.to_string());
    }

    fn archiver_failed(&self, output: &ArchiverOutput) {
        self.0.borrow_mut().push(format!("failed {}", output.command));
    }
}
