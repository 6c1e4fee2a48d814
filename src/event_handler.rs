use std::path::Path;

use crate::{archiver::ArchiverOutput, device::VolumeRequest};

/// Handler to receive notifications for events while a datastream is read.
///
/// All methods are optional.
#[expect(unused_variables)]
pub trait EventHandler: 'static {
    /// The marker was not found in the first block, and the fallback
    /// device is opened again.
    ///
    /// `attempt` starts at `1`.
    fn header_retry(&self, device: &Path, attempt: u32) {}

    /// The header was read and its table of contents was parsed.
    ///
    /// `header_len` is the size, in bytes, of the raw header.
    fn header_acquired(&self, device: &Path, header_len: usize, packages: usize) {}

    /// A package was found in the table of contents, and the stream is
    /// positioned before its first part.
    fn package_located(&self, name: &str, parts: u32, volume: u32) {}

    /// Part `index` (of `parts`) was extracted.
    fn part_extracted(&self, name: &str, index: u32, parts: u32) {}

    /// `count` parts were read and discarded.
    fn parts_skipped(&self, count: u32) {}

    /// A new volume is required.
    ///
    /// This is invoked before [`Medium::await_volume`](crate::Medium::await_volume).
    fn volume_requested(&self, request: &VolumeRequest<'_>) {}

    /// The archiver exited with an error.
    ///
    /// The failure may be recovered by a volume swap, so this is not
    /// necessarily a fatal error.
    fn archiver_failed(&self, output: &ArchiverOutput) {}
}

/// [`EventHandler`] instance to ignore all events.
pub struct NoEventHandler;

impl EventHandler for NoEventHandler {}
