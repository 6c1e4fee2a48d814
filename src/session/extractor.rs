use std::path::Path;

use super::{try_io, DataStreamError, Session};
use crate::{
    archiver::{ArchiverMode, ArchiverOutput},
    fs::{self, FREE_SPACE_SLACK},
    header::MediaError,
};

/// Result of [`Session::get_part`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartStatus {
    /// The part was extracted by this call.
    Extracted,

    /// The part was the last one extracted. The archiver was not invoked.
    AlreadyExtracted,
}

impl Session {
    /// Extract part `index` of the active package into `dest`.
    ///
    /// Parts are numbered from `1`, and must be requested in sequence.
    /// A new volume is requested when the current one has no more parts
    /// of the package.
    pub fn get_part(&mut self, index: u32, dest: &Path) -> Result<PartStatus, DataStreamError> {
        let entry = self.current_entry().ok_or(DataStreamError::NoPackage)?;
        let parts = entry.part_count();
        let max_size = entry.max_size();
        let read = self.counters.parts_read;

        if index == read {
            return Ok(PartStatus::AlreadyExtracted);
        }

        if index < read || index - read > 1 || index > parts {
            return Err(DataStreamError::Bounds { index, read, parts });
        }

        try_io!(dest, fs::check_directory(dest));

        if max_size > 0 {
            let available = try_io!(dest, self.space_probe.free_blocks(dest));
            let needed = max_size.saturating_add(FREE_SPACE_SLACK);

            if needed > available {
                return Err(DataStreamError::NoSpace {
                    path: dest.to_owned(),
                    needed,
                    available,
                });
            }
        }

        self.next_part(dest)?;

        if let Some(entry) = self.current_entry() {
            self.event_handler
                .part_extracted(entry.name(), index, parts);
        }

        Ok(PartStatus::Extracted)
    }

    /// Skip the parts of the active package that were not extracted.
    ///
    /// This is needed only for packages without volume counts. Packages
    /// with counts are located directly by
    /// [`find_package`](Self::find_package).
    pub fn skip_to_end(&mut self) -> Result<(), DataStreamError> {
        let Some(entry) = self.current_entry() else {
            return Ok(());
        };

        let parts = entry.part_count();
        let read = self.counters.parts_read;

        if read < parts && self.budget.limit().is_none() {
            self.skip(parts - read)?;
            self.counters.parts_read = parts;
        }

        Ok(())
    }

    fn next_part(&mut self, dest: &Path) -> Result<(), DataStreamError> {
        let mut swapped = false;

        loop {
            if self.budget.is_exhausted(self.counters.parts_read) {
                self.swap_volume()?;
                swapped = true;

                if self.budget.extend().is_none() {
                    let name = self
                        .current_entry()
                        .map(|e| e.name().to_owned())
                        .unwrap_or_default();

                    return Err(self.corrupt(MediaError::VolumeCounts(name)));
                }
            }

            let output = self.run_archiver(ArchiverMode::Extract {
                target: dest,
                patterns: &[],
            })?;

            if output.success() {
                self.counters.parts_read += 1;
                self.counters.total_parts_read += 1;
                self.counters.volume_parts_read += 1;
                return Ok(());
            }

            // If nothing was extracted from this volume, the part may be
            // in the next one.
            let progress = self.counters.volume_parts_read > self.counters.volume_parts_skipped;
            if progress || swapped {
                return Err(DataStreamError::SubprocessFailure(output));
            }

            self.swap_volume()?;
            swapped = true;
        }
    }

    /// Read and discard the next `count` parts.
    pub(super) fn skip(&mut self, count: u32) -> Result<(), DataStreamError> {
        let mut remaining = count;
        let mut on_volume = 0;
        let mut swapped = false;

        while remaining > 0 {
            let output = self.run_archiver(ArchiverMode::Skip)?;

            if output.success() {
                remaining -= 1;
                on_volume += 1;
                continue;
            }

            if swapped || on_volume > 0 || self.counters.volume_parts_read > 0 {
                return Err(DataStreamError::SubprocessFailure(output));
            }

            self.swap_volume()?;
            swapped = true;
        }

        self.counters.total_parts_read = self.counters.total_parts_read.saturating_add(count);
        self.counters.volume_parts_read = count;
        self.counters.volume_parts_skipped = count;

        if count > 0 {
            self.event_handler.parts_skipped(count);
        }

        Ok(())
    }

    /// Run the archiver on the current device.
    ///
    /// A failure of the archiver is not an error here. Callers decide
    /// if it can be recovered.
    pub(super) fn run_archiver(
        &mut self,
        mode: ArchiverMode<'_>,
    ) -> Result<ArchiverOutput, DataStreamError> {
        let device = self.device.as_mut().ok_or(DataStreamError::NotOpen)?;

        let output = try_io!(
            device.path().to_owned(),
            self.archiver.run(device, mode, self.options.block_size)
        );

        if !output.success() {
            log::warn!("{output}");
            self.event_handler.archiver_failed(&output);
        }

        Ok(output)
    }
}
