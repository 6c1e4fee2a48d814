use std::path::Path;

use super::{DataStreamError, Session};
use crate::{
    toc,
    volume::{span, Budget},
};

impl Session {
    /// Move the stream to the first part of the package `name`.
    ///
    /// If the table of contents is not loaded yet, [`init`](Self::init)
    /// is invoked with `device`. Otherwise, the device given to `init`
    /// is used.
    ///
    /// Packages must be requested in the order of the datastream.
    ///
    /// Return the number of parts of the package.
    pub fn find_package(&mut self, device: &Path, name: &str) -> Result<u32, DataStreamError> {
        if !toc::is_valid_name(name) {
            return Err(DataStreamError::InvalidName(name.to_owned()));
        }

        if self.toc.is_empty() {
            self.init(device, &[name], None)?;
        }

        // Position of the package, computed from the declared counts.
        let mut volume = 1;
        let mut volume_parts = 0;
        let mut nskip = 0u32;

        let mut found = None;
        for (index, entry) in self.toc.iter().enumerate() {
            if entry.name() == name {
                found = Some(index);
                break;
            }

            nskip = nskip.saturating_add(entry.part_count());
            volume += span(entry, &mut volume_parts);
        }

        let Some(index) = found else {
            return Err(DataStreamError::NotFound(name.to_owned()));
        };

        let entry = &self.toc[index];
        let part_count = entry.part_count();

        self.current = Some(index);
        self.budget = Budget::for_entry(entry);
        self.counters.parts_read = 0;
        self.counters.volume_parts_read = volume_parts;
        self.counters.volume_parts_skipped = 0;

        match self.budget.limit() {
            Some(0) => {
                // The package begins in the next volume.
                self.counters.volume_number = volume;
                self.counters.total_parts_read = nskip;
            }

            Some(_) if volume > 1 => {
                // The volume where the package starts may begin with the
                // last parts of the previous package.
                let leftover = volume_parts;

                if leftover > 0 {
                    self.counters.volume_number = volume - 1;
                    self.swap_volume()?;
                } else {
                    self.counters.volume_number = volume;
                }

                self.counters.total_parts_read = nskip.saturating_sub(leftover);
                self.skip(leftover)?;
            }

            limit => {
                // Skip the parts before the package from the current
                // position of the stream.
                let distance = nskip
                    .checked_sub(self.counters.total_parts_read)
                    .ok_or_else(|| DataStreamError::PackageBehind(name.to_owned()))?;

                if limit.is_some() {
                    self.counters.volume_number = volume;
                }

                self.skip(distance)?;
            }
        }

        log::debug!(
            "Package {name} found: {part_count} parts, volume {}",
            self.counters.volume_number
        );

        self.event_handler
            .package_located(name, part_count, self.counters.volume_number);

        Ok(part_count)
    }
}
