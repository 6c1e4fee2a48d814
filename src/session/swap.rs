use super::{try_io, DataStreamError, Session};
use crate::device::VolumeRequest;

impl Session {
    /// Close the device, wait for the next volume, and open the device
    /// again.
    pub(super) fn swap_volume(&mut self) -> Result<(), DataStreamError> {
        let path = self.device_path.clone().ok_or(DataStreamError::NotOpen)?;

        self.close_device();
        self.counters.volume_number += 1;

        // Without volume counts, the table of contents can't tell how
        // many volumes there are.
        self.counters.volume_count = self.counters.volume_count.max(self.counters.volume_number);

        let request = VolumeRequest {
            volume: self.counters.volume_number,
            volume_count: self.counters.volume_count,
            device: &path,
            alias: self.options.alias.as_deref(),
        };

        log::info!("{request}");
        self.event_handler.volume_requested(&request);

        try_io!(&path, self.medium.await_volume(&request));
        let device = try_io!(&path, self.medium.open(&path));

        self.device = Some(device);
        self.counters.volume_parts_read = 0;
        self.counters.volume_parts_skipped = 0;

        Ok(())
    }
}
