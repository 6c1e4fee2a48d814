//! Transfer a session to another process.
//!
//! A process can locate a package, and hand over the rest of the work
//! to a child process. The child receives the open device (as an
//! inherited file descriptor), and the record from
//! [`Session::export_state`].

use std::path::PathBuf;

use super::{Counters, DataStreamError, Session, SessionBuilder};
use crate::{
    device::Device,
    toc::{self, TocEntry},
    volume::Budget,
};

/// Position of a session in the datastream.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionState {
    /// Device to open when a new volume is required.
    pub device: Option<PathBuf>,

    pub block_size: usize,
    pub counters: Counters,

    /// Active package.
    pub entry: Option<TocEntry>,
}

impl SessionState {
    fn validate(&self) -> Result<(), DataStreamError> {
        let counters = &self.counters;

        if self.block_size == 0 {
            return Err(DataStreamError::InvalidState("block size is zero"));
        }

        if counters.volume_number == 0 || counters.volume_count == 0 {
            return Err(DataStreamError::InvalidState("volumes are numbered from 1"));
        }

        match &self.entry {
            Some(entry) => {
                if !toc::is_valid_name(entry.name()) {
                    return Err(DataStreamError::InvalidState("invalid package name"));
                }

                if counters.parts_read > entry.part_count() {
                    return Err(DataStreamError::InvalidState("more parts read than available"));
                }

                if !entry.volume_counts().covers(entry.part_count()) {
                    return Err(DataStreamError::InvalidState("volume counts are too small"));
                }
            }

            None if counters.parts_read > 0 => {
                return Err(DataStreamError::InvalidState("parts read without a package"));
            }

            None => (),
        }

        Ok(())
    }
}

impl Session {
    /// Current position in the datastream.
    pub fn state(&self) -> SessionState {
        SessionState {
            device: self.device_path.clone(),
            block_size: self.options.block_size,
            counters: self.counters,
            entry: self.current_entry().cloned(),
        }
    }

    /// Serialize [`state`](Self::state) to a JSON record.
    pub fn export_state(&self) -> Result<Vec<u8>, DataStreamError> {
        Ok(serde_json::to_vec(&self.state())?)
    }

    /// Create a session from a record written by
    /// [`export_state`](Self::export_state).
    ///
    /// The device is not opened. Use [`adopt_device`](Self::adopt_device)
    /// to give it to the session.
    pub fn import_state(
        record: &[u8],
        builder: SessionBuilder,
    ) -> Result<Session, DataStreamError> {
        let state: SessionState = serde_json::from_slice(record)?;
        state.validate()?;

        let mut session = builder.block_size(state.block_size).build();

        session.device_path = state.device;
        session.counters = state.counters;

        if let Some(entry) = state.entry {
            let mut budget = Budget::for_entry(&entry);
            budget.catch_up(state.counters.parts_read);

            session.budget = budget;
            session.toc = vec![entry];
            session.current = Some(0);
        }

        Ok(session)
    }

    /// Use `device` as the current device, positioned where the exported
    /// session left it.
    pub fn adopt_device(&mut self, device: Device) {
        self.close_device();

        if self.device_path.is_none() {
            self.device_path = Some(device.path().to_owned());
        }

        self.device = Some(device);
    }
}

#[test]
fn reject_invalid_states() {
    let valid = SessionState {
        device: Some(PathBuf::from("/dev/rmt/0n")),
        block_size: 512,
        counters: Counters {
            parts_read: 2,
            ..Counters::default()
        },
        entry: Some(TocEntry::new("SUNWfoo", 3, 100, vec![2, 1])),
    };

    valid.validate().unwrap();

    let check = |state: SessionState, message: &str| match state.validate() {
        Err(DataStreamError::InvalidState(m)) => assert_eq!(m, message),
        other => panic!("unexpected result: {other:?}"),
    };

    check(
        SessionState {
            block_size: 0,
            ..valid.clone()
        },
        "block size is zero",
    );

    check(
        SessionState {
            counters: Counters {
                volume_number: 0,
                ..valid.counters
            },
            ..valid.clone()
        },
        "volumes are numbered from 1",
    );

    check(
        SessionState {
            counters: Counters {
                parts_read: 4,
                ..valid.counters
            },
            ..valid.clone()
        },
        "more parts read than available",
    );

    check(
        SessionState {
            entry: Some(TocEntry::new("all", 3, 100, vec![])),
            ..valid.clone()
        },
        "invalid package name",
    );

    check(
        SessionState {
            entry: None,
            ..valid
        },
        "parts read without a package",
    );
}
