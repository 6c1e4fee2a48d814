//! Acquire the header of a datastream.
//!
//! The header is a text block at the beginning of the first volume:
//!
//! ```text
//! # PaCkAgE DaTaStReAm
//! SUNWfoo 2 1024
//! SUNWbar 5 4096 3 2
//! # end of header
//! ```
//!
//! The text is padded with NUL bytes to a multiple of the block size.

mod buffer;

pub use buffer::{HeaderBuffer, Line, LineError};

use std::path::{Path, PathBuf};

use crate::{
    device::{Device, Medium, SystemMedium},
    session::try_io,
    toc::TocError,
    DataStreamError, EventHandler,
};

/// First line of a datastream.
pub const HEADER_PREFIX: &str = "# PaCkAgE DaTaStReAm";

/// Line after the table of contents.
pub const HEADER_SUFFIX: &str = "# end of header";

/// Size of every read from the device.
pub const BLOCK_SIZE: usize = 512;

/// Default number of attempts to find the header in a fallback device.
pub const HEADER_RETRIES: u32 = 10;

/// Reasons to reject a datastream.
#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    #[error("Missing datastream header.")]
    MissingMarker,

    #[error("No datastream header after {0} attempts.")]
    RetriesExhausted(u32),

    #[error("Truncated datastream header.")]
    Truncated,

    #[error("Invalid line {line} in the table of contents: {cause}")]
    Toc { line: usize, cause: TocError },

    #[error("Missing end of the table of contents.")]
    MissingTerminator,

    #[error("Package {0} requires more volumes than declared.")]
    VolumeCounts(String),
}

/// Device positioned after the header, and the header itself.
pub(crate) struct Acquired {
    pub device: Device,
    pub buffer: HeaderBuffer,

    /// Device to open at close, to rewind the tape, if the header was
    /// found in the fallback device.
    pub rewind: Option<PathBuf>,
}

/// Check if the device in `path` contains a datastream.
///
/// Only the first block is read.
pub fn probe(path: impl AsRef<Path>) -> bool {
    probe_with(&mut SystemMedium::default(), path.as_ref(), BLOCK_SIZE)
}

pub(crate) fn probe_with(medium: &mut dyn Medium, path: &Path, block_size: usize) -> bool {
    let mut block = vec![0; block_size];

    match medium.open(path).and_then(|mut d| d.read_block(&mut block)) {
        Ok(complete) => complete && is_datastream(&block),
        Err(e) => {
            log::debug!("Can't read {}: {e}", path.display());
            false
        }
    }
}

fn is_datastream(block: &[u8]) -> bool {
    block.starts_with(HEADER_PREFIX.as_bytes())
}

/// Open `path`, and read the header of the datastream.
///
/// If the first block does not contain the header, and a `fallback`
/// device is given, try to read it from the fallback up to `retries`
/// times. This is needed for tapes that don't rewind.
pub(crate) fn acquire(
    medium: &mut dyn Medium,
    event_handler: &dyn EventHandler,
    path: &Path,
    fallback: Option<&Path>,
    block_size: usize,
    retries: u32,
) -> Result<Acquired, DataStreamError> {
    let mut block = vec![0; block_size];

    let mut device = try_io!(path, medium.open(path));
    read_header_block(&mut device, &mut block)?;

    let mut attempts = 0;
    let mut rewind = None;

    while !is_datastream(&block) {
        let Some(fallback) = fallback else {
            return Err(DataStreamError::corrupt(path, MediaError::MissingMarker));
        };

        attempts += 1;
        if attempts > retries {
            return Err(DataStreamError::corrupt(
                path,
                MediaError::RetriesExhausted(retries),
            ));
        }

        event_handler.header_retry(fallback, attempts);
        log::debug!(
            "Header not found in {}, attempt {attempts}",
            device.path().display()
        );

        // Move to the next file in the tape.
        if attempts > 1 {
            if let Err(e) = device.drain() {
                log::debug!("Can't drain {}: {e}", device.path().display());
            }
        }

        drop(device);

        device = try_io!(fallback, medium.open(fallback));
        read_header_block(&mut device, &mut block)?;

        rewind = Some(path.to_owned());
    }

    // Read blocks until the whole header is in the buffer.
    let mut buffer = HeaderBuffer::new();
    buffer.append_block(&block)?;

    while !buffer.contains(HEADER_SUFFIX.as_bytes()) {
        read_header_block(&mut device, &mut block)?;
        buffer.append_block(&block)?;
    }

    Ok(Acquired {
        device,
        buffer,
        rewind,
    })
}

/// Read a full block from `device`. A short read means that the header
/// is truncated.
pub(crate) fn read_header_block(
    device: &mut Device,
    block: &mut [u8],
) -> Result<(), DataStreamError> {
    if !try_io!(device.path(), device.read_block(block)) {
        return Err(DataStreamError::corrupt(device.path(), MediaError::Truncated));
    }

    Ok(())
}
