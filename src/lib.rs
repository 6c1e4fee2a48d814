//! Read packages from SVR4 package datastreams.
//!
//! A datastream is a text header, with the table of contents, followed
//! by a sequence of `cpio` archives. The first archive contains the
//! metadata of every package, and the others are the parts of each
//! package, in the order of the table of contents. A datastream can be
//! split across several volumes (like tapes or floppies).
//!
//! # Examples
//!
//! ```no_run
//! # use pkg_datastream::*;
//! # use std::path::Path;
//! # fn main() -> Result<(), DataStreamError> {
//! let device = Path::new("/dev/rmt/0");
//! let mut session = Session::builder().metadata_dir("/var/tmp/meta").build();
//!
//! session.init(device, &["SUNWfoo"], None)?;
//!
//! let parts = session.find_package(device, "SUNWfoo")?;
//! for index in 1..=parts {
//!     session.get_part(index, Path::new("/var/tmp/SUNWfoo"))?;
//! }
//!
//! session.close(true);
//! # Ok(())
//! # }
//! ```

mod archiver;
mod device;
mod digest;
mod event_handler;
mod fs;
mod header;
mod session;
mod toc;
mod volume;

pub use archiver::{Archiver, ArchiverMode, ArchiverOutput, Cpio, CPIO_PROGRAM};
pub use device::{Device, Medium, SystemMedium, VolumeRequest};
pub use digest::DigestAlgorithm;
pub use event_handler::{EventHandler, NoEventHandler};
pub use fs::{SpaceProbe, StatvfsProbe, DEV_BSIZE, FREE_SPACE_SLACK};
pub use header::{
    probe, HeaderBuffer, Line, LineError, MediaError, BLOCK_SIZE, HEADER_PREFIX, HEADER_RETRIES,
    HEADER_SUFFIX,
};
pub use session::{Counters, DataStreamError, PartStatus, Session, SessionBuilder, SessionState};
pub use toc::{TocEntry, TocError, MAX_LINE_LEN, MAX_NAME_LEN};
pub use volume::{span, VolumeCounts};
