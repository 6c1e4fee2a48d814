//! Read packages from a datastream.

mod extractor;
mod locator;
mod state;
mod swap;


use std::{
    collections::TryReserveError,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

pub use extractor::PartStatus;
pub use state::SessionState;

use crate::{
    archiver::{Archiver, ArchiverMode, ArchiverOutput, Cpio},
    device::{Device, Medium, SystemMedium},
    digest::{hex_digest, DigestAlgorithm},
    event_handler::{EventHandler, NoEventHandler},
    fs::{self, SpaceProbe, StatvfsProbe},
    header::{self, HeaderBuffer, MediaError, BLOCK_SIZE, HEADER_RETRIES},
    toc::{self, TocEntry, ALL_PACKAGES},
    volume::Budget,
};

/// File with the signature of the packages, stored in the first archive.
const SIGNATURE_FILENAME: &str = "signature";

#[derive(thiserror::Error, Debug)]
pub enum DataStreamError {
    #[error("I/O error in {1}: {0}")]
    Io(io::Error, PathBuf),

    #[error("Invalid datastream in {device}: {cause}")]
    CorruptMedia { device: PathBuf, cause: MediaError },

    #[error("Can't allocate memory for the header: {0}")]
    OutOfMemory(#[from] TryReserveError),

    #[error("No packages in the datastream in {0}.")]
    EmptyContainer(PathBuf),

    #[error("Not enough space in {path}: needs {needed} blocks, {available} available.")]
    NoSpace {
        path: PathBuf,
        needed: u64,
        available: u64,
    },

    #[error("Archiver failed: {0}")]
    SubprocessFailure(ArchiverOutput),

    #[error("Package {0} not found in the datastream.")]
    NotFound(String),

    #[error("Part {index} is out of sequence ({read} of {parts} parts read).")]
    Bounds { index: u32, read: u32, parts: u32 },

    #[error("Package {0} is before the current position of the stream.")]
    PackageBehind(String),

    #[error("Invalid package name: {0:?}")]
    InvalidName(String),

    #[error("No package selected.")]
    NoPackage,

    #[error("The device is not open.")]
    NotOpen,

    #[error("Invalid session state: {0}")]
    InvalidState(&'static str),

    #[error("Invalid session record: {0}")]
    StateRecord(#[from] serde_json::Error),
}

impl DataStreamError {
    pub(crate) fn corrupt(device: &Path, cause: MediaError) -> Self {
        DataStreamError::CorruptMedia {
            device: device.to_owned(),
            cause,
        }
    }
}

macro_rules! try_io {
    ($path:expr, $e:expr $(,)?) => {
        $e.map_err(|e| $crate::DataStreamError::Io(::std::io::Error::from(e), $path.into()))?
    };
}

// Make visible to mods.
pub(crate) use try_io;

/// Counters to track the position of a session in the datastream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Counters {
    /// Parts read or skipped since the beginning of the datastream.
    pub total_parts_read: u32,

    /// Volume in the device, starting at `1`.
    pub volume_number: u32,

    /// Volumes declared in the table of contents.
    pub volume_count: u32,

    /// Parts read in the current volume, including skipped parts.
    pub volume_parts_read: u32,

    /// Parts skipped in the current volume.
    pub volume_parts_skipped: u32,

    /// Parts of the active package extracted so far.
    pub parts_read: u32,
}

impl Default for Counters {
    fn default() -> Self {
        Counters {
            total_parts_read: 0,
            volume_number: 1,
            volume_count: 1,
            volume_parts_read: 0,
            volume_parts_skipped: 0,
            parts_read: 0,
        }
    }
}

#[derive(Clone, Debug)]
struct Options {
    block_size: usize,
    header_retries: u32,
    metadata_dir: PathBuf,
    alias: Option<String>,
}

/// Builder to create a [`Session`].
///
/// # Examples
///
/// ```
/// # use pkg_datastream::*;
/// let session = Session::builder()
///     .archiver(Cpio::new("/usr/sfw/bin/cpio"))
///     .metadata_dir("/var/tmp/install")
///     .alias("tape1")
///     .build();
///
/// assert!(session.entries().is_empty());
/// ```
pub struct SessionBuilder {
    options: Options,
    archiver: Box<dyn Archiver>,
    medium: Box<dyn Medium>,
    space_probe: Box<dyn SpaceProbe>,
    event_handler: Box<dyn EventHandler>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        SessionBuilder {
            options: Options {
                block_size: BLOCK_SIZE,
                header_retries: HEADER_RETRIES,
                metadata_dir: PathBuf::from("."),
                alias: None,
            },
            archiver: Box::new(Cpio::default()),
            medium: Box::new(SystemMedium::default()),
            space_probe: Box::new(StatvfsProbe),
            event_handler: Box::new(NoEventHandler),
        }
    }
}

impl SessionBuilder {
    /// Size of the blocks read from the device, and given to the archiver.
    ///
    /// # Panics
    ///
    /// If `block_size` is `0`.
    pub fn block_size(mut self, block_size: usize) -> Self {
        assert!(block_size > 0, "block size must not be zero");
        self.options.block_size = block_size;
        self
    }

    /// Number of attempts to find the header in the fallback device.
    pub fn header_retries(mut self, retries: u32) -> Self {
        self.options.header_retries = retries;
        self
    }

    /// Directory to extract the first archive, with the metadata of
    /// the packages.
    pub fn metadata_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.metadata_dir = path.into();
        self
    }

    /// Name of the device to show when a new volume is required.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.options.alias = Some(alias.into());
        self
    }

    pub fn archiver(mut self, archiver: impl Archiver + 'static) -> Self {
        self.archiver = Box::new(archiver);
        self
    }

    pub fn medium(mut self, medium: impl Medium + 'static) -> Self {
        self.medium = Box::new(medium);
        self
    }

    pub fn space_probe(mut self, probe: impl SpaceProbe + 'static) -> Self {
        self.space_probe = Box::new(probe);
        self
    }

    pub fn event_handler(mut self, event_handler: impl EventHandler) -> Self {
        self.event_handler = Box::new(event_handler);
        self
    }

    pub fn build(self) -> Session {
        Session {
            options: self.options,
            archiver: self.archiver,
            medium: self.medium,
            space_probe: self.space_probe,
            event_handler: self.event_handler,
            device_path: None,
            device: None,
            rewind: None,
            header: None,
            toc: Vec::new(),
            current: None,
            budget: Budget::default(),
            counters: Counters::default(),
        }
    }
}

/// A session to read packages from a datastream.
///
/// The typical sequence is:
///
/// 1. [`init`](Self::init) to read the table of contents.
/// 2. [`find_package`](Self::find_package) to move to the first part of
///    a package.
/// 3. [`get_part`](Self::get_part) for each part, starting at `1`.
/// 4. [`skip_to_end`](Self::skip_to_end) if some parts were not read.
/// 5. [`close`](Self::close).
///
/// Steps 2 to 4 can be repeated for packages in the order of the
/// datastream. See [`order_packages`](Self::order_packages).
pub struct Session {
    options: Options,
    archiver: Box<dyn Archiver>,
    medium: Box<dyn Medium>,
    space_probe: Box<dyn SpaceProbe>,
    event_handler: Box<dyn EventHandler>,

    /// Device to open when a new volume is required.
    device_path: Option<PathBuf>,
    device: Option<Device>,
    rewind: Option<PathBuf>,

    header: Option<HeaderBuffer>,
    toc: Vec<TocEntry>,

    /// Index of the active package in `toc`.
    current: Option<usize>,
    budget: Budget,
    counters: Counters,
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

impl Session {
    /// Create a session with the default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Check if the device in `path` contains a datastream.
    ///
    /// Only the first block is read, and the device is closed before
    /// returning.
    pub fn probe(&mut self, path: &Path) -> bool {
        header::probe_with(self.medium.as_mut(), path, self.options.block_size)
    }

    /// Read the header of the datastream in `device`, and extract the
    /// metadata of the packages to the metadata directory.
    ///
    /// If `packages` is empty, or only contains `all`, the metadata of
    /// every package is extracted.
    ///
    /// `fallback` is a device to try if the header is not found in
    /// `device`, like the non-rewinding device of a tape.
    ///
    /// The table of contents is read only once. Use a full
    /// [`close`](Self::close) to read it again.
    pub fn init(
        &mut self,
        device: &Path,
        packages: &[&str],
        fallback: Option<&Path>,
    ) -> Result<(), DataStreamError> {
        if !self.toc.is_empty() {
            log::debug!("Table of contents already loaded.");
            return Ok(());
        }

        self.close_device();

        let guard = LoadGuard {
            session: self,
            committed: false,
        };

        guard.load(device, packages, fallback)
    }

    /// Close the device.
    ///
    /// If `full` is `true`, the header and the table of contents are
    /// released, and the counters are reset, so the next
    /// [`init`](Self::init) reads a new datastream.
    pub fn close(&mut self, full: bool) {
        if full {
            self.header = None;
            self.toc.clear();
            self.current = None;
            self.budget = Budget::default();
            self.counters = Counters::default();
        }

        self.close_device();
    }

    /// Check if the device is open.
    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Packages in the datastream, in the order they are stored.
    pub fn entries(&self) -> &[TocEntry] {
        &self.toc
    }

    /// Package selected by the last call to
    /// [`find_package`](Self::find_package).
    pub fn current_entry(&self) -> Option<&TocEntry> {
        self.current.and_then(|i| self.toc.get(i))
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn volume_count(&self) -> u32 {
        self.counters.volume_count
    }

    /// Raw bytes of the header, as read from the device.
    pub fn export_raw_header(&self) -> Option<&[u8]> {
        self.header.as_ref().map(HeaderBuffer::as_bytes)
    }

    /// Digest of the raw header, as a lowercase hex string.
    pub fn header_digest(&self, algorithm: DigestAlgorithm) -> Option<String> {
        self.export_raw_header()
            .map(|header| hex_digest(algorithm, header))
    }

    /// Sort `packages` in the order they appear in the datastream.
    ///
    /// Names that are not in the datastream are moved to the end.
    pub fn order_packages<S: AsRef<str>>(&self, packages: &mut [S]) {
        packages.sort_by_key(|name| {
            self.toc
                .iter()
                .position(|e| e.name() == name.as_ref())
                .unwrap_or(usize::MAX)
        });
    }

    /// Copy the rest of the device to `output`.
    ///
    /// Return the number of bytes copied.
    pub fn dump_payload(&mut self, output: &mut impl Write) -> Result<u64, DataStreamError> {
        let device = self.device.as_mut().ok_or(DataStreamError::NotOpen)?;

        let mut block = vec![0; self.options.block_size];
        let mut total = 0;

        loop {
            let n = try_io!(device.path(), device.read(&mut block));
            if n == 0 {
                return Ok(total);
            }

            try_io!(device.path(), output.write_all(&block[..n]));
            total += n as u64;
        }
    }

    /// Drop the device. If the header was found in a fallback device,
    /// open the main device once to rewind the tape.
    fn close_device(&mut self) {
        self.device = None;

        if let Some(path) = self.rewind.take() {
            if let Err(e) = self.medium.open(&path) {
                log::debug!("Can't rewind {}: {e}", path.display());
            }
        }
    }

    fn corrupt(&self, cause: MediaError) -> DataStreamError {
        let device = self.device_path.as_deref().unwrap_or(Path::new(""));
        DataStreamError::corrupt(device, cause)
    }
}

/// Reset the header state of a session, unless the load is committed.
///
/// The table of contents is visible to the session only after it is
/// fully parsed and the first archive is extracted.
struct LoadGuard<'a> {
    session: &'a mut Session,
    committed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let session = &mut *self.session;
            session.header = None;
            session.toc.clear();
            session.current = None;
            session.budget = Budget::default();
            session.counters = Counters::default();
            session.close_device();
            session.device_path = None;
        }
    }
}

impl LoadGuard<'_> {
    fn load(
        mut self,
        path: &Path,
        packages: &[&str],
        fallback: Option<&Path>,
    ) -> Result<(), DataStreamError> {
        let session = &mut *self.session;
        let block_size = session.options.block_size;

        let header::Acquired {
            mut device,
            buffer: mut header,
            rewind,
        } = header::acquire(
            session.medium.as_mut(),
            session.event_handler.as_ref(),
            path,
            fallback,
            block_size,
            session.options.header_retries,
        )?;

        session.rewind = rewind;

        let toc = toc::parse(&mut header, &mut device, block_size)?;

        session
            .event_handler
            .header_acquired(path, header.len(), toc.entries.len());

        session.device_path = Some(path.to_owned());
        session.device = Some(device);
        session.header = Some(header);
        session.toc = toc.entries;
        session.current = None;
        session.budget = Budget::default();
        session.counters = Counters {
            volume_count: toc.volume_count,
            ..Counters::default()
        };

        // The first archive contains the metadata of the packages.
        let target = session.options.metadata_dir.clone();
        try_io!(&target, fs::prepare_directory(&target));

        let patterns = metadata_patterns(packages);
        let output = session.run_archiver(ArchiverMode::Extract {
            target: &target,
            patterns: &patterns,
        })?;

        if !output.success() {
            return Err(DataStreamError::SubprocessFailure(output));
        }

        self.committed = true;
        Ok(())
    }
}

/// Patterns to extract the metadata of `packages` from the first archive.
fn metadata_patterns(packages: &[&str]) -> Vec<String> {
    let mut patterns: Vec<_> = packages
        .iter()
        .filter(|&&p| p != ALL_PACKAGES)
        .map(|p| format!("{p}/*"))
        .collect();

    // Extract signature too, if present.
    if !patterns.is_empty() {
        patterns.push(SIGNATURE_FILENAME.to_owned());
    }

    patterns
}

#[test]
fn patterns_for_metadata() {
    assert!(metadata_patterns(&[]).is_empty());
    assert!(metadata_patterns(&["all"]).is_empty());

    assert_eq!(
        metadata_patterns(&["SUNWa", "all", "SUNWb"]),
        ["SUNWa/*", "SUNWb/*", "signature"]
    );
}
