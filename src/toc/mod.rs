mod parser;

use std::fmt;

use crate::{
    device::Device,
    header::{HeaderBuffer, Line, LineError, MediaError, HEADER_SUFFIX},
    session::try_io,
    volume::{span, VolumeCounts},
    DataStreamError,
};

/// Maximum length of a package name.
pub const MAX_NAME_LEN: usize = 96;

/// Maximum length of a line in the table of contents.
pub const MAX_LINE_LEN: usize = 128;

/// Name reserved to select every package.
pub(crate) const ALL_PACKAGES: &str = "all";

/// Errors from [`TocEntry::try_from`].
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum TocError {
    #[error("{0}")]
    Line(#[from] LineError),

    #[error("Missing {0}.")]
    MissingField(&'static str),

    #[error("Invalid number: {0:?}")]
    InvalidNumber(String),

    #[error("Package name longer than {MAX_NAME_LEN} bytes.")]
    NameTooLong,

    #[error("Volume counts don't cover {0} parts.")]
    Uncovered(u32),
}

/// A package in the table of contents of a datastream.
///
/// # Examples
///
/// ```
/// # use pkg_datastream::*;
/// let entry = TocEntry::try_from("SUNWfoo 5 2048 3 2").unwrap();
///
/// assert_eq!(entry.name(), "SUNWfoo");
/// assert_eq!(entry.part_count(), 5);
/// assert_eq!(entry.max_size(), 2048);
/// assert_eq!(entry.volume_counts().as_slice(), &[3, 2]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TocEntry {
    name: String,
    part_count: u32,
    max_size: u64,
    volume_counts: VolumeCounts,
}

impl TocEntry {
    pub fn new(
        name: impl Into<String>,
        part_count: u32,
        max_size: u64,
        volume_counts: Vec<u32>,
    ) -> Self {
        TocEntry {
            name: name.into(),
            part_count,
            max_size,
            volume_counts: VolumeCounts::from(volume_counts),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of parts (archives) of the package.
    pub fn part_count(&self) -> u32 {
        self.part_count
    }

    /// Size of the installed package, in 512-byte blocks.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn volume_counts(&self) -> &VolumeCounts {
        &self.volume_counts
    }
}

impl TryFrom<&str> for TocEntry {
    type Error = TocError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        parser::parse_line(line)
    }
}

impl fmt::Display for TocEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.part_count, self.max_size)?;

        if !self.volume_counts.is_empty() {
            write!(f, " {}", self.volume_counts)?;
        }

        Ok(())
    }
}

/// Check if `name` can be used to select a single package.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name != ALL_PACKAGES
        && !name.chars().any(char::is_whitespace)
}

/// Table of contents of a datastream.
#[derive(Debug)]
pub(crate) struct Toc {
    pub entries: Vec<TocEntry>,
    pub volume_count: u32,
}

/// Parse the table of contents in `buffer`.
///
/// If a line is not complete, a new block is read from `device`.
pub(crate) fn parse(
    buffer: &mut HeaderBuffer,
    device: &mut Device,
    block_size: usize,
) -> Result<Toc, DataStreamError> {
    let mut entries = Vec::new();
    let mut volume_count = 1;
    let mut volume_parts = 0;
    let mut line_number = 0;

    loop {
        let line = match buffer.read_line(MAX_LINE_LEN) {
            Ok(Line::Text(line)) => line,

            Ok(Line::NeedMoreData) => {
                let mut block = vec![0; block_size];
                if !try_io!(device.path(), device.read_block(&mut block)) {
                    return Err(DataStreamError::corrupt(
                        device.path(),
                        MediaError::MissingTerminator,
                    ));
                }

                buffer.append_block(&block)?;
                continue;
            }

            Ok(Line::Eof) => {
                return Err(DataStreamError::corrupt(
                    device.path(),
                    MediaError::MissingTerminator,
                ))
            }

            Err(e) => {
                let cause = MediaError::Toc {
                    line: line_number + 1,
                    cause: e.into(),
                };

                return Err(DataStreamError::corrupt(device.path(), cause));
            }
        };

        line_number += 1;

        if line == HEADER_SUFFIX {
            break;
        }

        // The first line (the header prefix) is also a comment.
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let entry = TocEntry::try_from(line.as_str()).map_err(|cause| {
            let cause = MediaError::Toc {
                line: line_number,
                cause,
            };

            DataStreamError::corrupt(device.path(), cause)
        })?;

        volume_count += span(&entry, &mut volume_parts);
        entries.push(entry);
    }

    if entries.is_empty() {
        return Err(DataStreamError::EmptyContainer(device.path().to_owned()));
    }

    log::debug!(
        "{} packages in {} volumes, header is {} bytes",
        entries.len(),
        volume_count,
        buffer.len(),
    );

    Ok(Toc {
        entries,
        volume_count,
    })
}

#[test]
fn validate_names() {
    assert!(is_valid_name("SUNWcsu"));
    assert!(!is_valid_name(""));
    assert!(!is_valid_name("all"));
    assert!(!is_valid_name("two words"));
    assert!(!is_valid_name(&"x".repeat(MAX_NAME_LEN + 1)));
}

#[test]
fn format_entries() {
    assert_eq!(TocEntry::new("a", 1, 10, vec![]).to_string(), "a 1 10");
    assert_eq!(
        TocEntry::new("b", 3, 20, vec![0, 3]).to_string(),
        "b 3 20 0 3"
    );
}
