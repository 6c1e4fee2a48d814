use std::{io, path::Path};

use rustix::fs::FileType;

/// Size of the blocks used to measure packages in the table of contents.
pub const DEV_BSIZE: u64 = 512;

/// Extra blocks required in the target filesystem, on top of the size
/// declared for a package.
pub const FREE_SPACE_SLACK: u64 = 50;

/// Query the free space in a filesystem.
pub trait SpaceProbe {
    /// Return the number of free [`DEV_BSIZE`] blocks in the filesystem
    /// containing `path`.
    fn free_blocks(&self, path: &Path) -> io::Result<u64>;
}

/// [`SpaceProbe`] using `statvfs(2)`.
pub struct StatvfsProbe;

impl SpaceProbe for StatvfsProbe {
    fn free_blocks(&self, path: &Path) -> io::Result<u64> {
        let stat = rustix::fs::statvfs(path)?;

        let fragment = if stat.f_frsize > 0 {
            stat.f_frsize
        } else {
            stat.f_bsize
        };

        Ok(fragment.div_ceil(DEV_BSIZE).saturating_mul(stat.f_bfree))
    }
}

/// Check that `path` is a directory.
pub(crate) fn check_directory(path: &Path) -> io::Result<()> {
    let stat = rustix::fs::stat(path)?;

    if FileType::from_raw_mode(stat.st_mode) != FileType::Directory {
        // Use `ErrorKind::NotADirectory` when the feature
        // `io_error_more` is stabilized.
        return Err(io::Error::from_raw_os_error(libc::ENOTDIR));
    }

    Ok(())
}

/// Create the directory `path` if it does not exist.
pub(crate) fn prepare_directory(path: &Path) -> io::Result<()> {
    if !path.exists() {
        return std::fs::create_dir_all(path);
    }

    check_directory(path)
}

#[test]
fn reject_regular_files() {
    let file = tempfile::NamedTempFile::new().unwrap();

    let err = check_directory(file.path()).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::ENOTDIR));

    let dir = tempfile::tempdir().unwrap();
    check_directory(dir.path()).unwrap();

    let nested = dir.path().join("a/b");
    prepare_directory(&nested).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn statvfs_reports_space() {
    let dir = tempfile::tempdir().unwrap();
    StatvfsProbe.free_blocks(dir.path()).unwrap();
}
