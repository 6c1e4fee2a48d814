//! Access to the device that holds a datastream.

use std::{
    fmt,
    fs::File,
    io::{self, BufRead, Read},
    path::{Path, PathBuf},
    process::Stdio,
};

use rustix::{
    fd::{AsFd, BorrowedFd, OwnedFd},
    fs::{Mode, OFlags},
};

/// An open device (a tape, a disk, or a regular file) with a datastream.
///
/// The archiver reads from a duplicate of the same file descriptor, so the
/// offset is shared: after the archiver consumes a part, the next read
/// continues after it.
pub struct Device {
    path: PathBuf,
    file: File,
}

impl Device {
    /// Open `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let fd = rustix::fs::open(path, OFlags::RDONLY | OFlags::CLOEXEC, Mode::empty())?;
        Ok(Device::from_fd(path, fd))
    }

    /// Build an instance from a file descriptor that is already open,
    /// like one inherited from a parent process.
    pub fn from_fd(path: impl Into<PathBuf>, fd: OwnedFd) -> Self {
        Device {
            path: path.into(),
            file: File::from(fd),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fill `block` with data from the device.
    ///
    /// Return `false` if the device reached its end before the block
    /// was complete.
    pub fn read_block(&mut self, block: &mut [u8]) -> io::Result<bool> {
        let mut filled = 0;
        while filled < block.len() {
            match self.file.read(&mut block[filled..]) {
                Ok(0) => return Ok(false),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => (),
                Err(e) => return Err(e),
            }
        }

        Ok(true)
    }

    /// Read and discard everything until the end of the device.
    pub fn drain(&mut self) -> io::Result<u64> {
        io::copy(&mut self.file, &mut io::sink())
    }

    /// Return a handle to use as the standard input of a child process.
    pub fn stdin(&self) -> io::Result<Stdio> {
        Ok(Stdio::from(self.file.try_clone()?))
    }
}

impl Read for Device {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl AsFd for Device {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device").field("path", &self.path).finish()
    }
}

/// Request to the operator to insert a volume.
#[derive(Clone, Copy, Debug)]
pub struct VolumeRequest<'a> {
    /// Volume to insert, starting at `1`.
    pub volume: u32,

    /// Number of volumes declared in the table of contents.
    pub volume_count: u32,

    /// Device where the volume is expected.
    pub device: &'a Path,

    /// Name of the device to show to the operator, if any.
    pub alias: Option<&'a str>,
}

impl fmt::Display for VolumeRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Insert volume {} of {} into ", self.volume, self.volume_count)?;

        match self.alias {
            Some(alias) => f.write_str(alias),
            None => write!(f, "{}", self.device.display()),
        }
    }
}

/// Source of devices.
///
/// The default methods open the path directly and don't wait for a
/// volume change. Implementations can override them to talk to the
/// operator, or to replace the media in tests.
pub trait Medium {
    /// Open `path` for reading.
    fn open(&mut self, path: &Path) -> io::Result<Device> {
        Device::open(path)
    }

    /// Block until the volume described in `request` is available.
    ///
    /// The device is closed while this method runs.
    #[expect(unused_variables)]
    fn await_volume(&mut self, request: &VolumeRequest<'_>) -> io::Result<()> {
        Ok(())
    }
}

/// [`Medium`] for devices in the local system.
///
/// If it is interactive, the operator is asked to insert the new volume,
/// and to press enter when it is ready.
#[derive(Default)]
pub struct SystemMedium {
    interactive: bool,
}

impl SystemMedium {
    pub fn interactive() -> Self {
        SystemMedium { interactive: true }
    }
}

impl Medium for SystemMedium {
    fn await_volume(&mut self, request: &VolumeRequest<'_>) -> io::Result<()> {
        if !self.interactive {
            return Ok(());
        }

        eprintln!("{request}, and press ENTER when ready.");

        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "No response from the operator.",
            ));
        }

        Ok(())
    }
}

#[test]
fn prompt_with_alias() {
    let mut request = VolumeRequest {
        volume: 2,
        volume_count: 3,
        device: Path::new("/dev/rmt/0n"),
        alias: None,
    };

    assert_eq!(request.to_string(), "Insert volume 2 of 3 into /dev/rmt/0n");

    request.alias = Some("tape1");
    assert_eq!(request.to_string(), "Insert volume 2 of 3 into tape1");
}

#[test]
fn read_blocks_until_end() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&[7; 700]).unwrap();

    let mut device = Device::open(file.path()).unwrap();
    let mut block = [0; 512];

    assert!(device.read_block(&mut block).unwrap());
    assert_eq!(block, [7; 512]);

    // Only 188 bytes left.
    assert!(!device.read_block(&mut block).unwrap());
    assert_eq!(device.drain().unwrap(), 0);
}
