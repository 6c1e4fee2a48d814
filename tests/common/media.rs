use std::{
    cell::{Cell, RefCell},
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use pkg_datastream::{Device, Medium, VolumeRequest, BLOCK_SIZE, HEADER_PREFIX, HEADER_SUFFIX};
use tempfile::TempDir;

/// Builder for the volumes of a datastream.
///
/// The first volume starts with the header and the metadata archive.
pub struct DataStream {
    volumes: Vec<Vec<u8>>,
}

impl DataStream {
    /// Create a datastream with `lines` in its table of contents.
    pub fn new(lines: &[&str]) -> DataStream {
        let mut header = format!("{HEADER_PREFIX}\n");
        for line in lines {
            header.push_str(line);
            header.push('\n');
        }

        header.push_str(HEADER_SUFFIX);
        header.push('\n');

        let mut first = Vec::new();
        push_padded(&mut first, header.as_bytes());
        push_padded(&mut first, b"META");

        DataStream {
            volumes: vec![first],
        }
    }

    /// Add a part of `package` at the end of `volume` (starting at 1).
    pub fn part(mut self, volume: usize, package: &str, index: u32) -> Self {
        if self.volumes.len() < volume {
            self.volumes.resize(volume, Vec::new());
        }

        let text = format!("PART {package} {index}");
        push_padded(&mut self.volumes[volume - 1], text.as_bytes());
        self
    }

    /// Add an empty `volume`.
    pub fn empty_volume(mut self, volume: usize) -> Self {
        if self.volumes.len() < volume {
            self.volumes.resize(volume, Vec::new());
        }

        self
    }

    /// Write every volume to a file.
    pub fn write(self) -> Volumes {
        let dir = tempfile::tempdir().unwrap();

        let paths = self
            .volumes
            .iter()
            .enumerate()
            .map(|(n, data)| {
                let path = dir.path().join(format!("volume{}", n + 1));
                fs::File::create(&path).unwrap().write_all(data).unwrap();
                path
            })
            .collect();

        Volumes { dir, paths }
    }
}

fn push_padded(volume: &mut Vec<u8>, data: &[u8]) {
    let blocks = data.len().div_ceil(BLOCK_SIZE).max(1);
    let start = volume.len();
    volume.extend_from_slice(data);
    volume.resize(start + blocks * BLOCK_SIZE, 0);
}

pub struct Volumes {
    pub dir: TempDir,
    pub paths: Vec<PathBuf>,
}

impl Volumes {
    /// Path given to the session to open the device.
    pub fn device(&self) -> PathBuf {
        self.dir.path().join("device")
    }

    pub fn medium(&self) -> VolumeSet {
        VolumeSet {
            device: self.device(),
            paths: self.paths.clone(),
            current: Rc::new(Cell::new(1)),
            prompts: Rc::default(),
        }
    }
}

/// [`Medium`] where the device is the file of the current volume.
///
/// The current volume changes when the session requests it.
#[derive(Clone)]
pub struct VolumeSet {
    device: PathBuf,
    paths: Vec<PathBuf>,
    current: Rc<Cell<usize>>,
    pub prompts: Rc<RefCell<Vec<u32>>>,
}

impl VolumeSet {
    pub fn prompts(&self) -> Vec<u32> {
        self.prompts.borrow().clone()
    }
}

impl Medium for VolumeSet {
    fn open(&mut self, path: &Path) -> io::Result<Device> {
        if path != self.device {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }

        let volume = self
            .paths
            .get(self.current.get() - 1)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;

        let file = fs::File::open(volume)?;
        Ok(Device::from_fd(path, file.into()))
    }

    fn await_volume(&mut self, request: &VolumeRequest<'_>) -> io::Result<()> {
        self.prompts.borrow_mut().push(request.volume);
        self.current.set(request.volume as usize);
        Ok(())
    }
}
