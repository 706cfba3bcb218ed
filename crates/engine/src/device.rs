//! Raw access to the device under test
//!
//! Replay writes straight to the block device (or an image file standing in
//! for one), bypassing any file system. The device is exclusively owned by
//! the replay engine and is fully reset from the snapshot before every test.
//! Recording reads it back whole to take that snapshot.

use crashreplay_core::SECTOR_SIZE;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A byte-addressable device image.
pub trait BlockDevice {
    /// Overwrite the whole device with `image`.
    fn restore(&mut self, image: &[u8]) -> io::Result<()>;

    /// Write `bytes` starting at byte `offset`.
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()>;

    /// Make previous writes durable.
    fn sync(&mut self) -> io::Result<()>;

    /// Read back the whole device, as taken for the snapshot.
    fn read_all(&mut self) -> io::Result<Vec<u8>>;

    /// Device size in bytes.
    fn len(&self) -> u64;

    /// Whether the device has zero capacity.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A device or image file opened for raw writes.
pub struct FileDevice {
    path: PathBuf,
    file: File,
    len: u64,
}

impl FileDevice {
    /// Open `path` read-write and discover its size.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = device_size(&path)?;
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(FileDevice { path, file, len })
    }

    /// Path the device was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_bounds(&self, offset: u64, len: usize) -> io::Result<()> {
        match offset.checked_add(len as u64) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "write of {} bytes at offset {} exceeds device size {}",
                    len, offset, self.len
                ),
            )),
        }
    }
}

impl BlockDevice for FileDevice {
    fn restore(&mut self, image: &[u8]) -> io::Result<()> {
        if image.len() as u64 != self.len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "snapshot is {} bytes, device is {} bytes",
                    image.len(),
                    self.len
                ),
            ));
        }
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(image)?;
        self.file.sync_all()
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        self.check_bounds(offset, bytes.len())?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let len = usize::try_from(self.len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "device too large to snapshot")
        })?;
        let mut image = vec![0; len];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut image)?;
        Ok(image)
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// In-memory device, for tests and dry runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemDevice {
    bytes: Vec<u8>,
}

impl MemDevice {
    /// Zero-filled device of `len` bytes.
    pub fn new(len: usize) -> Self {
        MemDevice {
            bytes: vec![0; len],
        }
    }

    /// Current contents.
    pub fn contents(&self) -> &[u8] {
        &self.bytes
    }
}

impl BlockDevice for MemDevice {
    fn restore(&mut self, image: &[u8]) -> io::Result<()> {
        if image.len() != self.bytes.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "snapshot size differs from device size",
            ));
        }
        self.bytes.copy_from_slice(image);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;
        let end = start
            .checked_add(bytes.len())
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "write past end of device")
            })?;
        self.bytes[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }

    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Size in bytes of the device or image at `path`.
///
/// Regular files report their length. Block devices report the sector count
/// from `/sys/block/<name>/size`, in 512-byte units.
pub fn device_size(path: impl AsRef<Path>) -> io::Result<u64> {
    let path = path.as_ref();
    let metadata = fs::metadata(path)?;
    if metadata.is_file() {
        return Ok(metadata.len());
    }

    let name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no device name", path.display()),
        )
    })?;
    let sysfs = Path::new("/sys/block").join(name).join("size");
    let sectors: u64 = fs::read_to_string(&sysfs)?
        .trim()
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{}: {}", sysfs.display(), e)))?;
    Ok(sectors * SECTOR_SIZE)
}
