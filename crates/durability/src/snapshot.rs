//! Pristine device snapshots
//!
//! A snapshot is the raw device image taken before logging began. The file
//! holds exactly the device's bytes with no header, so its length must equal
//! the device size.
//!
//! # Crash Safety
//!
//! Saving follows the write-fsync-rename pattern:
//! 1. Write to a temporary file next to the target
//! 2. fsync the temporary file
//! 3. Atomic rename to the final path
//! 4. fsync the parent directory
//!
//! A reader therefore sees either the complete previous snapshot or the
//! complete new one.

use crate::error::SnapshotError;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Persist `bytes` as the snapshot at `path`.
pub fn save_snapshot(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let temp_path = temp_path_for(path);

    let result = write_temp(&temp_path, bytes).and_then(|()| {
        fs::rename(&temp_path, path)?;
        sync_parent(path)
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result?;

    info!(
        target: "crashreplay::log",
        path = %path.display(),
        bytes = bytes.len(),
        "Device snapshot saved"
    );
    Ok(())
}

/// Load the snapshot at `path`, which must be exactly `device_size` bytes.
pub fn load_snapshot(path: impl AsRef<Path>, device_size: u64) -> Result<Vec<u8>, SnapshotError> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let actual = file.metadata()?.len();
    if actual != device_size {
        return Err(SnapshotError::SizeMismatch {
            expected: device_size,
            actual,
        });
    }

    let mut bytes = Vec::with_capacity(device_size as usize);
    file.read_to_end(&mut bytes)?;
    // The file may have changed between the length check and the read.
    if bytes.len() as u64 != device_size {
        return Err(SnapshotError::SizeMismatch {
            expected: device_size,
            actual: bytes.len() as u64,
        });
    }
    Ok(bytes)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

fn write_temp(temp_path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn sync_parent(path: &Path) -> Result<(), SnapshotError> {
    #[cfg(unix)]
    {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        File::open(parent)?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("disk.snap");
        let image: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

        save_snapshot(&path, &image).unwrap();
        let loaded = load_snapshot(&path, 4096).unwrap();
        assert_eq!(loaded, image);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("disk.snap");
        save_snapshot(&path, &[0u8; 512]).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_overwrite_replaces_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("disk.snap");
        save_snapshot(&path, &[1u8; 1024]).unwrap();
        save_snapshot(&path, &[2u8; 1024]).unwrap();

        assert_eq!(load_snapshot(&path, 1024).unwrap(), vec![2u8; 1024]);
    }

    #[test]
    fn test_short_file_is_size_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("disk.snap");
        save_snapshot(&path, &[0u8; 512]).unwrap();

        let result = load_snapshot(&path, 1024);
        assert!(matches!(
            result,
            Err(SnapshotError::SizeMismatch {
                expected: 1024,
                actual: 512
            })
        ));
    }

    #[test]
    fn test_long_file_is_size_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("disk.snap");
        save_snapshot(&path, &[0u8; 2048]).unwrap();

        assert!(matches!(
            load_snapshot(&path, 1024),
            Err(SnapshotError::SizeMismatch { .. })
        ));
    }
}
