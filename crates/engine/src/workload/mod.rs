//! Workload plug-ins
//!
//! A workload is the program whose writes are captured. After each crash
//! state is replayed and mounted, its `check_test` inspects what survived.
//! Workloads are selected by name through a [`WorkloadRegistry`].

mod echo;
mod registry;

pub use echo::EchoFileWorkload;
pub use registry::{WorkloadFactory, WorkloadRegistry};

use crate::error::WorkloadError;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// A workload under test.
pub trait Workload {
    /// Registry name.
    fn name(&self) -> &str;

    /// Tell the workload where the file system is mounted and how large the
    /// device is. Called once before any other method.
    fn init(&mut self, mount_dir: &Path, device_size: u64);

    /// Prepare state that must exist before capture starts.
    fn setup(&mut self) -> Result<(), WorkloadError>;

    /// Run the captured part of the workload.
    ///
    /// `checkpoint` is the checkpoint after which to stop; 0 runs to
    /// completion.
    fn run(&mut self, checkpoint: i32) -> Result<(), WorkloadError>;

    /// Inspect the mounted crash state. `last_checkpoint` is the number of
    /// checkpoints the replayed writes reached.
    ///
    /// Returns a negative value when data is corrupt, and records details in
    /// `result`. A positive value means the check itself could not complete.
    fn check_test(&mut self, last_checkpoint: u32, result: &mut DataTestResult) -> i32;
}

/// Data-level problems a workload check can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct DataErrors(pub u32);

impl DataErrors {
    /// An old version of a file survived an update that was made durable
    pub const OLD_FILE_PERSISTED: DataErrors = DataErrors(1 << 0);
    /// A durable file is gone
    pub const FILE_MISSING: DataErrors = DataErrors(1 << 1);
    /// File contents differ from what was made durable
    pub const FILE_DATA_CORRUPTED: DataErrors = DataErrors(1 << 2);
    /// File metadata differs from what was made durable
    pub const FILE_METADATA_CORRUPTED: DataErrors = DataErrors(1 << 3);
    /// Allocated block count is wrong
    pub const INCORRECT_BLOCK_COUNT: DataErrors = DataErrors(1 << 4);
    /// Any other inconsistency
    pub const OTHER: DataErrors = DataErrors(1 << 5);

    const NAMES: [(DataErrors, &'static str); 6] = [
        (Self::OLD_FILE_PERSISTED, "old file persisted"),
        (Self::FILE_MISSING, "file missing"),
        (Self::FILE_DATA_CORRUPTED, "file data corrupted"),
        (Self::FILE_METADATA_CORRUPTED, "file metadata corrupted"),
        (Self::INCORRECT_BLOCK_COUNT, "incorrect block count"),
        (Self::OTHER, "other"),
    ];

    /// No errors.
    pub const fn empty() -> Self {
        DataErrors(0)
    }

    /// Whether no error bit is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit in `other` is set.
    pub const fn contains(self, other: DataErrors) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for DataErrors {
    type Output = DataErrors;

    fn bitor(self, rhs: DataErrors) -> DataErrors {
        DataErrors(self.0 | rhs.0)
    }
}

impl fmt::Display for DataErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("clean");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(", "))
    }
}

/// Outcome of one workload check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataTestResult {
    /// Error bits set by the check
    pub errors: DataErrors,
    /// Human-readable detail
    pub description: String,
}

impl DataTestResult {
    /// Record an error and describe it.
    pub fn set_error(&mut self, error: DataErrors, description: impl Into<String>) {
        self.errors = self.errors | error;
        let description = description.into();
        if self.description.is_empty() {
            self.description = description;
        } else {
            self.description.push_str("; ");
            self.description.push_str(&description);
        }
    }

    /// Whether the check found nothing wrong.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for DataTestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.description.is_empty() {
            write!(f, "{}", self.errors)
        } else {
            write!(f, "{}: {}", self.errors, self.description)
        }
    }
}

const EIO: i32 = 5;

/// Whether the file system holding `dir` has shut itself down.
///
/// A forced shutdown makes every access fail with an I/O error, so a `stat`
/// on the directory is enough to tell. Long-running workload generators poll
/// this to stop early.
pub fn device_shut_down(dir: &Path) -> bool {
    match fs::metadata(dir) {
        Ok(_) => false,
        Err(e) => is_io_error(&e),
    }
}

fn is_io_error(e: &io::Error) -> bool {
    e.raw_os_error() == Some(EIO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_data_result_accumulates() {
        let mut result = DataTestResult::default();
        assert!(result.is_clean());
        assert_eq!(result.to_string(), "clean");

        result.set_error(DataErrors::FILE_MISSING, "foo missing");
        result.set_error(DataErrors::FILE_DATA_CORRUPTED, "bar differs");

        assert!(!result.is_clean());
        assert!(result.errors.contains(DataErrors::FILE_MISSING));
        assert_eq!(
            result.to_string(),
            "file missing, file data corrupted: foo missing; bar differs"
        );
    }

    #[test]
    fn test_every_error_bit_is_named() {
        let all = DataErrors::NAMES
            .iter()
            .fold(DataErrors::empty(), |acc, (flag, _)| acc | *flag);
        assert_eq!(all, DataErrors((1 << 6) - 1));
        assert_eq!(all.to_string().split(", ").count(), DataErrors::NAMES.len());
    }

    #[test]
    fn test_healthy_dir_is_not_shut_down() {
        let dir = tempdir().unwrap();
        assert!(!device_shut_down(dir.path()));
    }

    #[test]
    fn test_missing_dir_is_not_shut_down() {
        let dir = tempdir().unwrap();
        assert!(!device_shut_down(&dir.path().join("gone")));
    }

    #[test]
    fn test_eio_detection() {
        assert!(is_io_error(&io::Error::from_raw_os_error(EIO)));
        assert!(!is_io_error(&io::Error::from_raw_os_error(2)));
    }
}
