//! Error types for crash-state generation and replay

use crashreplay_durability::{CaptureError, LogError, SnapshotError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A candidate ordering handed to the permuter does not belong to its model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermuteError {
    /// Candidate has a different number of records than the captured log
    #[error("Candidate length mismatch: expected {expected} records, got {actual}")]
    LengthMismatch {
        /// Captured log length
        expected: usize,
        /// Candidate length
        actual: usize,
    },

    /// A record is not an operation of the epoch its position belongs to
    #[error("Candidate record at position {index} does not belong to its epoch")]
    ForeignRecord {
        /// Position in the candidate
        index: usize,
    },

    /// An async operation sits before the sync operation it depends on
    #[error("Candidate record at position {index} precedes its nearest sync operation")]
    IllegalPlacement {
        /// Position in the candidate
        index: usize,
    },
}

/// Fatal errors that abort a replay run.
///
/// Findings about the file system under test are never errors; they are
/// recorded as outcomes.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Restoring the pristine snapshot failed; every later test would be invalid
    #[error("Failed to restore device snapshot: {0}")]
    SnapshotRestore(#[source] io::Error),

    /// The device size could not be determined
    #[error("Failed to determine size of device {}: {source}", path.display())]
    DeviceSize {
        /// Device path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// The device could not be opened
    #[error("Failed to open device {}: {source}", path.display())]
    DeviceOpen {
        /// Device path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// The file system stayed mounted after a test
    #[error("Failed to unmount {}: {source}", mount_point.display())]
    Unmount {
        /// Mount point
        mount_point: PathBuf,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// The capture log could not be loaded
    #[error("Failed to load capture log: {0}")]
    Log(#[from] LogError),

    /// The snapshot file could not be loaded
    #[error("Failed to load snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    /// The permuter rejected a candidate
    #[error("Permutation failed: {0}")]
    Permute(#[from] PermuteError),

    /// The workload could not be prepared
    #[error("Workload error: {0}")]
    Workload(#[from] WorkloadError),
}

/// Errors that abort a recording.
///
/// Cleanup after a failed step is best effort; the first failure is the one
/// reported.
#[derive(Debug, Error)]
pub enum RecordingError {
    /// A child process could not be started
    #[error("Failed to start {step} command '{program}': {source}")]
    Spawn {
        /// Recording step
        step: &'static str,
        /// Program name
        program: String,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// A child process exited unsuccessfully
    #[error("{step} command exited with status {code}")]
    CommandFailed {
        /// Recording step
        step: &'static str,
        /// Exit code, -1 when killed by a signal
        code: i32,
    },

    /// The file system could not be mounted
    #[error("Failed to mount {} at {}: {source}", device.display(), mount_point.display())]
    Mount {
        /// Device being mounted
        device: PathBuf,
        /// Mount point
        mount_point: PathBuf,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// The file system could not be unmounted
    #[error("Failed to unmount {}: {source}", mount_point.display())]
    Unmount {
        /// Mount point
        mount_point: PathBuf,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// The device could not be read for the snapshot
    #[error("Failed to read device for snapshot: {0}")]
    DeviceRead(#[source] io::Error),

    /// Logging could not be switched on, off or cleared
    #[error("Failed to control capture: {0}")]
    CaptureControl(#[source] io::Error),

    /// The captured entries could not be drained
    #[error("Failed to drain capture: {0}")]
    Capture(#[from] CaptureError),

    /// The log file could not be written
    #[error("Failed to save capture log: {0}")]
    Log(#[from] LogError),

    /// The snapshot file could not be written
    #[error("Failed to save snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Errors loading or validating a replay configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read or written
    #[error("Failed to access config file {}: {source}", path.display())]
    Io {
        /// Config file path
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        /// Config file path
        path: PathBuf,
        /// Parser diagnostic
        #[source]
        source: toml::de::Error,
    },

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A field holds an unusable value
    #[error("Invalid config value for '{field}': {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors raised by workload plug-ins.
#[derive(Debug, Error)]
pub enum WorkloadError {
    /// No workload is registered under this name
    #[error("Unknown workload '{name}'")]
    Unknown {
        /// Requested name
        name: String,
    },

    /// The workload touched the file system and it failed
    #[error("Workload I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file system under the workload has shut itself down
    #[error("File system at {} has shut down", mount_point.display())]
    ShutDown {
        /// Where the file system is mounted
        mount_point: PathBuf,
    },

    /// The workload could not run for another reason
    #[error("Workload failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permute_error_display() {
        let err = PermuteError::LengthMismatch {
            expected: 6,
            actual: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 6"));
        assert!(msg.contains("got 5"));
    }

    #[test]
    fn test_replay_error_from_permute() {
        let err: ReplayError = PermuteError::ForeignRecord { index: 3 }.into();
        assert!(matches!(err, ReplayError::Permute(_)));
        assert!(err.to_string().contains("position 3"));
    }

    #[test]
    fn test_config_invalid_display() {
        let err = ConfigError::invalid("sector_size", "must be 512");
        let msg = err.to_string();
        assert!(msg.contains("sector_size"));
        assert!(msg.contains("must be 512"));
    }

    #[test]
    fn test_recording_command_failed_display() {
        let err = RecordingError::CommandFailed {
            step: "setup",
            code: 3,
        };
        assert_eq!(err.to_string(), "setup command exited with status 3");
    }

    #[test]
    fn test_recording_error_from_capture() {
        let err: RecordingError =
            CaptureError::Source(io::Error::new(io::ErrorKind::Other, "gone")).into();
        assert!(matches!(err, RecordingError::Capture(_)));
    }

    #[test]
    fn test_unknown_workload_display() {
        let err = WorkloadError::Unknown {
            name: "nope".to_string(),
        };
        assert!(err.to_string().contains("'nope'"));
    }
}
