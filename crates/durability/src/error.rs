//! Error types for log, snapshot and capture I/O

use crashreplay_core::RecordError;
use std::io;
use thiserror::Error;

/// Errors reading or writing capture logs.
#[derive(Debug, Error)]
pub enum LogError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Fewer bytes were available than the record header declared
    #[error("Truncated record: expected {expected} bytes, found {actual}")]
    Truncated {
        /// Bytes the record needed
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Stored checksum does not match the record contents
    #[error("Checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record trailer
        expected: u32,
        /// Checksum computed over header and payload
        computed: u32,
    },

    /// Header decoded but describes an invalid record
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordError),
}

/// Errors saving or loading device snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot length differs from the device size
    #[error("Snapshot size mismatch: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        /// Declared device size
        expected: u64,
        /// Bytes present
        actual: u64,
    },
}

/// Errors draining a capture source.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture source failed while being polled
    #[error("Capture source error: {0}")]
    Source(#[from] io::Error),

    /// An entry's metadata and payload disagree
    #[error("Invalid captured entry at index {index}: {source}")]
    InvalidEntry {
        /// Position of the entry in the capture log
        index: usize,
        /// Invariant violation
        source: RecordError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_error_from_io() {
        let err: LogError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, LogError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_truncated_display() {
        let err = LogError::Truncated {
            expected: 20,
            actual: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 20"));
        assert!(msg.contains("found 3"));
    }

    #[test]
    fn test_snapshot_size_mismatch_display() {
        let err = SnapshotError::SizeMismatch {
            expected: 4096,
            actual: 512,
        };
        assert!(err.to_string().contains("4096"));
    }
}
