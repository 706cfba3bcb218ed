//! Persistence layer for crashreplay
//!
//! This crate handles everything that touches disk outside the device under test:
//!
//! - Record codec: self-delimiting, checksummed big-endian encoding of `WriteRecord`
//! - Log files: append-only capture logs (`LogWriter`, `LogReader`)
//! - Snapshots: the pristine device image replay starts from
//! - Capture drain: pulling a log out of an external capture source

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capture;
pub mod error;
pub mod format;
pub mod log;
pub mod snapshot;

pub use capture::{drain_log, CaptureSource, EntryMeta, NextEntry, VecCaptureSource};
pub use error::{CaptureError, LogError, SnapshotError};
pub use format::{
    deserialize, encoded_len, read_record, serialize, RECORD_HEADER_SIZE, RECORD_TRAILER_SIZE,
};
pub use log::{load_log, save_log, LogReader, LogWriter};
pub use snapshot::{load_snapshot, save_snapshot};
