//! Core types for crashreplay
//!
//! This crate defines the foundational types used throughout the system:
//! - WriteRecord: one captured block-layer operation with its owned payload
//! - OpFlags: request flag bitmask (write, sync, FUA, flush, discard, ...)
//! - Limits: sector size and payload bounds shared by codec and replay
//! - Error: record invariant violations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod flags;
pub mod limits;
pub mod record;

pub use error::{RecordError, Result};
pub use flags::OpFlags;
pub use limits::{byte_range, sector_offset, MAX_PAYLOAD_BYTES, SECTOR_SIZE};
pub use record::WriteRecord;
