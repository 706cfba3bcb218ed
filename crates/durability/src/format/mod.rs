//! On-disk byte format for capture logs.
//!
//! Keeping serialization separate from operational logic (how logs are
//! written, read and replayed) makes format evolution easier to manage.
//!
//! # Module Structure
//!
//! - `record`: self-delimiting `WriteRecord` encoding

pub mod record;

pub use record::{
    deserialize, encoded_len, read_record, serialize, RECORD_HEADER_SIZE, RECORD_TRAILER_SIZE,
};
