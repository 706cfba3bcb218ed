//! Error types for crashreplay-core
//!
//! Records are validated once at construction; every later stage may assume
//! the payload invariant holds.

use thiserror::Error;

/// Result type alias for record construction.
pub type Result<T> = std::result::Result<T, RecordError>;

/// Violations of the `WriteRecord` payload invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Payload length differs from the declared size.
    #[error("Payload length mismatch: declared {declared}, actual {actual}")]
    SizeMismatch {
        /// Size declared in the record header
        declared: u32,
        /// Length of the supplied payload
        actual: usize,
    },

    /// A data-carrying write was supplied without its payload.
    #[error("Missing payload for {size}-byte write")]
    MissingPayload {
        /// Declared size
        size: u32,
    },

    /// A payload was supplied for an operation that carries no data.
    #[error("Unexpected payload on operation with flags {flags:#x}")]
    UnexpectedPayload {
        /// Raw flag bits
        flags: u64,
    },

    /// Payload exceeds the maximum supported size.
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Declared size
        size: u64,
        /// Maximum permitted size
        max: u32,
    },

    /// The operation's byte range does not fit in a 64-bit device address.
    #[error("Unaddressable operation: {size} bytes at sector {sector:#x}")]
    Unaddressable {
        /// Target sector
        sector: u64,
        /// Declared size
        size: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_size_mismatch() {
        let err = RecordError::SizeMismatch {
            declared: 10,
            actual: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains("declared 10"));
        assert!(msg.contains("actual 4"));
    }

    #[test]
    fn test_error_display_unexpected_payload() {
        let err = RecordError::UnexpectedPayload { flags: 0x1000 };
        assert!(err.to_string().contains("0x1000"));
    }
}
