//! Captured write record
//!
//! A `WriteRecord` is the atomic unit of a capture log: one block-layer
//! operation with its flags, target sector, byte length, and an owned copy of
//! the bytes it wrote.
//!
//! # Payload invariant
//!
//! `payload` is present iff the operation is a data-carrying write
//! (`flags.carries_payload(size)`), and then `payload.len() == size`.
//! The byte range `sector * 512 .. + size` always fits in a `u64`.
//! Records are validated on construction and never mutated afterwards;
//! cloning deep-copies the payload.

use crate::error::{RecordError, Result};
use crate::flags::OpFlags;
use crate::limits::{byte_range, MAX_PAYLOAD_BYTES, SECTOR_SIZE};
use std::fmt;

/// One captured block operation.
///
/// Equality is defined over `(flags, sector, size, payload bytes)`; two
/// records with different payload presence are never equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct WriteRecord {
    flags: OpFlags,
    sector: u64,
    size: u32,
    payload: Option<Vec<u8>>,
}

impl WriteRecord {
    /// Create a record, validating the payload invariant.
    pub fn new(flags: OpFlags, sector: u64, size: u32, payload: Option<Vec<u8>>) -> Result<Self> {
        if size > MAX_PAYLOAD_BYTES {
            return Err(RecordError::PayloadTooLarge {
                size: size as u64,
                max: MAX_PAYLOAD_BYTES,
            });
        }
        if byte_range(sector, size).is_none() {
            return Err(RecordError::Unaddressable { sector, size });
        }

        match (flags.carries_payload(size), payload) {
            (true, Some(bytes)) => {
                if bytes.len() != size as usize {
                    return Err(RecordError::SizeMismatch {
                        declared: size,
                        actual: bytes.len(),
                    });
                }
                Ok(WriteRecord {
                    flags,
                    sector,
                    size,
                    payload: Some(bytes),
                })
            }
            (true, None) => Err(RecordError::MissingPayload { size }),
            (false, Some(_)) => Err(RecordError::UnexpectedPayload { flags: flags.bits() }),
            (false, None) => Ok(WriteRecord {
                flags,
                sector,
                size,
                payload: None,
            }),
        }
    }

    /// Create a data write at `sector`. The write flag is always set.
    ///
    /// # Panics
    ///
    /// Panics if `flags` contains `DISCARD` (build discards with
    /// [`WriteRecord::new`]), if the payload exceeds [`MAX_PAYLOAD_BYTES`], or
    /// if the write would end past the last addressable byte. Use
    /// [`WriteRecord::new`] for untrusted input.
    pub fn write(flags: OpFlags, sector: u64, payload: Vec<u8>) -> Self {
        assert!(!flags.is_discard(), "discards carry no payload");
        assert!(
            payload.len() <= MAX_PAYLOAD_BYTES as usize,
            "payload of {} bytes exceeds {}",
            payload.len(),
            MAX_PAYLOAD_BYTES
        );

        let flags = flags | OpFlags::WRITE;
        let size = payload.len() as u32;
        assert!(
            byte_range(sector, size).is_some(),
            "write at sector {:#x} is not addressable",
            sector
        );
        let payload = if size > 0 { Some(payload) } else { None };
        WriteRecord {
            flags,
            sector,
            size,
            payload,
        }
    }

    /// Create a zero-length operation (flush, barrier, checkpoint marker).
    pub fn marker(flags: OpFlags) -> Self {
        WriteRecord {
            flags,
            sector: 0,
            size: 0,
            payload: None,
        }
    }

    /// Request flags.
    pub fn flags(&self) -> OpFlags {
        self.flags
    }

    /// Target sector in 512-byte units.
    pub fn sector(&self) -> u64 {
        self.sector
    }

    /// Declared byte length.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Payload bytes, if this is a data-carrying write.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Byte offset of the first byte this operation touches.
    pub fn byte_offset(&self) -> u64 {
        // Range checked at construction
        self.sector * SECTOR_SIZE
    }

    /// One past the last byte this operation touches.
    pub fn byte_end(&self) -> u64 {
        self.byte_offset() + self.size as u64
    }

    /// Whether replaying this record changes device contents.
    ///
    /// Discards, checkpoint markers and zero-length operations are kept in the
    /// log but never written back.
    pub fn is_replayable(&self) -> bool {
        self.flags.is_write()
            && !self.flags.is_discard()
            && !self.flags.is_checkpoint()
            && self.payload.is_some()
    }

    /// Whether this record and `other` write intersecting byte ranges.
    pub fn overlaps(&self, other: &WriteRecord) -> bool {
        if self.size == 0 || other.size == 0 {
            return false;
        }
        self.byte_offset() < other.byte_end() && other.byte_offset() < self.byte_end()
    }
}

impl fmt::Debug for WriteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteRecord")
            .field("flags", &format_args!("{}", self.flags))
            .field("sector", &self.sector)
            .field("size", &self.size)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

impl fmt::Display for WriteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sector {:#x} size {:#x} flags {:#x}: {}",
            self.sector,
            self.size,
            self.flags.bits(),
            self.flags
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_sets_flag_and_size() {
        let record = WriteRecord::write(OpFlags::META, 8, vec![7u8; 10]);
        assert!(record.flags().is_write());
        assert_eq!(record.size(), 10);
        assert_eq!(record.payload(), Some(&[7u8; 10][..]));
        assert_eq!(record.byte_offset(), 4096);
    }

    #[test]
    fn test_empty_write_has_no_payload() {
        let record = WriteRecord::write(OpFlags::SYNC, 0, Vec::new());
        assert_eq!(record.size(), 0);
        assert!(record.payload().is_none());
        assert!(!record.is_replayable());
    }

    #[test]
    fn test_new_rejects_size_mismatch() {
        let result = WriteRecord::new(OpFlags::WRITE, 0, 10, Some(vec![0u8; 4]));
        assert_eq!(
            result,
            Err(RecordError::SizeMismatch {
                declared: 10,
                actual: 4
            })
        );
    }

    #[test]
    fn test_new_rejects_missing_payload() {
        let result = WriteRecord::new(OpFlags::WRITE, 0, 10, None);
        assert!(matches!(result, Err(RecordError::MissingPayload { size: 10 })));
    }

    #[test]
    fn test_new_discard_has_size_without_payload() {
        let record = WriteRecord::new(OpFlags::WRITE | OpFlags::DISCARD, 16, 4096, None).unwrap();
        assert_eq!(record.size(), 4096);
        assert!(record.payload().is_none());
        assert!(!record.is_replayable());

        let result = WriteRecord::new(OpFlags::DISCARD, 16, 4, Some(vec![0; 4]));
        assert!(matches!(result, Err(RecordError::UnexpectedPayload { .. })));
    }

    #[test]
    fn test_new_rejects_unaddressable_sector() {
        let result = WriteRecord::new(OpFlags::WRITE, u64::MAX / 256, 4, Some(vec![0; 4]));
        assert_eq!(
            result,
            Err(RecordError::Unaddressable {
                sector: u64::MAX / 256,
                size: 4
            })
        );

        // The last sector is fine until the size pushes past the end
        let last = u64::MAX / SECTOR_SIZE;
        assert!(WriteRecord::new(OpFlags::FLUSH, last, 0, None).is_ok());
        let result = WriteRecord::new(OpFlags::WRITE | OpFlags::DISCARD, last, 4096, None);
        assert!(matches!(result, Err(RecordError::Unaddressable { .. })));
    }

    #[test]
    #[should_panic(expected = "not addressable")]
    fn test_write_panics_on_unaddressable_sector() {
        let _ = WriteRecord::write(OpFlags::empty(), u64::MAX, vec![1; 8]);
    }

    #[test]
    #[should_panic(expected = "discards carry no payload")]
    fn test_write_panics_on_discard() {
        let _ = WriteRecord::write(OpFlags::DISCARD, 0, vec![1; 8]);
    }

    #[test]
    fn test_new_rejects_oversized_payload() {
        let result = WriteRecord::new(OpFlags::DISCARD, 0, MAX_PAYLOAD_BYTES + 1, None);
        assert!(matches!(result, Err(RecordError::PayloadTooLarge { .. })));
    }

    #[test]
    fn test_equality_covers_payload_bytes() {
        let a = WriteRecord::write(OpFlags::empty(), 1, vec![1, 2, 3]);
        let b = WriteRecord::write(OpFlags::empty(), 1, vec![1, 2, 3]);
        let c = WriteRecord::write(OpFlags::empty(), 1, vec![1, 2, 4]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_clone_is_deep() {
        let a = WriteRecord::write(OpFlags::empty(), 1, vec![9; 64]);
        let b = a.clone();
        assert_ne!(a.payload().unwrap().as_ptr(), b.payload().unwrap().as_ptr());
        assert_eq!(a, b);
    }

    #[test]
    fn test_overlaps() {
        let a = WriteRecord::write(OpFlags::empty(), 0, vec![0; 1024]);
        let b = WriteRecord::write(OpFlags::empty(), 1, vec![0; 512]);
        let c = WriteRecord::write(OpFlags::empty(), 2, vec![0; 512]);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(!a.overlaps(&WriteRecord::marker(OpFlags::FLUSH)));
    }

    proptest::proptest! {
        #[test]
        fn prop_overlap_is_symmetric(
            a_sector in 0u64..64,
            a_len in 0usize..4096,
            b_sector in 0u64..64,
            b_len in 0usize..4096,
        ) {
            let a = WriteRecord::write(OpFlags::empty(), a_sector, vec![0; a_len]);
            let b = WriteRecord::write(OpFlags::empty(), b_sector, vec![0; b_len]);
            proptest::prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
        }

        #[test]
        fn prop_new_accepts_only_matching_payloads(size in 1u32..2048, actual in 1usize..2048) {
            let result = WriteRecord::new(OpFlags::WRITE, 0, size, Some(vec![0; actual]));
            proptest::prop_assert_eq!(result.is_ok(), size as usize == actual);
        }
    }

    #[test]
    fn test_checkpoint_marker_not_replayable() {
        let marker = WriteRecord::marker(OpFlags::CHECKPOINT);
        assert!(marker.flags().is_checkpoint());
        assert!(!marker.is_replayable());
    }
}
