//! Addressing constants and size limits
//!
//! Captured sector numbers are always expressed in 512-byte units, whatever the
//! logical block size of the device under test. Payload sizes are bounded so a
//! corrupted length field cannot trigger an unbounded allocation while decoding.

/// Size of one addressing sector in bytes.
pub const SECTOR_SIZE: u64 = 512;

/// Largest payload a single captured operation may carry (64MB).
pub const MAX_PAYLOAD_BYTES: u32 = 64 * 1024 * 1024;

/// Byte offset on the device of `sector`, or `None` past the end of a
/// 64-bit byte address space.
pub const fn sector_offset(sector: u64) -> Option<u64> {
    sector.checked_mul(SECTOR_SIZE)
}

/// Byte range `[start, end)` covered by `size` bytes written at `sector`.
pub fn byte_range(sector: u64, size: u32) -> Option<(u64, u64)> {
    let start = sector_offset(sector)?;
    let end = start.checked_add(size as u64)?;
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sector_offset() {
        assert_eq!(sector_offset(0), Some(0));
        assert_eq!(sector_offset(8), Some(4096));
        assert_eq!(sector_offset(u64::MAX / 256), None);
    }

    #[test]
    fn test_byte_range_rejects_wrapping_end() {
        assert_eq!(byte_range(1, 512), Some((512, 1024)));
        let last = u64::MAX / SECTOR_SIZE;
        assert!(byte_range(last, 0).is_some());
        assert_eq!(byte_range(last, 4096), None);
    }
}
