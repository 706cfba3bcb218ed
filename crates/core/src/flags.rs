//! Request flags for captured block operations
//!
//! Bit positions follow the kernel block-request flag layout, so a flag word
//! captured from the block layer can be stored without translation. One bit
//! outside the kernel range is reserved for harness checkpoint markers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bitmask describing a single captured block operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpFlags(pub u64);

impl OpFlags {
    /// Operation writes to the device (unset means read).
    pub const WRITE: OpFlags = OpFlags(1 << 0);
    /// Synchronous request.
    pub const SYNC: OpFlags = OpFlags(1 << 4);
    /// Metadata I/O.
    pub const META: OpFlags = OpFlags(1 << 5);
    /// Boosted priority.
    pub const PRIO: OpFlags = OpFlags(1 << 6);
    /// Discard of a sector range; carries no data.
    pub const DISCARD: OpFlags = OpFlags(1 << 7);
    /// Forced unit access.
    pub const FUA: OpFlags = OpFlags(1 << 11);
    /// Cache flush.
    pub const FLUSH: OpFlags = OpFlags(1 << 12);
    /// May not be passed by the I/O scheduler.
    pub const SOFT_BARRIER: OpFlags = OpFlags(1 << 16);
    /// Part of a flush sequence.
    pub const FLUSH_SEQ: OpFlags = OpFlags(1 << 27);
    /// Harness checkpoint marker; never written to the device.
    pub const CHECKPOINT: OpFlags = OpFlags(1 << 40);

    /// Flags that pin an operation's position relative to other sync operations.
    const ORDERING: u64 = Self::SYNC.0
        | Self::FUA.0
        | Self::FLUSH.0
        | Self::FLUSH_SEQ.0
        | Self::SOFT_BARRIER.0;

    /// Flags that close an epoch.
    const BARRIER: u64 = Self::FUA.0 | Self::FLUSH.0 | Self::FLUSH_SEQ.0 | Self::SOFT_BARRIER.0;

    const NAMES: [(OpFlags, &'static str); 10] = [
        (Self::WRITE, "write"),
        (Self::SYNC, "sync"),
        (Self::META, "meta"),
        (Self::PRIO, "prio"),
        (Self::DISCARD, "discard"),
        (Self::FUA, "fua"),
        (Self::FLUSH, "flush"),
        (Self::SOFT_BARRIER, "soft barrier"),
        (Self::FLUSH_SEQ, "flush seq"),
        (Self::CHECKPOINT, "checkpoint"),
    ];

    /// Empty flag set.
    pub const fn empty() -> Self {
        OpFlags(0)
    }

    /// Raw bit value.
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// True if every bit in `other` is set.
    pub const fn contains(self, other: OpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit in `other` is set.
    pub const fn intersects(self, other: OpFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Operation carries the write flag.
    pub const fn is_write(self) -> bool {
        self.contains(Self::WRITE)
    }

    /// Flush, FUA, flush-sequence or soft-barrier operation.
    pub const fn is_barrier(self) -> bool {
        self.0 & Self::BARRIER != 0
    }

    /// Write with no ordering flag: free to be reordered inside its epoch.
    pub const fn is_async_write(self) -> bool {
        self.is_write() && self.0 & Self::ORDERING == 0
    }

    /// Discard request.
    pub const fn is_discard(self) -> bool {
        self.contains(Self::DISCARD)
    }

    /// Metadata request.
    pub const fn is_meta(self) -> bool {
        self.contains(Self::META)
    }

    /// Harness checkpoint marker.
    pub const fn is_checkpoint(self) -> bool {
        self.contains(Self::CHECKPOINT)
    }

    /// Whether an operation with these flags and `size` bytes owns a payload.
    pub const fn carries_payload(self, size: u32) -> bool {
        size > 0 && self.is_write() && !self.is_discard()
    }
}

impl std::ops::BitOr for OpFlags {
    type Output = OpFlags;

    fn bitor(self, rhs: OpFlags) -> OpFlags {
        OpFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for OpFlags {
    fn bitor_assign(&mut self, rhs: OpFlags) {
        self.0 |= rhs.0;
    }
}

impl From<u64> for OpFlags {
    fn from(bits: u64) -> Self {
        OpFlags(bits)
    }
}

impl fmt::Display for OpFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("read")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_write_classification() {
        assert!(OpFlags::WRITE.is_async_write());
        assert!((OpFlags::WRITE | OpFlags::META | OpFlags::PRIO).is_async_write());
        assert!(!(OpFlags::WRITE | OpFlags::SYNC).is_async_write());
        assert!(!(OpFlags::WRITE | OpFlags::FUA).is_async_write());
        assert!(!(OpFlags::WRITE | OpFlags::SOFT_BARRIER).is_async_write());
        // Reads are never async writes
        assert!(!OpFlags::empty().is_async_write());
    }

    #[test]
    fn test_barrier_classification() {
        assert!(OpFlags::FLUSH.is_barrier());
        assert!((OpFlags::WRITE | OpFlags::FUA).is_barrier());
        assert!(OpFlags::FLUSH_SEQ.is_barrier());
        assert!(OpFlags::SOFT_BARRIER.is_barrier());
        assert!(!(OpFlags::WRITE | OpFlags::SYNC).is_barrier());
    }

    #[test]
    fn test_carries_payload() {
        assert!(OpFlags::WRITE.carries_payload(512));
        assert!(!OpFlags::WRITE.carries_payload(0));
        assert!(!(OpFlags::WRITE | OpFlags::DISCARD).carries_payload(4096));
        assert!(!OpFlags::FLUSH.carries_payload(512));
    }

    #[test]
    fn test_display_lists_names() {
        let flags = OpFlags::WRITE | OpFlags::SYNC | OpFlags::FUA;
        assert_eq!(flags.to_string(), "write, sync, fua");
        assert_eq!(OpFlags::empty().to_string(), "read");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&OpFlags::WRITE).unwrap();
        assert_eq!(json, "1");
    }
}
