//! Draining a write-capture source into a record log
//!
//! The capture source is the block-layer logging component that records every
//! write issued while a workload runs. It is consumed one entry at a time:
//! read the entry's metadata, fetch its payload, advance. Running out of
//! entries is the normal end of a drain.

use crate::error::CaptureError;
use crashreplay_core::{OpFlags, WriteRecord};
use std::collections::VecDeque;
use std::io;
use tracing::{debug, info};

/// Metadata describing one captured entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    /// Request flags
    pub flags: OpFlags,
    /// Target sector
    pub sector: u64,
    /// Byte length
    pub size: u32,
}

/// Result of polling a capture source for its next entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextEntry {
    /// An entry is available
    Entry(EntryMeta),
    /// The log has been fully consumed
    NoMoreData,
}

/// A source of captured block operations.
pub trait CaptureSource {
    /// Start recording writes.
    fn enable_logging(&mut self) -> io::Result<()>;

    /// Stop recording writes.
    fn disable_logging(&mut self) -> io::Result<()>;

    /// Discard every recorded entry.
    fn clear_log(&mut self) -> io::Result<()>;

    /// Metadata of the current entry, or `NoMoreData`.
    fn next_entry_metadata(&mut self) -> io::Result<NextEntry>;

    /// Payload bytes of the current entry.
    fn next_entry_payload(&mut self, size: u32) -> io::Result<Vec<u8>>;

    /// Move past the current entry.
    fn advance(&mut self) -> io::Result<()>;
}

/// Poll `source` until it reports `NoMoreData`, collecting every entry.
///
/// Payloads are fetched only for entries that carry data. The source is left
/// positioned past the last entry.
pub fn drain_log<S: CaptureSource + ?Sized>(
    source: &mut S,
) -> Result<Vec<WriteRecord>, CaptureError> {
    let mut records = Vec::new();

    while let NextEntry::Entry(meta) = source.next_entry_metadata()? {
        let payload = if meta.flags.carries_payload(meta.size) {
            Some(source.next_entry_payload(meta.size)?)
        } else {
            None
        };

        let record = WriteRecord::new(meta.flags, meta.sector, meta.size, payload).map_err(
            |source| CaptureError::InvalidEntry {
                index: records.len(),
                source,
            },
        )?;
        debug!(target: "crashreplay::capture", index = records.len(), %record, "Captured entry");
        records.push(record);
        source.advance()?;
    }

    info!(target: "crashreplay::capture", records = records.len(), "Capture log drained");
    Ok(records)
}

/// In-memory capture source.
///
/// Serves a fixed list of records in order. While logging is disabled,
/// [`VecCaptureSource::push`] drops records, matching a real capture device.
#[derive(Debug, Default)]
pub struct VecCaptureSource {
    entries: VecDeque<WriteRecord>,
    logging: bool,
}

impl VecCaptureSource {
    /// Source that already holds `records`.
    pub fn new(records: Vec<WriteRecord>) -> Self {
        VecCaptureSource {
            entries: records.into(),
            logging: false,
        }
    }

    /// Record `record` if logging is enabled. Returns whether it was kept.
    pub fn push(&mut self, record: WriteRecord) -> bool {
        if self.logging {
            self.entries.push_back(record);
        }
        self.logging
    }

    /// Whether logging is enabled.
    pub fn is_logging(&self) -> bool {
        self.logging
    }

    /// Entries not yet drained.
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl CaptureSource for VecCaptureSource {
    fn enable_logging(&mut self) -> io::Result<()> {
        self.logging = true;
        Ok(())
    }

    fn disable_logging(&mut self) -> io::Result<()> {
        self.logging = false;
        Ok(())
    }

    fn clear_log(&mut self) -> io::Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn next_entry_metadata(&mut self) -> io::Result<NextEntry> {
        Ok(match self.entries.front() {
            Some(record) => NextEntry::Entry(EntryMeta {
                flags: record.flags(),
                sector: record.sector(),
                size: record.size(),
            }),
            None => NextEntry::NoMoreData,
        })
    }

    fn next_entry_payload(&mut self, size: u32) -> io::Result<Vec<u8>> {
        match self.entries.front().and_then(WriteRecord::payload) {
            Some(bytes) if bytes.len() == size as usize => Ok(bytes.to_vec()),
            Some(bytes) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("requested {} payload bytes, entry has {}", size, bytes.len()),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "current entry has no payload",
            )),
        }
    }

    fn advance(&mut self) -> io::Result<()> {
        self.entries.pop_front();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crashreplay_core::RecordError;

    #[test]
    fn test_drain_returns_all_entries_in_order() {
        let records = vec![
            WriteRecord::write(OpFlags::empty(), 0, vec![1; 10]),
            WriteRecord::marker(OpFlags::WRITE | OpFlags::FLUSH),
            WriteRecord::new(OpFlags::WRITE | OpFlags::DISCARD, 8, 4096, None).unwrap(),
        ];
        let mut source = VecCaptureSource::new(records.clone());

        let drained = drain_log(&mut source).unwrap();
        assert_eq!(drained, records);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_empty_source_is_not_an_error() {
        let mut source = VecCaptureSource::default();
        assert!(drain_log(&mut source).unwrap().is_empty());
    }

    #[test]
    fn test_push_respects_logging_state() {
        let mut source = VecCaptureSource::default();
        assert!(!source.push(WriteRecord::marker(OpFlags::FLUSH)));

        source.enable_logging().unwrap();
        assert!(source.push(WriteRecord::marker(OpFlags::FLUSH)));
        source.disable_logging().unwrap();

        assert_eq!(source.remaining(), 1);
        source.clear_log().unwrap();
        assert_eq!(source.remaining(), 0);
    }

    struct BadPayloadSource {
        served: bool,
    }

    impl CaptureSource for BadPayloadSource {
        fn enable_logging(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn disable_logging(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn clear_log(&mut self) -> io::Result<()> {
            Ok(())
        }
        fn next_entry_metadata(&mut self) -> io::Result<NextEntry> {
            if self.served {
                return Ok(NextEntry::NoMoreData);
            }
            Ok(NextEntry::Entry(EntryMeta {
                flags: OpFlags::WRITE,
                sector: 0,
                size: 8,
            }))
        }
        fn next_entry_payload(&mut self, _size: u32) -> io::Result<Vec<u8>> {
            Ok(vec![0; 3])
        }
        fn advance(&mut self) -> io::Result<()> {
            self.served = true;
            Ok(())
        }
    }

    #[test]
    fn test_short_payload_is_invalid_entry() {
        let mut source = BadPayloadSource { served: false };
        let err = drain_log(&mut source).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidEntry {
                index: 0,
                source: RecordError::SizeMismatch { declared: 8, actual: 3 }
            }
        ));
    }
}
