//! Capture log record format.
//!
//! A log file is a plain concatenation of records with no file header. Each
//! record is self-delimiting: the header alone determines how many payload
//! bytes follow.
//!
//! # Record Layout
//!
//! ```text
//! ┌──────────────┬──────────────┬────────────┬─────────────────────┬──────────┐
//! │ Flags (8)    │ Sector (8)   │ Size (4)   │ Payload (size)      │ CRC32 (4)│
//! └──────────────┴──────────────┴────────────┴─────────────────────┴──────────┘
//! ```
//!
//! All integers are big-endian. The payload is present only when the flags and
//! size describe a data-carrying write. The CRC32 covers header and payload.

use crate::error::LogError;
use byteorder::{BigEndian, ByteOrder};
use crashreplay_core::{OpFlags, RecordError, WriteRecord, MAX_PAYLOAD_BYTES};
use crc32fast::Hasher;
use std::io::{self, Read, Write};

/// Size of the fixed record header in bytes.
pub const RECORD_HEADER_SIZE: usize = 20;

/// Size of the checksum trailer in bytes.
pub const RECORD_TRAILER_SIZE: usize = 4;

/// Number of bytes `record` occupies once serialized.
pub fn encoded_len(record: &WriteRecord) -> usize {
    RECORD_HEADER_SIZE + record.payload().map_or(0, <[u8]>::len) + RECORD_TRAILER_SIZE
}

/// Write one record to `writer`.
///
/// Returns the number of bytes written.
pub fn serialize<W: Write>(writer: &mut W, record: &WriteRecord) -> Result<usize, LogError> {
    let header = encode_header(record);

    let mut hasher = Hasher::new();
    hasher.update(&header);
    writer.write_all(&header)?;

    if let Some(payload) = record.payload() {
        hasher.update(payload);
        writer.write_all(payload)?;
    }

    let mut trailer = [0u8; RECORD_TRAILER_SIZE];
    BigEndian::write_u32(&mut trailer, hasher.finalize());
    writer.write_all(&trailer)?;

    Ok(encoded_len(record))
}

/// Read exactly one record from `reader`.
///
/// An empty reader is reported as `LogError::Truncated`; use [`read_record`]
/// when end-of-log is expected.
pub fn deserialize<R: Read>(reader: &mut R) -> Result<WriteRecord, LogError> {
    read_record(reader)?.ok_or(LogError::Truncated {
        expected: RECORD_HEADER_SIZE,
        actual: 0,
    })
}

/// Read the next record from `reader`.
///
/// Returns `Ok(None)` on a clean end-of-file at a record boundary. Any partial
/// record is `LogError::Truncated`.
pub fn read_record<R: Read>(reader: &mut R) -> Result<Option<WriteRecord>, LogError> {
    let mut header = [0u8; RECORD_HEADER_SIZE];
    let got = read_full(reader, &mut header)?;
    if got == 0 {
        return Ok(None);
    }
    if got < RECORD_HEADER_SIZE {
        return Err(LogError::Truncated {
            expected: RECORD_HEADER_SIZE,
            actual: got,
        });
    }

    let flags = OpFlags(BigEndian::read_u64(&header[0..8]));
    let sector = BigEndian::read_u64(&header[8..16]);
    let size = BigEndian::read_u32(&header[16..20]);

    // Reject before allocating: a corrupted size field must not drive a huge allocation.
    if size > MAX_PAYLOAD_BYTES {
        return Err(RecordError::PayloadTooLarge {
            size: size as u64,
            max: MAX_PAYLOAD_BYTES,
        }
        .into());
    }

    let mut hasher = Hasher::new();
    hasher.update(&header);

    let payload = if flags.carries_payload(size) {
        let mut buf = vec![0u8; size as usize];
        let got = read_full(reader, &mut buf)?;
        if got < buf.len() {
            return Err(LogError::Truncated {
                expected: RECORD_HEADER_SIZE + buf.len() + RECORD_TRAILER_SIZE,
                actual: RECORD_HEADER_SIZE + got,
            });
        }
        hasher.update(&buf);
        Some(buf)
    } else {
        None
    };
    let body_len = RECORD_HEADER_SIZE + payload.as_ref().map_or(0, Vec::len);

    let mut trailer = [0u8; RECORD_TRAILER_SIZE];
    let got = read_full(reader, &mut trailer)?;
    if got < RECORD_TRAILER_SIZE {
        return Err(LogError::Truncated {
            expected: body_len + RECORD_TRAILER_SIZE,
            actual: body_len + got,
        });
    }

    let stored = BigEndian::read_u32(&trailer);
    let computed = hasher.finalize();
    if stored != computed {
        return Err(LogError::ChecksumMismatch {
            expected: stored,
            computed,
        });
    }

    Ok(Some(WriteRecord::new(flags, sector, size, payload)?))
}

fn encode_header(record: &WriteRecord) -> [u8; RECORD_HEADER_SIZE] {
    let mut header = [0u8; RECORD_HEADER_SIZE];
    BigEndian::write_u64(&mut header[0..8], record.flags().bits());
    BigEndian::write_u64(&mut header[8..16], record.sector());
    BigEndian::write_u32(&mut header[16..20], record.size());
    header
}

/// Fill `buf` from `reader`, stopping early only at end-of-file.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
