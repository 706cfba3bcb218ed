//! Capture source backed by an external control tool and a spool file
//!
//! The logging wrapper is switched with `<tool> enable|disable|clear <device>`.
//! While enabled it appends every captured operation to the spool file in the
//! capture log record format, which is read back entry by entry.

use crashreplay_core::WriteRecord;
use crashreplay_durability::{CaptureSource, EntryMeta, LogError, LogReader, NextEntry};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Live capture through a control tool and its spool file.
pub struct SpoolCaptureSource {
    tool: String,
    device: PathBuf,
    spool: PathBuf,
    reader: Option<LogReader<BufReader<File>>>,
    current: Option<WriteRecord>,
}

impl SpoolCaptureSource {
    /// Source controlling `device` through `tool` and reading `spool`.
    pub fn new(tool: impl Into<String>, device: impl AsRef<Path>, spool: impl AsRef<Path>) -> Self {
        SpoolCaptureSource {
            tool: tool.into(),
            device: device.as_ref().to_path_buf(),
            spool: spool.as_ref().to_path_buf(),
            reader: None,
            current: None,
        }
    }

    fn control(&self, action: &str) -> io::Result<()> {
        let output = Command::new(&self.tool)
            .arg(action)
            .arg(&self.device)
            .output()?;
        debug!(
            target: "crashreplay::capture",
            tool = %self.tool,
            action,
            status = ?output.status.code(),
            "Capture control finished"
        );
        if output.status.success() {
            return Ok(());
        }
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!(
                "{} {} failed ({}): {}",
                self.tool,
                action,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ))
    }

    fn read_next(&mut self) -> io::Result<Option<WriteRecord>> {
        if self.reader.is_none() {
            self.reader = Some(LogReader::open(&self.spool).map_err(into_io)?);
        }
        match self.reader.as_mut().and_then(Iterator::next) {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(into_io(e)),
            None => Ok(None),
        }
    }
}

fn into_io(e: LogError) -> io::Error {
    match e {
        LogError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

impl CaptureSource for SpoolCaptureSource {
    fn enable_logging(&mut self) -> io::Result<()> {
        self.control("enable")
    }

    fn disable_logging(&mut self) -> io::Result<()> {
        self.control("disable")
    }

    fn clear_log(&mut self) -> io::Result<()> {
        self.reader = None;
        self.current = None;
        self.control("clear")
    }

    fn next_entry_metadata(&mut self) -> io::Result<NextEntry> {
        if self.current.is_none() {
            self.current = self.read_next()?;
        }
        Ok(match &self.current {
            Some(record) => NextEntry::Entry(EntryMeta {
                flags: record.flags(),
                sector: record.sector(),
                size: record.size(),
            }),
            None => NextEntry::NoMoreData,
        })
    }

    fn next_entry_payload(&mut self, size: u32) -> io::Result<Vec<u8>> {
        match self.current.as_ref().and_then(WriteRecord::payload) {
            Some(bytes) if bytes.len() == size as usize => Ok(bytes.to_vec()),
            _ => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("current entry has no {}-byte payload", size),
            )),
        }
    }

    fn advance(&mut self) -> io::Result<()> {
        self.current = None;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crashreplay_core::OpFlags;
    use crashreplay_durability::{drain_log, save_log, serialize, CaptureError};
    use tempfile::tempdir;

    fn records() -> Vec<WriteRecord> {
        vec![
            WriteRecord::write(OpFlags::empty(), 16, vec![4; 512]),
            WriteRecord::marker(OpFlags::WRITE | OpFlags::FLUSH),
            WriteRecord::write(OpFlags::SYNC, 24, vec![5; 1024]),
        ]
    }

    #[test]
    fn test_drains_spooled_entries() {
        let dir = tempdir().unwrap();
        let spool = dir.path().join("hwm.spool");
        save_log(&spool, &records()).unwrap();

        let mut source = SpoolCaptureSource::new("true", "/dev/hwm", &spool);
        source.enable_logging().unwrap();
        source.disable_logging().unwrap();
        assert_eq!(drain_log(&mut source).unwrap(), records());
        assert_eq!(source.next_entry_metadata().unwrap(), NextEntry::NoMoreData);
    }

    #[test]
    fn test_clear_rereads_spool() {
        let dir = tempdir().unwrap();
        let spool = dir.path().join("hwm.spool");
        save_log(&spool, &records()).unwrap();

        let mut source = SpoolCaptureSource::new("true", "/dev/hwm", &spool);
        assert_eq!(drain_log(&mut source).unwrap().len(), 3);

        save_log(&spool, &records()[..1]).unwrap();
        source.clear_log().unwrap();
        assert_eq!(drain_log(&mut source).unwrap(), records()[..1].to_vec());
    }

    #[test]
    fn test_failing_tool_is_error() {
        let dir = tempdir().unwrap();
        let mut source = SpoolCaptureSource::new("false", "/dev/hwm", dir.path().join("s"));
        let err = source.enable_logging().unwrap_err();
        assert!(err.to_string().contains("false enable failed"));
    }

    #[test]
    fn test_missing_spool_is_error() {
        let dir = tempdir().unwrap();
        let mut source = SpoolCaptureSource::new("true", "/dev/hwm", dir.path().join("absent"));
        let err = drain_log(&mut source).unwrap_err();
        assert!(matches!(err, CaptureError::Source(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn test_corrupt_spool_is_invalid_data() {
        let dir = tempdir().unwrap();
        let spool = dir.path().join("hwm.spool");
        let mut bytes = Vec::new();
        serialize(&mut bytes, &records()[0]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&spool, bytes).unwrap();

        let mut source = SpoolCaptureSource::new("true", "/dev/hwm", &spool);
        let err = drain_log(&mut source).unwrap_err();
        assert!(matches!(err, CaptureError::Source(ref e) if e.kind() == io::ErrorKind::InvalidData));
    }
}
