//! Append-only capture log writer.

use crate::error::LogError;
use crate::format::serialize;
use crashreplay_core::WriteRecord;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Buffered, append-only writer for a capture log file.
///
/// Records reach disk only after [`LogWriter::finish`], which flushes the
/// buffer and fsyncs the file. Dropping a writer without calling `finish`
/// may lose buffered records.
pub struct LogWriter {
    path: PathBuf,
    out: BufWriter<File>,
    records_written: u64,
    bytes_written: u64,
}

impl LogWriter {
    /// Create (or truncate) the log file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(LogWriter {
            path,
            out: BufWriter::new(file),
            records_written: 0,
            bytes_written: 0,
        })
    }

    /// Append one record.
    pub fn append(&mut self, record: &WriteRecord) -> Result<(), LogError> {
        let n = serialize(&mut self.out, record)?;
        self.records_written += 1;
        self.bytes_written += n as u64;
        Ok(())
    }

    /// Number of records appended so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Number of encoded bytes appended so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush buffered records and fsync the file.
    pub fn finish(mut self) -> Result<(), LogError> {
        self.out.flush()?;
        self.out.get_ref().sync_all()?;
        debug!(
            target: "crashreplay::log",
            path = %self.path.display(),
            records = self.records_written,
            bytes = self.bytes_written,
            "Capture log written"
        );
        Ok(())
    }
}

/// Write `records` to a new log file at `path`, replacing any existing file.
pub fn save_log(path: impl AsRef<Path>, records: &[WriteRecord]) -> Result<(), LogError> {
    let mut writer = LogWriter::create(path)?;
    for record in records {
        writer.append(record)?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{RECORD_HEADER_SIZE, RECORD_TRAILER_SIZE};
    use crashreplay_core::OpFlags;
    use tempfile::tempdir;

    #[test]
    fn test_counters_track_appends() {
        let dir = tempdir().unwrap();
        let mut writer = LogWriter::create(dir.path().join("run.log")).unwrap();

        writer
            .append(&WriteRecord::write(OpFlags::empty(), 0, vec![1; 10]))
            .unwrap();
        writer
            .append(&WriteRecord::marker(OpFlags::WRITE | OpFlags::FLUSH))
            .unwrap();

        assert_eq!(writer.records_written(), 2);
        let overhead = (RECORD_HEADER_SIZE + RECORD_TRAILER_SIZE) as u64;
        assert_eq!(writer.bytes_written(), 2 * overhead + 10);
        writer.finish().unwrap();
    }

    #[test]
    fn test_save_log_truncates_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");
        std::fs::write(&path, vec![0xFFu8; 4096]).unwrap();

        save_log(&path, &[WriteRecord::marker(OpFlags::FLUSH)]).unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, (RECORD_HEADER_SIZE + RECORD_TRAILER_SIZE) as u64);
    }
}
