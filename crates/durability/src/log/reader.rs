//! Sequential capture log reader.

use crate::error::LogError;
use crate::format::read_record;
use crashreplay_core::WriteRecord;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::info;

/// Iterator over the records of a capture log.
///
/// Yields records in append order. Iteration ends cleanly at a record
/// boundary; a partial or corrupt record is yielded as an error, after which
/// the iterator is fused.
pub struct LogReader<R> {
    input: R,
    records_read: usize,
    failed: bool,
}

impl LogReader<BufReader<File>> {
    /// Open the log file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let file = File::open(path)?;
        Ok(LogReader::new(BufReader::new(file)))
    }
}

impl<R: Read> LogReader<R> {
    /// Read records from any byte source.
    pub fn new(input: R) -> Self {
        LogReader {
            input,
            records_read: 0,
            failed: false,
        }
    }

    /// Number of records successfully read so far.
    pub fn records_read(&self) -> usize {
        self.records_read
    }
}

impl<R: Read> Iterator for LogReader<R> {
    type Item = Result<WriteRecord, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match read_record(&mut self.input) {
            Ok(Some(record)) => {
                self.records_read += 1;
                Some(Ok(record))
            }
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Load every record from the log file at `path`.
///
/// Any truncated or corrupt record fails the whole load.
pub fn load_log(path: impl AsRef<Path>) -> Result<Vec<WriteRecord>, LogError> {
    let path = path.as_ref();
    let records = LogReader::open(path)?.collect::<Result<Vec<_>, _>>()?;
    info!(
        target: "crashreplay::log",
        path = %path.display(),
        records = records.len(),
        "Capture log loaded"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::save_log;
    use crashreplay_core::OpFlags;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn sample() -> Vec<WriteRecord> {
        vec![
            WriteRecord::write(OpFlags::empty(), 0, vec![b'a'; 10]),
            WriteRecord::marker(OpFlags::WRITE | OpFlags::SYNC | OpFlags::FUA),
            WriteRecord::write(OpFlags::META, 8, vec![b'b'; 15]),
        ]
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");
        save_log(&path, &sample()).unwrap();

        assert_eq!(load_log(&path).unwrap(), sample());
    }

    #[test]
    fn test_empty_log_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.log");
        save_log(&path, &[]).unwrap();

        assert!(load_log(&path).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_tail_fails_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");
        save_log(&path, &sample()).unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(len - 3).unwrap();

        assert!(matches!(load_log(&path), Err(LogError::Truncated { .. })));
    }

    #[test]
    fn test_reader_fuses_after_error() {
        let mut reader = LogReader::new(Cursor::new(vec![0u8; 5]));
        assert!(matches!(reader.next(), Some(Err(LogError::Truncated { .. }))));
        assert!(reader.next().is_none());
        assert_eq!(reader.records_read(), 0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let result = load_log(dir.path().join("absent.log"));
        assert!(matches!(result, Err(LogError::Io(_))));
    }
}
