//! Built-in `echo-file` workload
//!
//! Writes one small file and makes it durable, which is the first checkpoint.
//! Any crash state that reached the checkpoint must show the file with
//! exactly the written contents.

use super::{DataErrors, DataTestResult, Workload};
use crate::error::WorkloadError;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const DIR_NAME: &str = "echo";
const FILE_NAME: &str = "data";
const CONTENTS: &[u8] = b"crashreplay echo workload\n";

/// Writes and verifies a single durable file.
#[derive(Debug, Default)]
pub struct EchoFileWorkload {
    mount_dir: PathBuf,
}

impl EchoFileWorkload {
    /// Registry name.
    pub const NAME: &'static str = "echo-file";

    /// Workload not yet initialized.
    pub fn new() -> Self {
        Self::default()
    }

    fn dir(&self) -> PathBuf {
        self.mount_dir.join(DIR_NAME)
    }

    fn file(&self) -> PathBuf {
        self.dir().join(FILE_NAME)
    }
}

fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

impl Workload for EchoFileWorkload {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn init(&mut self, mount_dir: &Path, _device_size: u64) {
        self.mount_dir = mount_dir.to_path_buf();
    }

    fn setup(&mut self) -> Result<(), WorkloadError> {
        fs::create_dir_all(self.dir())?;
        sync_dir(&self.dir())?;
        sync_dir(&self.mount_dir)?;
        Ok(())
    }

    fn run(&mut self, _checkpoint: i32) -> Result<(), WorkloadError> {
        let mut file = File::create(self.file())?;
        file.write_all(CONTENTS)?;
        file.sync_all()?;
        sync_dir(&self.dir())?;
        debug!(target: "crashreplay::replay", path = %self.file().display(), "Echo file durable");
        Ok(())
    }

    fn check_test(&mut self, last_checkpoint: u32, result: &mut DataTestResult) -> i32 {
        if last_checkpoint == 0 {
            // Nothing was promised durable yet
            return 0;
        }

        match fs::read(self.file()) {
            Ok(bytes) if bytes == CONTENTS => 0,
            Ok(bytes) => {
                result.set_error(
                    DataErrors::FILE_DATA_CORRUPTED,
                    format!(
                        "{} holds {} bytes, expected {}",
                        self.file().display(),
                        bytes.len(),
                        CONTENTS.len()
                    ),
                );
                -1
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                result.set_error(
                    DataErrors::FILE_MISSING,
                    format!("{} missing after fsync", self.file().display()),
                );
                -1
            }
            Err(e) => {
                result.set_error(
                    DataErrors::OTHER,
                    format!("reading {}: {}", self.file().display(), e),
                );
                -1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn workload(dir: &Path) -> EchoFileWorkload {
        let mut w = EchoFileWorkload::new();
        w.init(dir, 0);
        w
    }

    #[test]
    fn test_run_then_check_passes() {
        let dir = tempdir().unwrap();
        let mut w = workload(dir.path());
        w.setup().unwrap();
        w.run(0).unwrap();

        let mut result = DataTestResult::default();
        assert_eq!(w.check_test(1, &mut result), 0);
        assert!(result.is_clean());
    }

    #[test]
    fn test_missing_file_after_checkpoint_is_corruption() {
        let dir = tempdir().unwrap();
        let mut w = workload(dir.path());
        w.setup().unwrap();

        let mut result = DataTestResult::default();
        assert_eq!(w.check_test(1, &mut result), -1);
        assert!(result.errors.contains(DataErrors::FILE_MISSING));
    }

    #[test]
    fn test_anything_goes_before_checkpoint() {
        let dir = tempdir().unwrap();
        let mut w = workload(dir.path());

        let mut result = DataTestResult::default();
        assert_eq!(w.check_test(0, &mut result), 0);
        assert!(result.is_clean());
    }

    #[test]
    fn test_wrong_contents_is_corruption() {
        let dir = tempdir().unwrap();
        let mut w = workload(dir.path());
        w.setup().unwrap();
        fs::write(w.file(), b"torn").unwrap();

        let mut result = DataTestResult::default();
        assert_eq!(w.check_test(1, &mut result), -1);
        assert!(result.errors.contains(DataErrors::FILE_DATA_CORRUPTED));
    }
}
