//! Replay configuration via `crashreplay.toml`
//!
//! Every setting has a default, so an empty file is a valid config. The CLI
//! loads the file first and then applies its own flags on top.

use crate::error::ConfigError;
use crate::fs::FsKind;
use crate::permuter::PermuteMode;
use crashreplay_core::SECTOR_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "crashreplay.toml";

/// Settings for recording and replaying.
///
/// # Example
///
/// ```toml
/// fs_type = "ext4"
/// device = "/dev/cow_ram_snapshot1_0"
/// mount_point = "/mnt/snapshot"
/// rounds = 1000
/// mode = "random"
/// seed = 42
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// File system on the device
    pub fs_type: FsKind,
    /// Device crash states are written to and checked on
    pub device: PathBuf,
    /// Mount point for the workload check
    pub mount_point: PathBuf,
    /// Extra mount options for replayed images
    pub mount_options: String,
    /// Number of rounds
    pub rounds: usize,
    /// Crash-state generation mode
    pub mode: PermuteMode,
    /// Random seed; derived from the clock when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Replay sector size in bytes; must be 512
    pub sector_size: u64,
    /// Capture log to replay
    pub log_file: PathBuf,
    /// Pristine device snapshot
    pub snapshot_file: PathBuf,
    /// Registered workload name
    pub workload: String,
    /// Logging wrapper device the workload runs on while recording
    pub capture_device: PathBuf,
    /// Program that switches capture on and off and clears it
    pub capture_tool: String,
    /// File the capture tool spools entries to
    pub capture_spool: PathBuf,
    /// Seconds to wait after the workload before logging stops; the file
    /// system's writeback delay when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_run_delay_secs: Option<u64>,
    /// Debug logging
    pub verbose: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        ReplayConfig {
            fs_type: FsKind::Ext4,
            device: PathBuf::from("/dev/cow_ram_snapshot1_0"),
            mount_point: PathBuf::from("/mnt/snapshot"),
            mount_options: String::new(),
            rounds: 1,
            mode: PermuteMode::Exhaustive,
            seed: None,
            sector_size: SECTOR_SIZE,
            log_file: PathBuf::from("crashreplay.log"),
            snapshot_file: PathBuf::from("crashreplay.snap"),
            workload: "echo-file".to_string(),
            capture_device: PathBuf::from("/dev/hwm"),
            capture_tool: "hwm-ctl".to_string(),
            capture_spool: PathBuf::from("/var/tmp/hwm.spool"),
            post_run_delay_secs: None,
            verbose: false,
        }
    }
}

impl ReplayConfig {
    /// Small config for tests: two rounds, fixed seed.
    pub fn for_testing() -> Self {
        ReplayConfig {
            rounds: 2,
            seed: Some(0),
            ..Self::default()
        }
    }

    /// Set the file system.
    pub fn with_fs_type(mut self, fs_type: FsKind) -> Self {
        self.fs_type = fs_type;
        self
    }

    /// Set the device path.
    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }

    /// Set the mount point.
    pub fn with_mount_point(mut self, mount_point: impl Into<PathBuf>) -> Self {
        self.mount_point = mount_point.into();
        self
    }

    /// Set extra mount options.
    pub fn with_mount_options(mut self, options: impl Into<String>) -> Self {
        self.mount_options = options.into();
        self
    }

    /// Set the number of rounds.
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set the generation mode.
    pub fn with_mode(mut self, mode: PermuteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Fix the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the capture log path.
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Set the snapshot path.
    pub fn with_snapshot_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_file = path.into();
        self
    }

    /// Set the workload name.
    pub fn with_workload(mut self, name: impl Into<String>) -> Self {
        self.workload = name.into();
        self
    }

    /// Set the capture wrapper device.
    pub fn with_capture_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.capture_device = path.into();
        self
    }

    /// Override the post-run writeback delay.
    pub fn with_post_run_delay_secs(mut self, secs: u64) -> Self {
        self.post_run_delay_secs = Some(secs);
        self
    }

    /// Enable debug logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sector_size != SECTOR_SIZE {
            return Err(ConfigError::invalid(
                "sector_size",
                format!("must be {}, got {}", SECTOR_SIZE, self.sector_size),
            ));
        }
        if self.rounds == 0 {
            return Err(ConfigError::invalid("rounds", "must be at least 1"));
        }
        if self.device.as_os_str().is_empty() {
            return Err(ConfigError::invalid("device", "must not be empty"));
        }
        if self.mount_point.as_os_str().is_empty() {
            return Err(ConfigError::invalid("mount_point", "must not be empty"));
        }
        if self.workload.is_empty() {
            return Err(ConfigError::invalid("workload", "must not be empty"));
        }
        if self.capture_tool.is_empty() {
            return Err(ConfigError::invalid("capture_tool", "must not be empty"));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# crashreplay configuration
#
# File system on the device: ext2, ext3, ext4, btrfs, f2fs or xfs
fs_type = "ext4"

# Device crash states are written to and checked on
device = "/dev/cow_ram_snapshot1_0"

# Where the replayed file system is mounted for the workload check
mount_point = "/mnt/snapshot"

# Extra mount options for replayed images (comma separated)
mount_options = ""

# Number of rounds. In exhaustive mode the run stops early once every
# ordering has been tested.
rounds = 1

# Crash-state generation: "exhaustive", "random" or "random-subset"
mode = "exhaustive"

# Random seed. Leave unset to derive one from the clock; the seed in use is
# logged so a run can be reproduced.
# seed = 42

# Replay sector size in bytes (only 512 is supported)
sector_size = 512

# Capture log and pristine device snapshot
log_file = "crashreplay.log"
snapshot_file = "crashreplay.snap"

# Workload whose data check runs on every crash state
workload = "echo-file"

# Recording: the logging wrapper device the workload runs on, the program
# that controls it ("<tool> enable|disable|clear <device>"), and the file it
# spools captured entries to
capture_device = "/dev/hwm"
capture_tool = "hwm-ctl"
capture_spool = "/var/tmp/hwm.spool"

# Seconds to wait for writeback after the workload finishes. Leave unset to
# use the file system's own delay.
# post_run_delay_secs = 5

# Debug logging
verbose = false
"#
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ReplayConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns whether the file was created.
    pub fn write_default_if_missing(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
