//! File-system specific commands
//!
//! Each supported file system knows how to format a device, how to check
//! one, how to read its checker's exit status, and which mount options to use
//! after replay. Commands are structured argument lists and are never passed
//! through a shell.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// Executable name or path
    pub program: String,
    /// Arguments, one per element
    pub args: Vec<String>,
}

impl ShellCommand {
    /// Command with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        ShellCommand {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl From<&ShellCommand> for Command {
    fn from(cmd: &ShellCommand) -> Self {
        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);
        command
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Checker verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FsckStatus {
    /// No problems found
    Clean,
    /// Problems found and repaired
    Fixed,
    /// The checker could not check the file system
    CheckFailed,
    /// Problems found and left unrepaired
    Unfixed,
}

/// Operations that differ per file system.
pub trait FsCommands {
    /// Command that creates the file system on `device`.
    fn mkfs_command(&self, device: &str) -> ShellCommand;

    /// Command that checks and repairs `device` non-interactively.
    fn fsck_command(&self, device: &str) -> ShellCommand;

    /// Interpret the checker's exit code.
    fn classify_exit_code(&self, code: i32) -> FsckStatus;

    /// Mount options for mounting a replayed image.
    fn post_replay_mount_options(&self) -> &'static str;

    /// How long a workload must wait for background writeback to finish.
    fn post_run_delay(&self) -> Duration;
}

/// Supported file systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsKind {
    /// ext2
    Ext2,
    /// ext3
    Ext3,
    /// ext4
    Ext4,
    /// Btrfs
    Btrfs,
    /// F2FS
    F2fs,
    /// XFS
    Xfs,
}

/// Writeback interval plus margin on current kernels.
const WRITEBACK_DELAY: Duration = Duration::from_secs(120);

// fsck.ext4(8) exit bits
const EXT_FIXED: i32 = 0x1 | 0x2;
const EXT_UNFIXED: i32 = 0x4;
const EXT_CHECK_FAILED: i32 = 0x8 | 0x10 | 0x20 | 0x80;

impl FsKind {
    /// Every supported file system.
    pub const ALL: [FsKind; 6] = [
        FsKind::Ext2,
        FsKind::Ext3,
        FsKind::Ext4,
        FsKind::Btrfs,
        FsKind::F2fs,
        FsKind::Xfs,
    ];

    /// Type name as `mount -t` and `mkfs -t` spell it.
    pub fn name(&self) -> &'static str {
        match self {
            FsKind::Ext2 => "ext2",
            FsKind::Ext3 => "ext3",
            FsKind::Ext4 => "ext4",
            FsKind::Btrfs => "btrfs",
            FsKind::F2fs => "f2fs",
            FsKind::Xfs => "xfs",
        }
    }

    fn is_ext(&self) -> bool {
        matches!(self, FsKind::Ext2 | FsKind::Ext3 | FsKind::Ext4)
    }
}

impl FsCommands for FsKind {
    fn mkfs_command(&self, device: &str) -> ShellCommand {
        ShellCommand::new("mkfs").arg("-t").arg(self.name()).arg(device)
    }

    fn fsck_command(&self, device: &str) -> ShellCommand {
        match self {
            FsKind::Ext2 | FsKind::Ext3 | FsKind::Ext4 => ShellCommand::new("fsck")
                .arg("-T")
                .arg("-t")
                .arg(self.name())
                .arg(device)
                .arg("--")
                .arg("-y"),
            FsKind::Btrfs => ShellCommand::new("btrfs").arg("check").arg(device),
            FsKind::F2fs => ShellCommand::new("fsck")
                .arg("-T")
                .arg("-t")
                .arg(self.name())
                .arg(device),
            FsKind::Xfs => ShellCommand::new("xfs_repair").arg(device),
        }
    }

    fn classify_exit_code(&self, code: i32) -> FsckStatus {
        if !self.is_ext() {
            return if code == 0 {
                FsckStatus::Clean
            } else {
                FsckStatus::CheckFailed
            };
        }

        if code & EXT_CHECK_FAILED != 0 {
            FsckStatus::CheckFailed
        } else if code & EXT_UNFIXED != 0 {
            FsckStatus::Unfixed
        } else if code & EXT_FIXED != 0 {
            FsckStatus::Fixed
        } else if code == 0 {
            FsckStatus::Clean
        } else {
            FsckStatus::CheckFailed
        }
    }

    fn post_replay_mount_options(&self) -> &'static str {
        if self.is_ext() {
            "errors=remount-ro"
        } else {
            ""
        }
    }

    fn post_run_delay(&self) -> Duration {
        WRITEBACK_DELAY
    }
}

impl fmt::Display for FsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FsKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        FsKind::ALL
            .into_iter()
            .find(|kind| kind.name() == lower)
            .ok_or_else(|| format!("unsupported file system '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext4_fsck_command() {
        let cmd = FsKind::Ext4.fsck_command("/dev/cow_ram_snapshot1_0");
        assert_eq!(cmd.program, "fsck");
        assert_eq!(
            cmd.args,
            vec!["-T", "-t", "ext4", "/dev/cow_ram_snapshot1_0", "--", "-y"]
        );
        assert_eq!(
            cmd.to_string(),
            "fsck -T -t ext4 /dev/cow_ram_snapshot1_0 -- -y"
        );
    }

    #[test]
    fn test_other_fsck_commands() {
        assert_eq!(FsKind::Btrfs.fsck_command("/dev/x").to_string(), "btrfs check /dev/x");
        assert_eq!(FsKind::Xfs.fsck_command("/dev/x").to_string(), "xfs_repair /dev/x");
        assert_eq!(FsKind::F2fs.fsck_command("/dev/x").to_string(), "fsck -T -t f2fs /dev/x");
    }

    #[test]
    fn test_mkfs_command() {
        let cmd = FsKind::Btrfs.mkfs_command("/dev/x");
        assert_eq!(cmd.to_string(), "mkfs -t btrfs /dev/x");
    }

    #[test]
    fn test_argument_with_spaces_stays_one_argument() {
        let cmd = FsKind::Xfs.fsck_command("/dev/disk by label");
        assert_eq!(cmd.args.len(), 1);
        let command = Command::from(&cmd);
        assert_eq!(command.get_args().count(), 1);
    }

    #[test]
    fn test_ext_exit_classification() {
        let ext4 = FsKind::Ext4;
        assert_eq!(ext4.classify_exit_code(0), FsckStatus::Clean);
        assert_eq!(ext4.classify_exit_code(1), FsckStatus::Fixed);
        assert_eq!(ext4.classify_exit_code(2), FsckStatus::Fixed);
        assert_eq!(ext4.classify_exit_code(4), FsckStatus::Unfixed);
        assert_eq!(ext4.classify_exit_code(4 | 1), FsckStatus::Unfixed);
        assert_eq!(ext4.classify_exit_code(8), FsckStatus::CheckFailed);
        assert_eq!(ext4.classify_exit_code(0x80 | 1), FsckStatus::CheckFailed);
        assert_eq!(ext4.classify_exit_code(-1), FsckStatus::CheckFailed);
    }

    #[test]
    fn test_non_ext_exit_classification() {
        for kind in [FsKind::Btrfs, FsKind::F2fs, FsKind::Xfs] {
            assert_eq!(kind.classify_exit_code(0), FsckStatus::Clean);
            assert_eq!(kind.classify_exit_code(1), FsckStatus::CheckFailed);
        }
    }

    #[test]
    fn test_mount_options() {
        assert_eq!(FsKind::Ext3.post_replay_mount_options(), "errors=remount-ro");
        assert_eq!(FsKind::Btrfs.post_replay_mount_options(), "");
    }

    #[test]
    fn test_parse_roundtrip() {
        for kind in FsKind::ALL {
            assert_eq!(kind.to_string().parse::<FsKind>(), Ok(kind));
        }
        assert_eq!("EXT4".parse::<FsKind>(), Ok(FsKind::Ext4));
        assert!("ntfs".parse::<FsKind>().is_err());
    }
}
