//! Host operations the replay loop depends on
//!
//! Running subprocesses (mkfs, the checker, workload children) and mounting
//! are the only places the engine touches the operating system besides raw
//! device access. They sit behind [`Host`] so recording and replay can be
//! driven without root privileges.

use crate::fs::{FsKind, ShellCommand};
use std::io;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

/// Process and mount operations.
pub trait Host {
    /// Run `command` as a child process, wait for it, and return its exit code.
    ///
    /// An `Err` means the process could not be started. A child killed by a
    /// signal reports `-1`.
    fn run_command(&mut self, command: &ShellCommand) -> io::Result<i32>;

    /// Mount `device` at `mount_point`.
    fn mount(&mut self, device: &Path, mount_point: &Path, fs: FsKind, options: &str)
        -> io::Result<()>;

    /// Unmount whatever is mounted at `mount_point`.
    fn unmount(&mut self, mount_point: &Path) -> io::Result<()>;
}

/// Runs the real `mount`, `umount`, mkfs, checker and workload programs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl SystemHost {
    fn run(command: &mut Command, what: &str) -> io::Result<Output> {
        let output = command.output()?;
        debug!(
            target: "crashreplay::replay",
            what,
            status = ?output.status.code(),
            stdout = %String::from_utf8_lossy(&output.stdout),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "Command finished"
        );
        Ok(output)
    }

    fn require_success(output: Output, what: &str) -> io::Result<()> {
        if output.status.success() {
            return Ok(());
        }
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!(
                "{} failed ({}): {}",
                what,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ))
    }
}

impl Host for SystemHost {
    fn run_command(&mut self, command: &ShellCommand) -> io::Result<i32> {
        let output = Self::run(&mut Command::from(command), &command.program)?;
        Ok(output.status.code().unwrap_or(-1))
    }

    fn mount(
        &mut self,
        device: &Path,
        mount_point: &Path,
        fs: FsKind,
        options: &str,
    ) -> io::Result<()> {
        let mut command = Command::new("mount");
        command.arg("-t").arg(fs.name());
        if !options.is_empty() {
            command.arg("-o").arg(options);
        }
        command.arg(device).arg(mount_point);
        let output = Self::run(&mut command, "mount")?;
        Self::require_success(output, "mount")
    }

    fn unmount(&mut self, mount_point: &Path) -> io::Result<()> {
        let output = Self::run(Command::new("umount").arg(mount_point), "umount")?;
        Self::require_success(output, "umount")
    }
}
