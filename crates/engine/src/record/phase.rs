//! Workload phases run in a child process

use crate::error::WorkloadError;
use crate::fs::ShellCommand;
use crate::workload::{device_shut_down, Workload};
use std::fmt;
use std::path::Path;
use tracing::info;

/// Which part of a workload a child process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadPhase {
    /// Preparation before the snapshot is taken
    Setup,
    /// The captured part, stopping after `checkpoint` (0 runs to completion)
    Run {
        /// Checkpoint to stop after
        checkpoint: i32,
    },
}

impl WorkloadPhase {
    /// Phase name as passed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            WorkloadPhase::Setup => "setup",
            WorkloadPhase::Run { .. } => "run",
        }
    }

    /// `base` with this phase's arguments appended.
    pub fn command(&self, base: &ShellCommand) -> ShellCommand {
        let command = base.clone().arg("--phase").arg(self.name());
        match self {
            WorkloadPhase::Setup => command,
            WorkloadPhase::Run { checkpoint } => {
                command.arg("--checkpoint").arg(checkpoint.to_string())
            }
        }
    }
}

impl fmt::Display for WorkloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Initialize `workload` and run one phase of it against `mount_dir`.
///
/// A file system that has already shut down is reported as
/// [`WorkloadError::ShutDown`], as is a phase failure caused by a shutdown.
pub fn run_workload_phase(
    workload: &mut dyn Workload,
    phase: WorkloadPhase,
    mount_dir: &Path,
    device_size: u64,
) -> Result<(), WorkloadError> {
    let shut_down = || WorkloadError::ShutDown {
        mount_point: mount_dir.to_path_buf(),
    };
    if device_shut_down(mount_dir) {
        return Err(shut_down());
    }

    workload.init(mount_dir, device_size);
    let result = match phase {
        WorkloadPhase::Setup => workload.setup(),
        WorkloadPhase::Run { checkpoint } => workload.run(checkpoint),
    };
    if let Err(e) = result {
        return Err(if device_shut_down(mount_dir) { shut_down() } else { e });
    }

    info!(target: "crashreplay::record", workload = workload.name(), %phase, "Workload phase finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::EchoFileWorkload;
    use tempfile::tempdir;

    #[test]
    fn test_phase_arguments() {
        let base = ShellCommand::new("crashreplay").arg("run-workload").arg("echo-file");
        assert_eq!(
            WorkloadPhase::Setup.command(&base).to_string(),
            "crashreplay run-workload echo-file --phase setup"
        );
        assert_eq!(
            WorkloadPhase::Run { checkpoint: 2 }.command(&base).to_string(),
            "crashreplay run-workload echo-file --phase run --checkpoint 2"
        );
    }

    #[test]
    fn test_echo_phases_run_in_order() {
        let dir = tempdir().unwrap();
        let mut workload = EchoFileWorkload::new();

        run_workload_phase(&mut workload, WorkloadPhase::Setup, dir.path(), 0).unwrap();
        assert!(dir.path().join("echo").is_dir());

        run_workload_phase(&mut workload, WorkloadPhase::Run { checkpoint: 0 }, dir.path(), 0)
            .unwrap();
        assert!(dir.path().join("echo").join("data").is_file());
    }

    #[test]
    fn test_run_without_setup_fails() {
        let dir = tempdir().unwrap();
        let mut workload = EchoFileWorkload::new();
        let result =
            run_workload_phase(&mut workload, WorkloadPhase::Run { checkpoint: 0 }, dir.path(), 0);
        assert!(matches!(result, Err(WorkloadError::Io(_))));
    }
}
