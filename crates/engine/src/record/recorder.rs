//! Record phase orchestration

use super::phase::WorkloadPhase;
use crate::device::BlockDevice;
use crate::error::RecordingError;
use crate::fs::{FsCommands, FsKind, ShellCommand};
use crate::host::Host;
use crashreplay_core::WriteRecord;
use crashreplay_durability::{drain_log, save_log, save_snapshot, CaptureSource};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Devices and mount point a recording runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordTarget {
    /// File system to create
    pub fs: FsKind,
    /// Raw device formatted, set up and snapshotted
    pub device_path: PathBuf,
    /// Logging wrapper over `device_path`, mounted while the workload runs
    pub capture_device: PathBuf,
    /// Where the file system is mounted for setup and run
    pub mount_point: PathBuf,
    /// Mount options, comma separated
    pub mount_options: String,
}

/// What a recording produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    /// Captured writes in issue order
    pub log: Vec<WriteRecord>,
    /// Device contents after setup, before capture began
    pub snapshot: Vec<u8>,
}

impl Recording {
    /// Write the log and the snapshot to their files.
    pub fn save(&self, log_path: &Path, snapshot_path: &Path) -> Result<(), RecordingError> {
        save_log(log_path, &self.log)?;
        save_snapshot(snapshot_path, &self.snapshot)?;
        info!(
            target: "crashreplay::record",
            log = %log_path.display(),
            snapshot = %snapshot_path.display(),
            "Recording saved"
        );
        Ok(())
    }
}

/// Drives one workload through format, setup, snapshot and captured run.
///
/// Workload phases run as child processes built from a base command, so a
/// workload that leaves files open cannot keep the mount point busy.
pub struct Recorder {
    target: RecordTarget,
    device: Box<dyn BlockDevice>,
    host: Box<dyn Host>,
    capture: Box<dyn CaptureSource>,
    workload: ShellCommand,
    checkpoint: i32,
    post_run_delay: Duration,
}

impl Recorder {
    /// Assemble a recorder. `workload` is the child command without phase
    /// arguments. The post-run delay starts at the file system's writeback
    /// delay.
    pub fn new(
        target: RecordTarget,
        device: Box<dyn BlockDevice>,
        host: Box<dyn Host>,
        capture: Box<dyn CaptureSource>,
        workload: ShellCommand,
    ) -> Self {
        let post_run_delay = target.fs.post_run_delay();
        Recorder {
            target,
            device,
            host,
            capture,
            workload,
            checkpoint: 0,
            post_run_delay,
        }
    }

    /// Wait `delay` after the workload before logging stops.
    pub fn with_post_run_delay(mut self, delay: Duration) -> Self {
        self.post_run_delay = delay;
        self
    }

    /// Stop the captured run after `checkpoint`; 0 runs to completion.
    pub fn with_checkpoint(mut self, checkpoint: i32) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    /// Delay applied between the workload's exit and the end of logging.
    pub fn post_run_delay(&self) -> Duration {
        self.post_run_delay
    }

    /// Run the whole record phase.
    ///
    /// # Errors
    ///
    /// Any failed step aborts the recording. Logging is switched off and the
    /// file system unmounted on the way out where possible.
    pub fn record(&mut self) -> Result<Recording, RecordingError> {
        info!(
            target: "crashreplay::record",
            fs = self.target.fs.name(),
            device = %self.target.device_path.display(),
            workload = %self.workload,
            "Recording workload"
        );

        let device = self.target.device_path.to_string_lossy().into_owned();
        let mkfs = self.target.fs.mkfs_command(&device);
        self.run_step("mkfs", &mkfs)?;

        let snapshot = self.set_up()?;
        let log = self.capture_run()?;

        info!(
            target: "crashreplay::record",
            records = log.len(),
            snapshot_bytes = snapshot.len(),
            "Recording finished"
        );
        Ok(Recording { log, snapshot })
    }

    fn set_up(&mut self) -> Result<Vec<u8>, RecordingError> {
        let device = self.target.device_path.clone();
        self.mount(&device)?;

        let setup = WorkloadPhase::Setup.command(&self.workload);
        if let Err(e) = self.run_step("setup", &setup) {
            self.unmount_quietly();
            return Err(e);
        }
        self.unmount()?;

        let snapshot = self.device.read_all().map_err(RecordingError::DeviceRead)?;
        debug!(target: "crashreplay::record", bytes = snapshot.len(), "Snapshot taken");
        Ok(snapshot)
    }

    fn capture_run(&mut self) -> Result<Vec<WriteRecord>, RecordingError> {
        self.capture
            .clear_log()
            .map_err(RecordingError::CaptureControl)?;
        // Logging starts before the mount so the mount's own writes are captured
        self.capture
            .enable_logging()
            .map_err(RecordingError::CaptureControl)?;

        let capture_device = self.target.capture_device.clone();
        if let Err(e) = self.mount(&capture_device) {
            self.stop_logging_quietly();
            return Err(e);
        }

        let run = WorkloadPhase::Run {
            checkpoint: self.checkpoint,
        }
        .command(&self.workload);
        if let Err(e) = self.run_step("run", &run) {
            self.stop_logging_quietly();
            self.unmount_quietly();
            return Err(e);
        }

        if !self.post_run_delay.is_zero() {
            info!(
                target: "crashreplay::record",
                delay_secs = self.post_run_delay.as_secs_f64(),
                "Waiting for writeback"
            );
            thread::sleep(self.post_run_delay);
        }

        let drained = self
            .capture
            .disable_logging()
            .map_err(RecordingError::CaptureControl)
            .and_then(|()| drain_log(self.capture.as_mut()).map_err(RecordingError::from));
        match drained {
            Ok(log) => {
                self.unmount()?;
                Ok(log)
            }
            Err(e) => {
                self.unmount_quietly();
                Err(e)
            }
        }
    }

    fn run_step(&mut self, step: &'static str, command: &ShellCommand) -> Result<(), RecordingError> {
        debug!(target: "crashreplay::record", step, %command, "Running");
        let code = self
            .host
            .run_command(command)
            .map_err(|source| RecordingError::Spawn {
                step,
                program: command.program.clone(),
                source,
            })?;
        if code != 0 {
            return Err(RecordingError::CommandFailed { step, code });
        }
        Ok(())
    }

    fn mount(&mut self, device: &Path) -> Result<(), RecordingError> {
        self.host
            .mount(
                device,
                &self.target.mount_point,
                self.target.fs,
                &self.target.mount_options,
            )
            .map_err(|source| RecordingError::Mount {
                device: device.to_path_buf(),
                mount_point: self.target.mount_point.clone(),
                source,
            })
    }

    fn unmount(&mut self) -> Result<(), RecordingError> {
        self.host
            .unmount(&self.target.mount_point)
            .map_err(|source| RecordingError::Unmount {
                mount_point: self.target.mount_point.clone(),
                source,
            })
    }

    fn unmount_quietly(&mut self) {
        if let Err(e) = self.host.unmount(&self.target.mount_point) {
            warn!(target: "crashreplay::record", error = %e, "Cleanup unmount failed");
        }
    }

    fn stop_logging_quietly(&mut self) {
        if let Err(e) = self.capture.disable_logging() {
            warn!(target: "crashreplay::record", error = %e, "Failed to disable logging");
        }
    }
}
