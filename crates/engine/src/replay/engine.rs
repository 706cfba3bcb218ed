//! Replay state machine and outer loop

use super::outcome::{Outcome, RunStats};
use crate::device::BlockDevice;
use crate::error::ReplayError;
use crate::fs::{FsCommands, FsKind, FsckStatus};
use crate::host::Host;
use crate::permuter::{checkpoints_in, CrashStatePermuter, PermuteMode};
use crate::workload::{DataTestResult, Workload};
use crashreplay_core::WriteRecord;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const UNMOUNT_ATTEMPTS: u32 = 10;
const UNMOUNT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Where crash states are replayed and checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayTarget {
    /// File system on the device
    pub fs: FsKind,
    /// Device the checker and mount operate on
    pub device_path: PathBuf,
    /// Where the replayed file system is mounted for the workload check
    pub mount_point: PathBuf,
    /// Extra mount options, comma separated
    pub mount_options: String,
}

impl ReplayTarget {
    /// Mount options for a replayed image: the file system's own plus any
    /// configured extras.
    pub fn effective_mount_options(&self) -> String {
        let fs_options = self.fs.post_replay_mount_options();
        match (fs_options.is_empty(), self.mount_options.is_empty()) {
            (true, _) => self.mount_options.clone(),
            (false, true) => fs_options.to_string(),
            (false, false) => format!("{},{}", fs_options, self.mount_options),
        }
    }
}

/// Drives crash-state tests against one device.
///
/// The engine owns the snapshot and the device for the whole run. Every test
/// starts by restoring the snapshot, so tests are independent.
pub struct ReplayEngine<'a> {
    permuter: CrashStatePermuter<'a>,
    snapshot: Vec<u8>,
    target: ReplayTarget,
    device: Box<dyn BlockDevice>,
    host: Box<dyn Host>,
    workload: Box<dyn Workload>,
    rounds: usize,
    mode: PermuteMode,
    progress: Option<Box<dyn FnMut(Outcome) + 'a>>,
}

impl<'a> ReplayEngine<'a> {
    /// Assemble an engine. The workload is initialized with the mount point
    /// and device size.
    pub fn new(
        permuter: CrashStatePermuter<'a>,
        snapshot: Vec<u8>,
        target: ReplayTarget,
        device: Box<dyn BlockDevice>,
        host: Box<dyn Host>,
        mut workload: Box<dyn Workload>,
    ) -> Self {
        workload.init(&target.mount_point, device.len());
        ReplayEngine {
            permuter,
            snapshot,
            target,
            device,
            host,
            workload,
            rounds: 1,
            mode: PermuteMode::default(),
            progress: None,
        }
    }

    /// Number of rounds to run.
    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Crash-state generation mode.
    pub fn with_mode(mut self, mode: PermuteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Call `progress` with the outcome of every test as it finishes.
    pub fn with_progress(mut self, progress: impl FnMut(Outcome) + 'a) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Run every round, tallying outcomes into `stats`.
    ///
    /// Only infrastructure failures return `Err`; file-system findings are
    /// counted and the run continues.
    pub fn run(&mut self, stats: &mut RunStats) -> Result<(), ReplayError> {
        info!(
            target: "crashreplay::replay",
            mode = %self.mode,
            rounds = self.rounds,
            records = self.permuter.original().len(),
            epochs = self.permuter.model().len(),
            seed = self.permuter.seed(),
            "Starting replay"
        );

        match self.mode {
            PermuteMode::Exhaustive => self.run_exhaustive(stats)?,
            PermuteMode::Random => self.run_random(stats)?,
            PermuteMode::RandomSubset => self.run_subsets(stats)?,
        }

        info!(
            target: "crashreplay::replay",
            tests = stats.tests_run,
            passed = stats.passed,
            fsck_fixed = stats.fsck_fixed,
            fsck_fail = stats.fsck_fail,
            bad_data = stats.bad_data,
            errored = stats.errored,
            "Replay finished"
        );
        Ok(())
    }

    fn run_exhaustive(&mut self, stats: &mut RunStats) -> Result<(), ReplayError> {
        let original = self.permuter.original().to_vec();
        let mut candidate = original.clone();

        for round in 0..self.rounds {
            if round > 0 {
                candidate = self.permuter.permute(&candidate)?;
                if candidate == original {
                    info!(target: "crashreplay::replay", round, "All orderings tested");
                    break;
                }
            }
            self.sweep_prefixes(round, &candidate, stats)?;
        }
        Ok(())
    }

    fn run_random(&mut self, stats: &mut RunStats) -> Result<(), ReplayError> {
        let mut candidate = self.permuter.original().to_vec();

        for round in 0..self.rounds {
            if round > 0 {
                self.permuter.permute_random(&mut candidate)?;
            }
            self.sweep_prefixes(round, &candidate, stats)?;
        }
        Ok(())
    }

    fn run_subsets(&mut self, stats: &mut RunStats) -> Result<(), ReplayError> {
        for round in 0..self.rounds {
            let Some(state) = self.permuter.gen_subset_state() else {
                info!(target: "crashreplay::replay", round, "No new subset states");
                break;
            };
            let outcome = self.test_crash_state(&state.writes, state.last_checkpoint)?;
            debug!(
                target: "crashreplay::replay",
                round,
                records = state.writes.len(),
                %outcome,
                "Crash state tested"
            );
            self.tally(stats, outcome);
        }
        Ok(())
    }

    /// Test every crash point of one ordering.
    fn sweep_prefixes(
        &mut self,
        round: usize,
        candidate: &[WriteRecord],
        stats: &mut RunStats,
    ) -> Result<(), ReplayError> {
        for prefix in 0..=candidate.len() {
            let writes = &candidate[..prefix];
            let outcome = self.test_crash_state(writes, checkpoints_in(writes))?;
            debug!(target: "crashreplay::replay", round, prefix, %outcome, "Crash state tested");
            self.tally(stats, outcome);
        }
        Ok(())
    }

    fn tally(&mut self, stats: &mut RunStats, outcome: Outcome) {
        stats.record(outcome);
        if let Some(progress) = self.progress.as_mut() {
            progress(outcome);
        }
    }

    /// Run one crash state through restore, write, check and classify.
    pub fn test_crash_state(
        &mut self,
        writes: &[WriteRecord],
        last_checkpoint: u32,
    ) -> Result<Outcome, ReplayError> {
        self.device
            .restore(&self.snapshot)
            .map_err(ReplayError::SnapshotRestore)?;

        if let Err(e) = self.write_candidate(writes) {
            warn!(target: "crashreplay::replay", error = %e, "Failed to write crash state");
            return Ok(Outcome::TestErr);
        }

        let device_path = self.target.device_path.to_string_lossy();
        let fsck = self.target.fs.fsck_command(&device_path);
        let code = match self.host.run_command(&fsck) {
            Ok(code) => code,
            Err(e) => {
                warn!(target: "crashreplay::replay", program = %fsck.program, error = %e, "Failed to run checker");
                return Ok(Outcome::TestErr);
            }
        };
        let status = self.target.fs.classify_exit_code(code);
        debug!(target: "crashreplay::replay", code, ?status, "Checker finished");

        if status == FsckStatus::CheckFailed {
            return Ok(Outcome::FsckFail);
        }

        let options = self.target.effective_mount_options();
        if let Err(e) = self.host.mount(
            &self.target.device_path,
            &self.target.mount_point,
            self.target.fs,
            &options,
        ) {
            warn!(target: "crashreplay::replay", error = %e, "Replayed file system did not mount");
            return Ok(Outcome::FsckFail);
        }

        let mut result = DataTestResult::default();
        let check = self.workload.check_test(last_checkpoint, &mut result);
        self.unmount()?;

        if check < 0 {
            warn!(target: "crashreplay::replay", last_checkpoint, %result, "Workload found bad data");
            return Ok(Outcome::BadData);
        }
        if check > 0 {
            warn!(target: "crashreplay::replay", check, last_checkpoint, "Workload check did not complete");
            return Ok(Outcome::TestErr);
        }
        Ok(match status {
            FsckStatus::Clean => Outcome::Pass,
            FsckStatus::Fixed => Outcome::FsckFixed,
            FsckStatus::Unfixed | FsckStatus::CheckFailed => Outcome::FsckFail,
        })
    }

    fn write_candidate(&mut self, writes: &[WriteRecord]) -> io::Result<()> {
        for write in writes.iter().filter(|w| w.is_replayable()) {
            if let Some(payload) = write.payload() {
                self.device.write_at(write.byte_offset(), payload)?;
            }
        }
        self.device.sync()
    }

    fn unmount(&mut self) -> Result<(), ReplayError> {
        let mut attempt = 1;
        loop {
            match self.host.unmount(&self.target.mount_point) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < UNMOUNT_ATTEMPTS => {
                    debug!(target: "crashreplay::replay", attempt, error = %e, "Unmount failed, retrying");
                    attempt += 1;
                    thread::sleep(UNMOUNT_RETRY_DELAY);
                }
                Err(source) => {
                    return Err(ReplayError::Unmount {
                        mount_point: self.target.mount_point.clone(),
                        source,
                    })
                }
            }
        }
    }
}
