//! Crash-state generation and replay
//!
//! This crate turns a captured write log into crash states and tests each one:
//! - Epochs: segmenting the log at barriers into reorderable windows
//! - Permuter: legal reorderings, random swaps and random subset states
//! - Replay: restore, write, check, mount, verify, classify
//! - File systems: per-type checker commands and exit-code meaning
//! - Devices and host: raw device access, mount and subprocess control
//! - Workloads: the data checks run against every crash state
//! - Record: format, set up, snapshot and capture a workload's writes
//!
//! The engine is strictly sequential. Each test has exclusive use of the
//! device and starts from a full snapshot restore.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod device;
pub mod epoch;
pub mod error;
pub mod fs;
pub mod host;
pub mod permuter;
pub mod record;
pub mod replay;
pub mod workload;

pub use config::{ReplayConfig, CONFIG_FILE_NAME};
pub use device::{device_size, BlockDevice, FileDevice, MemDevice};
pub use epoch::{Epoch, EpochModel, EpochOp, EpochSummary};
pub use error::{ConfigError, PermuteError, RecordingError, ReplayError, WorkloadError};
pub use fs::{FsCommands, FsKind, FsckStatus, ShellCommand};
pub use host::{Host, SystemHost};
pub use permuter::{checkpoints_in, CrashState, CrashStatePermuter, PermuteMode};
pub use record::{
    run_workload_phase, RecordTarget, Recorder, Recording, SpoolCaptureSource, WorkloadPhase,
};
pub use replay::{Outcome, ReplayEngine, ReplayTarget, RunStats};
pub use workload::{
    device_shut_down, DataErrors, DataTestResult, EchoFileWorkload, Workload, WorkloadFactory,
    WorkloadRegistry,
};
