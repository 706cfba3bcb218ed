//! crashreplay - crash-consistency testing for file systems
//!
//! A workload runs on a file system while every block write it issues is
//! captured. crashreplay then rebuilds the device states a power loss could
//! have left behind, replays each onto a snapshot of the device, and checks
//! whether the file system and the workload's data survive.
//!
//! # Quick Start
//!
//! ```ignore
//! use crashreplay::{
//!     load_log, load_snapshot, CrashStatePermuter, EpochModel, FileDevice, ReplayEngine,
//!     ReplayTarget, RunStats, SystemHost, WorkloadRegistry,
//! };
//!
//! let log = load_log("crashreplay.log")?;
//! let model = EpochModel::new(&log);
//! let permuter = CrashStatePermuter::with_seed(&model, 42);
//!
//! let device = FileDevice::open("/dev/cow_ram_snapshot1_0")?;
//! let snapshot = load_snapshot("crashreplay.snap", device.len())?;
//! let workload = WorkloadRegistry::default().create("echo-file")?;
//!
//! let mut engine = ReplayEngine::new(permuter, snapshot, target, Box::new(device),
//!     Box::new(SystemHost), workload).with_rounds(1000);
//! let mut stats = RunStats::default();
//! engine.run(&mut stats)?;
//! println!("{}", stats);
//! ```
//!
//! # Architecture
//!
//! - `crashreplay-core`: write records and request flags
//! - `crashreplay-durability`: log codec, log files, snapshots, capture drain
//! - `crashreplay-engine`: recording, epochs, crash-state generation, replay and checks

pub use crashreplay_core::{
    byte_range, sector_offset, OpFlags, RecordError, WriteRecord, MAX_PAYLOAD_BYTES, SECTOR_SIZE,
};
pub use crashreplay_durability::{
    drain_log, load_log, load_snapshot, save_log, save_snapshot, CaptureError, CaptureSource,
    EntryMeta, LogError, LogReader, LogWriter, NextEntry, SnapshotError, VecCaptureSource,
};
pub use crashreplay_engine::{
    checkpoints_in, device_shut_down, device_size, run_workload_phase, BlockDevice, ConfigError,
    CrashState, CrashStatePermuter, DataErrors, DataTestResult, EchoFileWorkload, Epoch,
    EpochModel, EpochOp, EpochSummary, FileDevice, FsCommands, FsKind, FsckStatus, Host,
    MemDevice, Outcome, PermuteError, PermuteMode, RecordTarget, Recorder, Recording,
    RecordingError, ReplayConfig, ReplayEngine, ReplayError, ReplayTarget, RunStats,
    ShellCommand, SpoolCaptureSource, SystemHost, Workload, WorkloadError, WorkloadFactory,
    WorkloadPhase, WorkloadRegistry, CONFIG_FILE_NAME,
};
