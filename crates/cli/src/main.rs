//! crashreplay: replay captured block writes as crash states.
//!
//! Subcommands:
//! - `record`: format the device, run a workload under capture, save the log
//!   and the snapshot
//! - `replay`: run the crash-state loop against a device and print the tally
//! - `epochs`: print the epoch structure of a captured log
//! - `dump`: print every record of a captured log
//! - `init-config`: write a commented default `crashreplay.toml`
//!
//! A hidden `run-workload` subcommand is the child process `record` starts
//! for each workload phase.
//!
//! Exits 0 when a run completes, whatever it found, and 1 on a fatal error.

mod commands;
mod format;
mod parse;

use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crashreplay_durability::{load_log, load_snapshot};
use crashreplay_engine::{
    device_size, run_workload_phase, CrashStatePermuter, EpochModel, FileDevice, Outcome,
    RecordTarget, Recorder, ReplayConfig, ReplayEngine, ReplayError, ReplayTarget, RunStats,
    ShellCommand, SpoolCaptureSource, SystemHost, WorkloadPhase, WorkloadRegistry,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use format::{
    format_epochs, format_error, format_recording, format_records, format_stats, OutputMode,
    RecordSummary,
};
use parse::{matches_to_action, CliAction};

fn main() {
    let matches = build_cli().get_matches();

    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(1);
        }
    };

    let verbose = match &action {
        CliAction::Replay { config, .. } | CliAction::Record { config, .. } => config.verbose,
        _ => matches.get_flag("verbose"),
    };
    init_tracing(verbose);

    if let Err(e) = execute(action, mode) {
        eprintln!("{}", format_error(&e, mode));
        process::exit(1);
    }
}

/// Logs go to stderr so stdout carries only results and progress dots.
/// Workload children log to stderr too, where `record` collects it.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn execute(action: CliAction, mode: OutputMode) -> Result<()> {
    match action {
        CliAction::Replay { config, progress } => {
            let stats = run_replay(&config, progress && mode == OutputMode::Human)?;
            println!("{}", format_stats(&stats, mode));
        }
        CliAction::Record { config, checkpoint } => {
            let summary = run_record(&config, checkpoint)?;
            println!("{}", format_recording(&summary, mode));
        }
        CliAction::RunWorkload {
            workload,
            phase,
            mount_point,
            device_size,
        } => run_workload(&workload, phase, &mount_point, device_size)?,
        CliAction::Epochs { log } => {
            let records = load_log(&log).with_context(|| format!("loading {}", log.display()))?;
            let model = EpochModel::new(&records);
            println!("{}", format_epochs(&model.summary(), mode));
        }
        CliAction::Dump { log } => {
            let records = load_log(&log).with_context(|| format!("loading {}", log.display()))?;
            println!("{}", format_records(&records, mode));
        }
        CliAction::InitConfig { path, force } => init_config(&path, force)?,
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if force {
        std::fs::write(path, ReplayConfig::default_toml())
            .with_context(|| format!("writing {}", path.display()))?;
    } else if !ReplayConfig::write_default_if_missing(path)? {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    info!(target: "crashreplay::replay", path = %path.display(), "Wrote default config");
    Ok(())
}

fn run_replay(config: &ReplayConfig, progress: bool) -> Result<RunStats> {
    let log = load_log(&config.log_file).map_err(ReplayError::from)?;

    let device_len = device_size(&config.device).map_err(|source| ReplayError::DeviceSize {
        path: config.device.clone(),
        source,
    })?;
    let snapshot = load_snapshot(&config.snapshot_file, device_len).map_err(ReplayError::from)?;
    let device = FileDevice::open(&config.device).map_err(|source| ReplayError::DeviceOpen {
        path: config.device.clone(),
        source,
    })?;

    let registry = WorkloadRegistry::default();
    let workload = registry.create(&config.workload).map_err(ReplayError::from)?;

    let model = EpochModel::new(&log);
    let permuter = match config.seed {
        Some(seed) => CrashStatePermuter::with_seed(&model, seed),
        None => CrashStatePermuter::new(&model),
    };

    let target = ReplayTarget {
        fs: config.fs_type,
        device_path: config.device.clone(),
        mount_point: config.mount_point.clone(),
        mount_options: config.mount_options.clone(),
    };

    let mut engine = ReplayEngine::new(
        permuter,
        snapshot,
        target,
        Box::new(device),
        Box::new(SystemHost),
        workload,
    )
    .with_rounds(config.rounds)
    .with_mode(config.mode);
    if progress {
        engine = engine.with_progress(print_progress);
    }

    let mut stats = RunStats::default();
    engine.run(&mut stats)?;
    if progress {
        println!();
    }
    Ok(stats)
}

/// One '.' per finished crash state.
fn print_progress(_outcome: Outcome) {
    let mut out = io::stdout().lock();
    if let Err(e) = out.write_all(b".").and_then(|()| out.flush()) {
        debug!(target: "crashreplay::replay", error = %e, "Progress output failed");
    }
}

fn run_record(config: &ReplayConfig, checkpoint: i32) -> Result<RecordSummary> {
    // Fail on an unknown workload before touching the device
    WorkloadRegistry::default().create(&config.workload)?;

    let device_len = device_size(&config.device)
        .with_context(|| format!("determining size of {}", config.device.display()))?;
    let device = FileDevice::open(&config.device)
        .with_context(|| format!("opening {}", config.device.display()))?;
    let exe = std::env::current_exe().context("locating the crashreplay binary")?;

    let mut child = ShellCommand::new(exe.to_string_lossy())
        .arg("run-workload")
        .arg(config.workload.as_str())
        .arg("--mount-point")
        .arg(config.mount_point.to_string_lossy())
        .arg("--device-size")
        .arg(device_len.to_string());
    if config.verbose {
        child = child.arg("--verbose");
    }

    let capture = SpoolCaptureSource::new(
        config.capture_tool.as_str(),
        &config.capture_device,
        &config.capture_spool,
    );
    let target = RecordTarget {
        fs: config.fs_type,
        device_path: config.device.clone(),
        capture_device: config.capture_device.clone(),
        mount_point: config.mount_point.clone(),
        mount_options: config.mount_options.clone(),
    };

    let mut recorder = Recorder::new(
        target,
        Box::new(device),
        Box::new(SystemHost),
        Box::new(capture),
        child,
    )
    .with_checkpoint(checkpoint);
    if let Some(secs) = config.post_run_delay_secs {
        recorder = recorder.with_post_run_delay(Duration::from_secs(secs));
    }

    let recording = recorder.record()?;
    recording.save(&config.log_file, &config.snapshot_file)?;

    Ok(RecordSummary {
        records: recording.log.len(),
        epochs: EpochModel::new(&recording.log).len(),
        snapshot_bytes: recording.snapshot.len(),
        log_file: config.log_file.clone(),
        snapshot_file: config.snapshot_file.clone(),
    })
}

fn run_workload(
    name: &str,
    phase: WorkloadPhase,
    mount_point: &Path,
    device_size: u64,
) -> Result<()> {
    let mut workload = WorkloadRegistry::default().create(name)?;
    run_workload_phase(workload.as_mut(), phase, mount_point, device_size)
        .with_context(|| format!("{} phase of workload '{}'", phase, name))?;
    Ok(())
}
