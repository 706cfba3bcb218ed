//! ArgMatches → CliAction conversion.
//!
//! `replay` and `record` settings are layered: defaults, then the config
//! file, then flags.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use crashreplay_engine::{FsKind, PermuteMode, ReplayConfig, WorkloadPhase, CONFIG_FILE_NAME};

/// The result of parsing the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    /// Run the replay loop.
    Replay {
        config: ReplayConfig,
        progress: bool,
    },
    /// Record a workload's writes and the pre-capture snapshot.
    Record { config: ReplayConfig, checkpoint: i32 },
    /// Run one workload phase in a child process.
    RunWorkload {
        workload: String,
        phase: WorkloadPhase,
        mount_point: PathBuf,
        device_size: u64,
    },
    /// Print the epoch structure of a log.
    Epochs { log: PathBuf },
    /// Print every record of a log.
    Dump { log: PathBuf },
    /// Write the default config file.
    InitConfig { path: PathBuf, force: bool },
}

/// Convert top-level matches into an action.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction> {
    match matches.subcommand() {
        Some(("replay", sub)) => parse_replay(sub),
        Some(("record", sub)) => parse_record(sub),
        Some(("run-workload", sub)) => parse_run_workload(sub),
        Some(("epochs", sub)) => Ok(CliAction::Epochs {
            log: required_path(sub, "log")?,
        }),
        Some(("dump", sub)) => Ok(CliAction::Dump {
            log: required_path(sub, "log")?,
        }),
        Some(("init-config", sub)) => Ok(CliAction::InitConfig {
            path: sub
                .get_one::<String>("path")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME)),
            force: sub.get_flag("force"),
        }),
        Some((name, _)) => Err(anyhow!("unknown command '{}'", name)),
        None => Err(anyhow!("no command given")),
    }
}

fn required_path(matches: &ArgMatches, name: &str) -> Result<PathBuf> {
    matches
        .get_one::<String>(name)
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("missing <{}>", name))
}

fn load_config(matches: &ArgMatches) -> Result<ReplayConfig> {
    match matches.get_one::<String>("config") {
        Some(path) => Ok(ReplayConfig::from_file(Path::new(path))?),
        None if Path::new(CONFIG_FILE_NAME).exists() => {
            Ok(ReplayConfig::from_file(Path::new(CONFIG_FILE_NAME))?)
        }
        None => Ok(ReplayConfig::default()),
    }
}

fn parse_replay(matches: &ArgMatches) -> Result<CliAction> {
    let config = apply_overrides(load_config(matches)?, matches)?;
    config.validate()?;

    Ok(CliAction::Replay {
        config,
        progress: !matches.get_flag("no-progress"),
    })
}

fn parse_record(matches: &ArgMatches) -> Result<CliAction> {
    let mut config = apply_overrides(load_config(matches)?, matches)?;
    if let Some(device) = matches.get_one::<String>("capture-device") {
        config = config.with_capture_device(device);
    }
    if let Some(tool) = matches.get_one::<String>("capture-tool") {
        config.capture_tool = tool.clone();
    }
    if let Some(spool) = matches.get_one::<String>("capture-spool") {
        config.capture_spool = PathBuf::from(spool);
    }
    if let Some(&secs) = matches.get_one::<u64>("post-run-delay") {
        config = config.with_post_run_delay_secs(secs);
    }
    config.validate()?;

    Ok(CliAction::Record {
        config,
        checkpoint: matches.get_one::<i32>("checkpoint").copied().unwrap_or(0),
    })
}

fn parse_run_workload(matches: &ArgMatches) -> Result<CliAction> {
    let checkpoint = matches.get_one::<i32>("checkpoint").copied().unwrap_or(0);
    let phase = match matches.get_one::<String>("phase").map(String::as_str) {
        Some("setup") => WorkloadPhase::Setup,
        Some("run") => WorkloadPhase::Run { checkpoint },
        Some(other) => return Err(anyhow!("unknown phase '{}'", other)),
        None => return Err(anyhow!("missing --phase")),
    };
    Ok(CliAction::RunWorkload {
        workload: matches
            .get_one::<String>("workload")
            .cloned()
            .ok_or_else(|| anyhow!("missing <workload>"))?,
        phase,
        mount_point: required_path(matches, "mount-point")?,
        device_size: matches
            .get_one::<u64>("device-size")
            .copied()
            .ok_or_else(|| anyhow!("missing --device-size"))?,
    })
}

/// Value of `id` if this subcommand defines it and it was given.
fn opt<'a, T>(matches: &'a ArgMatches, id: &str) -> Option<&'a T>
where
    T: Clone + Send + Sync + 'static,
{
    matches.try_get_one::<T>(id).ok().flatten()
}

/// Apply command-line flags on top of a loaded config.
pub fn apply_overrides(mut config: ReplayConfig, matches: &ArgMatches) -> Result<ReplayConfig> {
    if let Some(fs) = opt::<String>(matches, "fs") {
        let fs: FsKind = fs.parse().map_err(|e: String| anyhow!(e))?;
        config = config.with_fs_type(fs);
    }
    if let Some(mode) = opt::<String>(matches, "mode") {
        let mode: PermuteMode = mode
            .parse()
            .map_err(|e: String| anyhow!(e))
            .context("invalid --mode")?;
        config = config.with_mode(mode);
    }
    if let Some(device) = opt::<String>(matches, "device") {
        config = config.with_device(device);
    }
    if let Some(mount_point) = opt::<String>(matches, "mount-point") {
        config = config.with_mount_point(mount_point);
    }
    if let Some(options) = opt::<String>(matches, "mount-options") {
        config = config.with_mount_options(options);
    }
    if let Some(&rounds) = opt::<usize>(matches, "rounds") {
        config = config.with_rounds(rounds);
    }
    if let Some(&seed) = opt::<u64>(matches, "seed") {
        config = config.with_seed(seed);
    }
    if let Some(log) = opt::<String>(matches, "log") {
        config = config.with_log_file(log);
    }
    if let Some(snapshot) = opt::<String>(matches, "snapshot") {
        config = config.with_snapshot_file(snapshot);
    }
    if let Some(workload) = opt::<String>(matches, "workload") {
        config = config.with_workload(workload);
    }
    if matches.get_flag("verbose") {
        config = config.with_verbose(true);
    }
    Ok(config)
}
