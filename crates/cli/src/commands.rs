//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};
use crashreplay_engine::{FsKind, PermuteMode, CONFIG_FILE_NAME};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("crashreplay")
        .about("Record block writes of a workload and replay them as crash states")
        .version(clap::crate_version!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Debug logging (overridden by RUST_LOG)")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_replay())
        .subcommand(build_record())
        .subcommand(build_run_workload())
        .subcommand(build_epochs())
        .subcommand(build_dump())
        .subcommand(build_init_config())
}

/// Arguments shared by `replay` and `record`.
fn target_args() -> Vec<Arg> {
    let fs_names: Vec<&'static str> = FsKind::ALL.iter().map(|fs| fs.name()).collect();
    vec![
        Arg::new("config")
            .long("config")
            .short('c')
            .help(format!(
                "Config file (default: ./{} if present)",
                CONFIG_FILE_NAME
            )),
        Arg::new("fs")
            .long("fs")
            .help(format!("File system type ({})", fs_names.join(", "))),
        Arg::new("device")
            .long("device")
            .short('d')
            .help("Device under test"),
        Arg::new("mount-point")
            .long("mount-point")
            .help("Where the file system is mounted"),
        Arg::new("mount-options")
            .long("mount-options")
            .help("Extra mount options, comma separated"),
        Arg::new("log")
            .long("log")
            .short('l')
            .help("Captured write log"),
        Arg::new("snapshot")
            .long("snapshot")
            .short('s')
            .help("Device snapshot taken before capture"),
        Arg::new("workload")
            .long("workload")
            .short('w')
            .help("Registered workload name"),
    ]
}

fn build_replay() -> Command {
    let modes = [
        PermuteMode::Exhaustive.as_str(),
        PermuteMode::Random.as_str(),
        PermuteMode::RandomSubset.as_str(),
    ];

    Command::new("replay")
        .about("Replay crash states of a captured log against the device")
        .args(target_args())
        .arg(
            Arg::new("rounds")
                .long("rounds")
                .short('r')
                .help("Number of rounds")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .short('m')
                .help(format!("Crash state generation ({})", modes.join(", "))),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("Random seed (default: derived from the clock)")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .help("Don't print a '.' per crash state")
                .action(ArgAction::SetTrue),
        )
}

fn build_record() -> Command {
    Command::new("record")
        .about("Format the device, run a workload under capture and save log and snapshot")
        .args(target_args())
        .arg(
            Arg::new("capture-device")
                .long("capture-device")
                .help("Logging wrapper device the workload runs on"),
        )
        .arg(
            Arg::new("capture-tool")
                .long("capture-tool")
                .help("Program that enables, disables and clears capture"),
        )
        .arg(
            Arg::new("capture-spool")
                .long("capture-spool")
                .help("File the capture tool spools entries to"),
        )
        .arg(
            Arg::new("checkpoint")
                .long("checkpoint")
                .help("Stop the workload after this checkpoint (0 runs to completion)")
                .value_parser(clap::value_parser!(i32))
                .default_value("0"),
        )
        .arg(
            Arg::new("post-run-delay")
                .long("post-run-delay")
                .help("Seconds to wait for writeback before logging stops")
                .value_parser(clap::value_parser!(u64)),
        )
}

/// Child side of `record`: runs one workload phase on the mounted file system.
fn build_run_workload() -> Command {
    Command::new("run-workload")
        .about("Run one phase of a workload (used by record)")
        .hide(true)
        .arg(Arg::new("workload").required(true).help("Registered workload name"))
        .arg(
            Arg::new("phase")
                .long("phase")
                .required(true)
                .value_parser(["setup", "run"]),
        )
        .arg(Arg::new("mount-point").long("mount-point").required(true))
        .arg(
            Arg::new("device-size")
                .long("device-size")
                .required(true)
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("checkpoint")
                .long("checkpoint")
                .value_parser(clap::value_parser!(i32))
                .default_value("0"),
        )
}

fn build_epochs() -> Command {
    Command::new("epochs")
        .about("Print the epoch structure of a captured log")
        .arg(Arg::new("log").required(true).help("Captured write log"))
}

fn build_dump() -> Command {
    Command::new("dump")
        .about("Print every record of a captured log")
        .arg(Arg::new("log").required(true).help("Captured write log"))
}

fn build_init_config() -> Command {
    Command::new("init-config")
        .about("Write a commented default config file")
        .arg(
            Arg::new("path")
                .help(format!("Destination (default: ./{})", CONFIG_FILE_NAME)),
        )
        .arg(
            Arg::new("force")
                .long("force")
                .short('f')
                .help("Overwrite an existing file")
                .action(ArgAction::SetTrue),
        )
}
