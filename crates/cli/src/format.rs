//! Run results → human/json string formatting.
//!
//! Two modes:
//! - **Human** (default): aligned text, one line per record or epoch
//! - **JSON** (`--json`): `serde_json::to_string_pretty`

use crashreplay_core::WriteRecord;
use crashreplay_engine::{EpochSummary, RunStats};
use serde::Serialize;
use std::path::PathBuf;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Format the final tally of a replay run.
pub fn format_stats(stats: &RunStats, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(stats),
        OutputMode::Human => stats.to_string(),
    }
}

/// Format the epoch structure of a log.
pub fn format_epochs(epochs: &[EpochSummary], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(epochs),
        OutputMode::Human => epochs
            .iter()
            .map(|e| {
                let start = match e.first_op {
                    Some(first) => format!("@{}", first),
                    None => "-".to_string(),
                };
                format!(
                    "epoch {:>4} {:>8} {:>4} ops ({} sync, {} async) checkpoint {}{}{}",
                    e.index,
                    start,
                    e.length,
                    e.sync_ops,
                    e.async_ops,
                    e.checkpoint_epoch,
                    if e.closed { "" } else { " open" },
                    if e.overlaps { " overlapping" } else { "" },
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Format every record of a log with its decoded flags.
pub fn format_records(records: &[WriteRecord], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => {
            let rows: Vec<serde_json::Value> = records
                .iter()
                .enumerate()
                .map(|(index, r)| {
                    serde_json::json!({
                        "index": index,
                        "flags": r.flags().bits(),
                        "flag_names": r.flags().to_string(),
                        "sector": r.sector(),
                        "size": r.size(),
                    })
                })
                .collect();
            to_json(&rows)
        }
        OutputMode::Human => records
            .iter()
            .enumerate()
            .map(|(index, r)| format!("{:>6}  {}", index, r))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// What `record` wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub records: usize,
    pub epochs: usize,
    pub snapshot_bytes: usize,
    pub log_file: PathBuf,
    pub snapshot_file: PathBuf,
}

/// Format the result of a recording.
pub fn format_recording(summary: &RecordSummary, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(summary),
        OutputMode::Human => format!(
            "Recorded {} operations in {} epochs to {}\nSnapshot of {} bytes saved to {}",
            summary.records,
            summary.epochs,
            summary.log_file.display(),
            summary.snapshot_bytes,
            summary.snapshot_file.display()
        ),
    }
}

/// Format a fatal error.
pub fn format_error(err: &anyhow::Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => to_json(&serde_json::json!({ "error": format!("{:#}", err) })),
        OutputMode::Human => format!("(error) {:#}", err),
    }
}
