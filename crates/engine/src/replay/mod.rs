//! Crash-state replay
//!
//! Each test restores the pristine snapshot, writes one candidate ordering to
//! the raw device, runs the file-system checker, mounts, asks the workload to
//! check its data, unmounts, and classifies the result.

mod engine;
mod outcome;

pub use engine::{ReplayEngine, ReplayTarget};
pub use outcome::{Outcome, RunStats};
