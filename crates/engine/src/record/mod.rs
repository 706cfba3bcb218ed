//! Recording a workload's writes
//!
//! Recording formats the device, runs the workload's setup in a child process,
//! snapshots the device, then runs the workload again with capture enabled on
//! the logging wrapper device. The result is the pristine snapshot plus the
//! captured write log that replay consumes.

mod phase;
mod recorder;
mod spool;

pub use phase::{run_workload_phase, WorkloadPhase};
pub use recorder::{RecordTarget, Recorder, Recording};
pub use spool::SpoolCaptureSource;
