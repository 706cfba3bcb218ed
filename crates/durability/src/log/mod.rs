//! Capture log files
//!
//! A capture log is the ordered sequence of `WriteRecord`s recorded while a
//! workload ran. Files are written strictly append-only and read back in the
//! same order; the byte format lives in [`crate::format`].

mod reader;
mod writer;

pub use reader::{load_log, LogReader};
pub use writer::{save_log, LogWriter};
