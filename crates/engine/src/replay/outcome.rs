//! Per-test outcomes and run-wide tallies

use serde::Serialize;
use std::fmt;

/// Classification of one crash-state test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Checker clean and data intact
    Pass,
    /// Checker repaired the file system and data is intact
    FsckFixed,
    /// The workload found corrupt data
    BadData,
    /// The checker failed, left errors, or the file system would not mount
    FsckFail,
    /// The crash state could not be set up
    TestErr,
}

impl Outcome {
    /// Short label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pass => "passed",
            Outcome::FsckFixed => "fsck fixed",
            Outcome::BadData => "bad data",
            Outcome::FsckFail => "fsck failed",
            Outcome::TestErr => "test error",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for a whole replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Crash states tested
    pub tests_run: u64,
    /// Checker or mount failures
    pub fsck_fail: u64,
    /// Workload-detected corruption
    pub bad_data: u64,
    /// Checker repairs with intact data
    pub fsck_fixed: u64,
    /// Clean passes
    pub passed: u64,
    /// Infrastructure errors
    pub errored: u64,
}

impl RunStats {
    /// Tally one outcome.
    pub fn record(&mut self, outcome: Outcome) {
        self.tests_run += 1;
        match outcome {
            Outcome::Pass => self.passed += 1,
            Outcome::FsckFixed => self.fsck_fixed += 1,
            Outcome::BadData => self.bad_data += 1,
            Outcome::FsckFail => self.fsck_fail += 1,
            Outcome::TestErr => self.errored += 1,
        }
    }

    /// Tests that found a problem in the file system under test.
    pub fn failures(&self) -> u64 {
        self.fsck_fail + self.bad_data
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ran {} tests with", self.tests_run)?;
        writeln!(f, "\t{} tests fsck failed", self.fsck_fail)?;
        writeln!(f, "\t{} tests bad data", self.bad_data)?;
        writeln!(f, "\t{} tests fsck fix", self.fsck_fixed)?;
        writeln!(f, "\t{} tests passed", self.passed)?;
        write!(f, "\t{} tests errored", self.errored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_updates_counters() {
        let mut stats = RunStats::default();
        for outcome in [
            Outcome::Pass,
            Outcome::Pass,
            Outcome::FsckFixed,
            Outcome::BadData,
            Outcome::FsckFail,
            Outcome::TestErr,
        ] {
            stats.record(outcome);
        }

        assert_eq!(stats.tests_run, 6);
        assert_eq!(stats.passed, 2);
        assert_eq!(stats.fsck_fixed, 1);
        assert_eq!(stats.bad_data, 1);
        assert_eq!(stats.fsck_fail, 1);
        assert_eq!(stats.errored, 1);
        assert_eq!(stats.failures(), 2);
    }

    #[test]
    fn test_summary_lists_every_counter() {
        let mut stats = RunStats::default();
        stats.record(Outcome::Pass);
        let text = stats.to_string();
        assert!(text.starts_with("Ran 1 tests with"));
        assert!(text.contains("1 tests passed"));
        assert!(text.contains("0 tests errored"));
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(RunStats::default()).unwrap();
        for key in ["tests_run", "fsck_fail", "bad_data", "fsck_fixed", "passed", "errored"] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(serde_json::to_string(&Outcome::FsckFixed).unwrap(), "\"fsck-fixed\"");
    }
}
