//! Epoch segmentation of a capture log
//!
//! An epoch is the run of operations between two barriers. Once a barrier
//! completes, every operation before it is durable, so reordering is only
//! ever plausible inside one epoch.
//!
//! Within an epoch, operations are split into two groups:
//! - `sync_ops`: anything carrying an ordering flag, plus reads and markers.
//!   Their relative order is fixed.
//! - `async_ops`: plain writes, free to move among themselves as long as each
//!   stays after its nearest preceding sync operation.
//!
//! Every operation lands in exactly one group of exactly one epoch. A barrier
//! is both the last entry of its epoch's `sync_ops` and the epoch's
//! `barrier_op`, and always starts a new epoch. A log ending in a barrier
//! therefore ends with an empty open epoch.

use crashreplay_core::WriteRecord;
use serde::Serialize;
use tracing::debug;

/// One operation placed in an epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochOp {
    /// Position of this operation in the captured log
    pub abs_index: usize,
    /// The captured operation
    pub write: WriteRecord,
    /// Index into the epoch's `sync_ops` of the latest sync operation at or
    /// before this one, or `None` if none precedes it in this epoch.
    ///
    /// A sync operation names itself.
    pub nearest_sync: Option<usize>,
}

/// Operations bounded by a barrier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Epoch {
    /// Total operation count, barrier included
    pub length: usize,
    /// Barrier that closed the epoch; `None` for the trailing open epoch
    pub barrier_op: Option<WriteRecord>,
    /// Operations whose relative order is fixed
    pub sync_ops: Vec<EpochOp>,
    /// Operations free to be reordered
    pub async_ops: Vec<EpochOp>,
    /// Checkpoint markers seen in the log up to the end of this epoch
    pub checkpoint_epoch: u32,
    /// Whether two data writes in this epoch touch intersecting byte ranges
    pub overlaps: bool,
}

impl Epoch {
    /// Whether a barrier closed this epoch.
    pub fn is_closed(&self) -> bool {
        self.barrier_op.is_some()
    }

    /// Log position of the first operation, if any.
    pub fn first_index(&self) -> Option<usize> {
        let sync = self.sync_ops.first().map(|op| op.abs_index);
        let async_ = self.async_ops.first().map(|op| op.abs_index);
        match (sync, async_) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// All operations in captured order.
    pub fn ops_in_order(&self) -> Vec<&EpochOp> {
        let mut ops: Vec<&EpochOp> = self.sync_ops.iter().chain(&self.async_ops).collect();
        ops.sort_by_key(|op| op.abs_index);
        ops
    }

    fn push(&mut self, abs_index: usize, write: &WriteRecord) {
        if !self.overlaps && write.is_replayable() {
            self.overlaps = self
                .sync_ops
                .iter()
                .chain(&self.async_ops)
                .any(|op| op.write.is_replayable() && op.write.overlaps(write));
        }

        let is_async = write.flags().is_async_write();
        let nearest_sync = if is_async {
            self.sync_ops.len().checked_sub(1)
        } else {
            Some(self.sync_ops.len())
        };
        let op = EpochOp {
            abs_index,
            write: write.clone(),
            nearest_sync,
        };
        if is_async {
            self.async_ops.push(op);
        } else {
            self.sync_ops.push(op);
        }
        self.length += 1;
    }
}

/// Epoch structure of a capture log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochModel {
    epochs: Vec<Epoch>,
    total_ops: usize,
}

impl EpochModel {
    /// Segment `log` into epochs. The log itself is not modified.
    pub fn new(log: &[WriteRecord]) -> Self {
        let mut epochs = Vec::new();
        let mut current = Epoch::default();
        let mut checkpoints = 0u32;

        for (i, write) in log.iter().enumerate() {
            if write.flags().is_checkpoint() {
                checkpoints += 1;
            }
            current.push(i, write);

            if write.flags().is_barrier() {
                current.barrier_op = Some(write.clone());
                current.checkpoint_epoch = checkpoints;
                epochs.push(std::mem::take(&mut current));
            }
        }
        current.checkpoint_epoch = checkpoints;
        epochs.push(current);

        debug!(
            target: "crashreplay::epoch",
            records = log.len(),
            epochs = epochs.len(),
            "Epoch model built"
        );
        EpochModel {
            epochs,
            total_ops: log.len(),
        }
    }

    /// Epochs in log order. Never empty: the trailing open epoch always exists.
    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    /// Number of epochs.
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// Whether the model was built from an empty log.
    pub fn is_empty(&self) -> bool {
        self.total_ops == 0
    }

    /// Number of operations across all epochs.
    pub fn total_ops(&self) -> usize {
        self.total_ops
    }

    /// Rebuild the captured log from the epochs.
    pub fn captured_order(&self) -> Vec<WriteRecord> {
        let mut log: Vec<Option<WriteRecord>> = vec![None; self.total_ops];
        for op in self
            .epochs
            .iter()
            .flat_map(|e| e.sync_ops.iter().chain(&e.async_ops))
        {
            log[op.abs_index] = Some(op.write.clone());
        }
        log.into_iter().flatten().collect()
    }

    /// One summary row per epoch.
    pub fn summary(&self) -> Vec<EpochSummary> {
        self.epochs
            .iter()
            .enumerate()
            .map(|(index, e)| EpochSummary {
                index,
                first_op: e.first_index(),
                length: e.length,
                sync_ops: e.sync_ops.len(),
                async_ops: e.async_ops.len(),
                closed: e.is_closed(),
                checkpoint_epoch: e.checkpoint_epoch,
                overlaps: e.overlaps,
            })
            .collect()
    }
}

/// Printable description of one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpochSummary {
    /// Epoch number
    pub index: usize,
    /// Log position of the first operation
    pub first_op: Option<usize>,
    /// Total operations
    pub length: usize,
    /// Fixed-order operations
    pub sync_ops: usize,
    /// Reorderable operations
    pub async_ops: usize,
    /// Whether a barrier closed the epoch
    pub closed: bool,
    /// Checkpoints reached by the end of the epoch
    pub checkpoint_epoch: u32,
    /// Whether data writes overlap
    pub overlaps: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crashreplay_core::{OpFlags, SECTOR_SIZE};

    fn data(sector: u64, len: usize) -> WriteRecord {
        WriteRecord::write(OpFlags::empty(), sector, vec![0xAA; len])
    }

    fn marker(flags: OpFlags) -> WriteRecord {
        WriteRecord::marker(OpFlags::WRITE | flags)
    }

    #[test]
    fn test_empty_log_has_one_open_epoch() {
        let model = EpochModel::new(&[]);
        assert_eq!(model.len(), 1);
        assert!(model.is_empty());
        assert!(!model.epochs()[0].is_closed());
        assert_eq!(model.epochs()[0].length, 0);
    }

    #[test]
    fn test_barrier_first_closes_epoch_alone() {
        let log = vec![marker(OpFlags::FLUSH), data(0, 512)];
        let model = EpochModel::new(&log);

        assert_eq!(model.len(), 2);
        let first = &model.epochs()[0];
        assert_eq!(first.length, 1);
        assert!(first.async_ops.is_empty());
        assert_eq!(first.barrier_op.as_ref(), Some(&log[0]));
        assert_eq!(model.epochs()[1].async_ops.len(), 1);
    }

    #[test]
    fn test_nearest_sync_tracking() {
        let log = vec![
            data(0, 512),
            marker(OpFlags::SYNC),
            data(8, 512),
            data(16, 512),
            marker(OpFlags::SYNC),
            data(24, 512),
        ];
        let model = EpochModel::new(&log);
        assert_eq!(model.len(), 1);

        let epoch = &model.epochs()[0];
        let floors: Vec<_> = epoch.async_ops.iter().map(|op| op.nearest_sync).collect();
        assert_eq!(floors, vec![None, Some(0), Some(0), Some(1)]);

        let sync_floors: Vec<_> = epoch.sync_ops.iter().map(|op| op.nearest_sync).collect();
        assert_eq!(sync_floors, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_reads_and_checkpoints_are_fixed() {
        let log = vec![
            WriteRecord::marker(OpFlags::empty()),
            WriteRecord::marker(OpFlags::CHECKPOINT),
            data(0, 512),
            marker(OpFlags::FUA),
        ];
        let model = EpochModel::new(&log);
        let epoch = &model.epochs()[0];

        assert_eq!(epoch.sync_ops.len(), 3);
        assert_eq!(epoch.async_ops.len(), 1);
        assert_eq!(epoch.checkpoint_epoch, 1);
        assert_eq!(model.epochs()[1].checkpoint_epoch, 1);
    }

    #[test]
    fn test_overlap_detection() {
        let disjoint = EpochModel::new(&[data(0, 512), data(1, 512)]);
        assert!(!disjoint.epochs()[0].overlaps);

        let overlapping = EpochModel::new(&[data(0, 1024), data(1, 512)]);
        assert!(overlapping.epochs()[0].overlaps);

        // Overlap across a barrier is not within one epoch
        let split = EpochModel::new(&[data(0, 1024), marker(OpFlags::FLUSH), data(1, 512)]);
        assert!(split.epochs().iter().all(|e| !e.overlaps));
    }

    #[test]
    fn test_overlap_detection_at_end_of_address_space() {
        let top = u64::MAX / SECTOR_SIZE;
        let model = EpochModel::new(&[data(top, 511), data(top - 1, 1024)]);
        assert!(model.epochs()[0].overlaps);

        let disjoint = EpochModel::new(&[data(top, 511), data(top - 8, 512)]);
        assert!(!disjoint.epochs()[0].overlaps);
    }

    #[test]
    fn test_captured_order_roundtrip() {
        let log = vec![
            data(0, 10),
            marker(OpFlags::SYNC | OpFlags::FUA),
            data(8, 15),
            marker(OpFlags::SYNC),
            data(16, 20),
            marker(OpFlags::FLUSH),
        ];
        let model = EpochModel::new(&log);
        assert_eq!(model.captured_order(), log);
        assert_eq!(model.total_ops(), 6);
    }

    #[test]
    fn test_ops_in_order_and_summary() {
        let log = vec![data(0, 10), marker(OpFlags::SYNC), data(8, 15)];
        let model = EpochModel::new(&log);

        let order: Vec<_> = model.epochs()[0]
            .ops_in_order()
            .iter()
            .map(|op| op.abs_index)
            .collect();
        assert_eq!(order, vec![0, 1, 2]);

        let summary = model.summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].first_op, Some(0));
        assert_eq!(summary[0].async_ops, 2);
        assert!(!summary[0].closed);
    }
}
