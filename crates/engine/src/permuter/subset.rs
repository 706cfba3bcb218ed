//! Random-subset crash states
//!
//! A subset state replays some number of whole epochs in captured order, then
//! an order-preserving random subset of the next epoch's operations. The
//! closing barrier is only included when the whole epoch is chosen. States are
//! de-duplicated by the log positions they contain.

use super::{checkpoints_in, CrashStatePermuter};
use crashreplay_core::WriteRecord;
use rand::seq::index::sample;
use rand::Rng;
use tracing::{debug, info};

/// Minimum attempts to find an unseen state before giving up.
const MIN_RETRIES: usize = 1000;

/// Attempts allowed per state already generated, once past `MIN_RETRIES`.
const RETRY_MULTIPLIER: usize = 2;

/// One generated crash state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashState {
    /// Writes to replay, in order
    pub writes: Vec<WriteRecord>,
    /// Checkpoints reached by `writes`
    pub last_checkpoint: u32,
    /// Log position of each write
    pub log_indices: Vec<usize>,
}

impl<'a> CrashStatePermuter<'a> {
    /// Generate a crash state not returned before.
    ///
    /// Returns `None` once `max(1000, 2 * generated)` consecutive attempts
    /// produce only states already seen.
    pub fn gen_subset_state(&mut self) -> Option<CrashState> {
        let model = self.model;
        let epochs = model.epochs();
        let max_retries = MIN_RETRIES.max(RETRY_MULTIPLIER * self.completed.len());

        for _ in 0..max_retries {
            let count = self.rng.gen_range(1..=epochs.len());
            let target = &epochs[count - 1];
            let chosen = self.rng.gen_range(0..=target.length);

            let mut indices: Vec<usize> = epochs[..count - 1]
                .iter()
                .flat_map(|e| e.sync_ops.iter().chain(&e.async_ops))
                .map(|op| op.abs_index)
                .collect();
            indices.sort_unstable();

            let ordered = target.ops_in_order();
            if chosen == target.length {
                indices.extend(ordered.iter().map(|op| op.abs_index));
            } else {
                let pool = if target.is_closed() {
                    &ordered[..ordered.len() - 1]
                } else {
                    &ordered[..]
                };
                let mut picks = sample(&mut self.rng, pool.len(), chosen.min(pool.len())).into_vec();
                picks.sort_unstable();
                indices.extend(picks.into_iter().map(|i| pool[i].abs_index));
            }

            if self.completed.insert(indices.clone()) {
                let writes: Vec<WriteRecord> =
                    indices.iter().map(|&i| self.original[i].clone()).collect();
                let last_checkpoint = checkpoints_in(&writes);
                debug!(
                    target: "crashreplay::permute",
                    epochs = count,
                    records = writes.len(),
                    "Generated subset state"
                );
                return Some(CrashState {
                    writes,
                    last_checkpoint,
                    log_indices: indices,
                });
            }
        }

        info!(
            target: "crashreplay::permute",
            states = self.completed.len(),
            "Subset state space exhausted"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::EpochModel;
    use crashreplay_core::OpFlags;
    use std::collections::HashSet;

    fn data(byte: u8) -> WriteRecord {
        WriteRecord::write(OpFlags::empty(), byte as u64, vec![byte; 8])
    }

    fn flush() -> WriteRecord {
        WriteRecord::marker(OpFlags::WRITE | OpFlags::FLUSH)
    }

    #[test]
    fn test_states_are_unique_and_ordered() {
        let log = vec![data(1), data(2), flush(), data(3), data(4), data(5)];
        let model = EpochModel::new(&log);
        let mut permuter = CrashStatePermuter::with_seed(&model, 9);

        let mut seen = HashSet::new();
        while let Some(state) = permuter.gen_subset_state() {
            assert!(state.log_indices.windows(2).all(|w| w[0] < w[1]));
            assert!(seen.insert(state.log_indices.clone()));
            assert_eq!(state.writes.len(), state.log_indices.len());
        }
        // Epoch 0 subsets without its barrier: 4; epoch 0 whole: 1 (shared with
        // epoch 1 choosing nothing); epoch 1 non-empty subsets: 7
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn test_barrier_only_with_whole_epoch() {
        let log = vec![data(1), data(2), flush(), data(3)];
        let model = EpochModel::new(&log);
        let mut permuter = CrashStatePermuter::with_seed(&model, 5);

        while let Some(state) = permuter.gen_subset_state() {
            if state.log_indices.contains(&2) {
                assert!(state.log_indices.starts_with(&[0, 1, 2]));
            }
        }
    }

    #[test]
    fn test_last_checkpoint_counts_included_markers() {
        let log = vec![
            WriteRecord::marker(OpFlags::CHECKPOINT),
            data(1),
            flush(),
            WriteRecord::marker(OpFlags::CHECKPOINT),
        ];
        let model = EpochModel::new(&log);
        let mut permuter = CrashStatePermuter::with_seed(&model, 11);

        while let Some(state) = permuter.gen_subset_state() {
            assert_eq!(state.last_checkpoint, checkpoints_in(&state.writes));
        }
    }

    #[test]
    fn test_empty_log_yields_one_empty_state() {
        let model = EpochModel::new(&[]);
        let mut permuter = CrashStatePermuter::with_seed(&model, 1);

        let first = permuter.gen_subset_state().unwrap();
        assert!(first.writes.is_empty());
        assert!(permuter.gen_subset_state().is_none());
    }
}
