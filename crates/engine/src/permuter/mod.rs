//! Crash-state generation
//!
//! The permuter turns one captured log into a stream of candidate orderings,
//! each a legal reordering of async writes inside their epochs. It borrows the
//! epoch model and owns only its random engine and bookkeeping.
//!
//! Three generators are offered:
//! - [`CrashStatePermuter::permute`]: deterministic walk over every legal
//!   ordering, trailing epoch varying fastest
//! - [`CrashStatePermuter::permute_random`]: one random legal swap per call
//! - [`CrashStatePermuter::gen_subset_state`]: random prefix-of-epochs plus
//!   an order-preserving subset of one epoch, de-duplicated

mod slots;
mod subset;

use crate::epoch::EpochModel;
use crate::error::PermuteError;
use crashreplay_core::WriteRecord;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use slots::SlotLayout;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

pub use subset::CrashState;

/// How the replay loop walks the crash-state space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermuteMode {
    /// Every legal ordering, one per round, until the walk wraps around
    #[default]
    Exhaustive,
    /// One random legal swap per round, accumulated across rounds
    Random,
    /// One random epoch-prefix subset per round
    RandomSubset,
}

impl PermuteMode {
    /// Config/CLI spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            PermuteMode::Exhaustive => "exhaustive",
            PermuteMode::Random => "random",
            PermuteMode::RandomSubset => "random-subset",
        }
    }
}

impl fmt::Display for PermuteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermuteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exhaustive" => Ok(PermuteMode::Exhaustive),
            "random" => Ok(PermuteMode::Random),
            "random-subset" | "random_subset" => Ok(PermuteMode::RandomSubset),
            other => Err(format!(
                "unknown permute mode '{}', expected exhaustive, random or random-subset",
                other
            )),
        }
    }
}

/// Number of checkpoint markers in `writes`.
pub fn checkpoints_in(writes: &[WriteRecord]) -> u32 {
    writes.iter().filter(|w| w.flags().is_checkpoint()).count() as u32
}

/// Generator of legal crash orderings for one epoch model.
pub struct CrashStatePermuter<'a> {
    model: &'a EpochModel,
    original: Vec<WriteRecord>,
    layouts: Vec<SlotLayout>,
    rng: ChaCha8Rng,
    seed: u64,
    completed: HashSet<Vec<usize>>,
}

impl<'a> CrashStatePermuter<'a> {
    /// Permuter seeded from the current time.
    pub fn new(model: &'a EpochModel) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::with_seed(model, seed)
    }

    /// Permuter with a fixed seed, for reproducible runs.
    pub fn with_seed(model: &'a EpochModel, seed: u64) -> Self {
        info!(target: "crashreplay::permute", seed, epochs = model.len(), "Permuter seeded");
        CrashStatePermuter {
            model,
            original: model.captured_order(),
            layouts: model.epochs().iter().map(SlotLayout::from_epoch).collect(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            completed: HashSet::new(),
        }
    }

    /// Seed of the random engine.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The model being permuted.
    pub fn model(&self) -> &'a EpochModel {
        self.model
    }

    /// The captured order.
    pub fn original(&self) -> &[WriteRecord] {
        &self.original
    }

    /// Next legal ordering after `candidate_in`.
    ///
    /// Orderings are walked in lexicographic order of each epoch's slot
    /// assignment, the last epoch varying fastest; when an epoch wraps, every
    /// later epoch is reset to captured order. Once every epoch has wrapped
    /// the captured order is returned, which the caller detects to stop.
    pub fn permute(&self, candidate_in: &[WriteRecord]) -> Result<Vec<WriteRecord>, PermuteError> {
        let mut assignments = self.decode(candidate_in)?;

        while self.advance(&mut assignments) {
            let canonical = self
                .layouts
                .iter()
                .zip(&assignments)
                .all(|(layout, assignment)| layout.is_canonical(assignment));
            if canonical {
                return Ok(self.encode(&assignments));
            }
        }

        debug!(target: "crashreplay::permute", "Ordering space exhausted");
        Ok(self.original.clone())
    }

    /// Step the per-epoch odometer. Returns false once every epoch has wrapped.
    fn advance(&self, assignments: &mut [Vec<usize>]) -> bool {
        for e in (0..self.layouts.len()).rev() {
            if let Some(next) = self.layouts[e].next_assignment(&assignments[e]) {
                assignments[e] = next;
                for later in e + 1..self.layouts.len() {
                    assignments[later] = self.layouts[later].identity();
                }
                debug!(target: "crashreplay::permute", epoch = e, "Advanced ordering");
                return true;
            }
        }
        false
    }

    /// Apply one random legal swap of two distinct async writes to `candidate`.
    ///
    /// Leaves `candidate` unchanged when no such swap exists.
    pub fn permute_random(&mut self, candidate: &mut Vec<WriteRecord>) -> Result<(), PermuteError> {
        let assignments = self.decode(candidate)?;

        let mut swaps = Vec::new();
        for (layout, assignment) in self.layouts.iter().zip(&assignments) {
            for (s, t) in layout.legal_swaps(assignment) {
                let (a, b) = (layout.positions[s], layout.positions[t]);
                if candidate[a] != candidate[b] {
                    swaps.push((a, b));
                }
            }
        }

        if swaps.is_empty() {
            return Ok(());
        }
        let (a, b) = swaps[self.rng.gen_range(0..swaps.len())];
        candidate.swap(a, b);
        debug!(target: "crashreplay::permute", a, b, "Swapped async writes");
        Ok(())
    }

    /// Map `candidate` back to one slot assignment per epoch.
    ///
    /// Equal records are matched lowest op index first, which yields a legal
    /// assignment whenever one exists.
    fn decode(&self, candidate: &[WriteRecord]) -> Result<Vec<Vec<usize>>, PermuteError> {
        if candidate.len() != self.original.len() {
            return Err(PermuteError::LengthMismatch {
                expected: self.original.len(),
                actual: candidate.len(),
            });
        }

        let mut is_slot = vec![false; candidate.len()];
        for layout in &self.layouts {
            for &p in &layout.positions {
                is_slot[p] = true;
            }
        }
        if let Some(index) = (0..candidate.len()).find(|&p| !is_slot[p] && candidate[p] != self.original[p]) {
            return Err(PermuteError::ForeignRecord { index });
        }

        let mut assignments = Vec::with_capacity(self.layouts.len());
        for (epoch, layout) in self.model.epochs().iter().zip(&self.layouts) {
            let ops = &epoch.async_ops;
            let mut used = vec![false; ops.len()];
            let mut assignment = Vec::with_capacity(ops.len());

            for (slot, &p) in layout.positions.iter().enumerate() {
                let op = (0..ops.len())
                    .find(|&j| !used[j] && ops[j].write == candidate[p])
                    .ok_or(PermuteError::ForeignRecord { index: p })?;
                if !layout.is_legal(op, slot) {
                    return Err(PermuteError::IllegalPlacement { index: p });
                }
                used[op] = true;
                assignment.push(op);
            }
            assignments.push(assignment);
        }
        Ok(assignments)
    }

    fn encode(&self, assignments: &[Vec<usize>]) -> Vec<WriteRecord> {
        let mut out = self.original.clone();
        for ((epoch, layout), assignment) in self.model.epochs().iter().zip(&self.layouts).zip(assignments) {
            for (slot, &op) in assignment.iter().enumerate() {
                out[layout.positions[slot]] = epoch.async_ops[op].write.clone();
            }
        }
        out
    }
}
