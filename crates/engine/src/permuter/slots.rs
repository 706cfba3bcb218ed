//! Reorderable slots of one epoch
//!
//! Sync operations never move, so the async operations of an epoch can only
//! trade places among the log positions they originally occupied: the
//! epoch's slots. Slot `t` is where async op `t` was captured.
//!
//! Each slot has a floor, the nearest sync operation before it. Because sync
//! operations only accumulate while walking an epoch, floors never decrease
//! from one slot to the next. Async op `i` may occupy slot `t` iff
//! `floor(i) <= floor(t)`: moving later past sync operations is allowed,
//! moving before its own sync operation is not.
//!
//! An assignment maps slot -> op. The identity assignment is the captured
//! order and is the lexicographically smallest legal one.
//!
//! Byte-identical writes make several assignments encode the same ordering.
//! Only the canonical one, where equal writes keep their captured relative
//! order, is ever emitted.

use crate::epoch::Epoch;

/// Slot positions and floors for one epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SlotLayout {
    /// Log position of each slot
    pub positions: Vec<usize>,
    /// Floor of each slot, equal to the floor of the op captured there
    floors: Vec<Option<usize>>,
    /// Lowest op index holding an equal write, per op
    classes: Vec<usize>,
}

impl SlotLayout {
    pub fn from_epoch(epoch: &Epoch) -> Self {
        SlotLayout {
            positions: epoch.async_ops.iter().map(|op| op.abs_index).collect(),
            floors: epoch.async_ops.iter().map(|op| op.nearest_sync).collect(),
            classes: (0..epoch.async_ops.len())
                .map(|i| {
                    let write = &epoch.async_ops[i].write;
                    (0..i)
                        .find(|&j| &epoch.async_ops[j].write == write)
                        .unwrap_or(i)
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn identity(&self) -> Vec<usize> {
        (0..self.len()).collect()
    }

    pub fn is_legal(&self, op: usize, slot: usize) -> bool {
        self.floors[op] <= self.floors[slot]
    }

    /// Next legal assignment after `current` in lexicographic order.
    ///
    /// Finds the rightmost slot that can take a larger unused op while the
    /// slots after it can still be filled, then fills those slots with the
    /// smallest legal completion.
    pub fn next_assignment(&self, current: &[usize]) -> Option<Vec<usize>> {
        let k = self.len();
        debug_assert_eq!(current.len(), k);

        for t in (0..k).rev() {
            let mut used = vec![false; k];
            for &op in &current[..t] {
                used[op] = true;
            }

            for j in current[t] + 1..k {
                if used[j] || !self.is_legal(j, t) {
                    continue;
                }
                used[j] = true;
                if self.feasible(&used, t + 1) {
                    if let Some(rest) = self.smallest_completion(&used, t + 1) {
                        let mut next = current[..t].to_vec();
                        next.push(j);
                        next.extend(rest);
                        return Some(next);
                    }
                }
                used[j] = false;
            }
        }
        None
    }

    /// Whether equal writes appear in captured relative order.
    pub fn is_canonical(&self, assignment: &[usize]) -> bool {
        let mut last: Vec<Option<usize>> = vec![None; self.len()];
        for &op in assignment {
            let class = self.classes[op];
            if last[class].map_or(false, |prev| prev > op) {
                return false;
            }
            last[class] = Some(op);
        }
        true
    }

    /// Slot pairs `(s, t)`, `s < t`, whose ops can trade places legally.
    pub fn legal_swaps(&self, assignment: &[usize]) -> Vec<(usize, usize)> {
        let mut swaps = Vec::new();
        for s in 0..assignment.len() {
            for t in s + 1..assignment.len() {
                if self.is_legal(assignment[t], s) && self.is_legal(assignment[s], t) {
                    swaps.push((s, t));
                }
            }
        }
        swaps
    }

    /// Whether the unused ops can fill slots `from..` legally.
    ///
    /// Pairing both sides in ascending floor order is optimal, so one sorted
    /// comparison decides it.
    fn feasible(&self, used: &[bool], from: usize) -> bool {
        let mut ops: Vec<Option<usize>> = (0..self.len())
            .filter(|&i| !used[i])
            .map(|i| self.floors[i])
            .collect();
        ops.sort_unstable();
        ops.iter()
            .zip(&self.floors[from..])
            .all(|(op, slot)| op <= slot)
    }

    fn smallest_completion(&self, used: &[bool], from: usize) -> Option<Vec<usize>> {
        let mut used = used.to_vec();
        let mut rest = Vec::with_capacity(self.len() - from);

        for slot in from..self.len() {
            let mut placed = false;
            for op in 0..self.len() {
                if used[op] || !self.is_legal(op, slot) {
                    continue;
                }
                used[op] = true;
                if self.feasible(&used, slot + 1) {
                    rest.push(op);
                    placed = true;
                    break;
                }
                used[op] = false;
            }
            if !placed {
                return None;
            }
        }
        Some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(floors: Vec<Option<usize>>) -> SlotLayout {
        SlotLayout {
            positions: (0..floors.len()).collect(),
            classes: (0..floors.len()).collect(),
            floors,
        }
    }

    fn walk(layout: &SlotLayout) -> Vec<Vec<usize>> {
        let mut seen = vec![layout.identity()];
        let mut current = layout.identity();
        while let Some(next) = layout.next_assignment(&current) {
            seen.push(next.clone());
            current = next;
        }
        seen
    }

    #[test]
    fn test_unconstrained_walk_is_all_permutations() {
        let all = walk(&layout(vec![None, None, None]));
        assert_eq!(
            all,
            vec![
                vec![0, 1, 2],
                vec![0, 2, 1],
                vec![1, 0, 2],
                vec![1, 2, 0],
                vec![2, 0, 1],
                vec![2, 1, 0],
            ]
        );
    }

    #[test]
    fn test_floor_blocks_early_placement() {
        // op 1 follows sync 0 and may not move into slot 0
        let l = layout(vec![None, Some(0)]);
        assert!(l.is_legal(0, 1));
        assert!(!l.is_legal(1, 0));
        assert_eq!(walk(&l), vec![vec![0, 1]]);
    }

    #[test]
    fn test_mixed_floors_count() {
        // Slots 0,1 have no floor; slot 2 sits after a sync.
        // Op 2 must stay in slot 2; ops 0 and 1 can be anywhere.
        let l = layout(vec![None, None, Some(0)]);
        let all = walk(&l);
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|a| a[2] == 2));
    }

    #[test]
    fn test_single_and_empty_have_no_successor() {
        assert!(layout(vec![None]).next_assignment(&[0]).is_none());
        assert!(layout(vec![]).next_assignment(&[]).is_none());
    }

    #[test]
    fn test_canonical_keeps_equal_writes_ordered() {
        let mut l = layout(vec![None, None, None]);
        // ops 0 and 2 hold equal writes
        l.classes = vec![0, 1, 0];
        assert!(l.is_canonical(&[0, 1, 2]));
        assert!(l.is_canonical(&[1, 0, 2]));
        assert!(!l.is_canonical(&[2, 1, 0]));
        assert!(!l.is_canonical(&[1, 2, 0]));
    }

    #[test]
    fn test_legal_swaps_respect_floors() {
        let l = layout(vec![None, Some(0), Some(0)]);
        let swaps = l.legal_swaps(&l.identity());
        assert_eq!(swaps, vec![(1, 2)]);
    }
}
