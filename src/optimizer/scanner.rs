use crate::solution::{Peptide, PoolIdx, ReplicateIdx, Solution};
use fnv::{FnvHashMap, FnvHashSet};
use std::collections::BTreeMap;

/// Peptide -> every peptide it has already shared a pool with.
pub type NeighborMap = FnvHashMap<Peptide, FnvHashSet<Peptide>>;

/// A peptide sitting in a pool with someone it has already met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Violation {
    pub replicate: ReplicateIdx,
    pub pool: PoolIdx,
    pub peptide: Peptide,
}

pub struct ScanReport {
    /// Repair work queue, in scan order.
    pub needs_swap: Vec<Violation>,
    /// Neighbor state after each replicate was scanned. The entry for
    /// replicate `r` covers replicates `0..=r` plus the excluded pairs.
    pub neighbor_snapshots: BTreeMap<ReplicateIdx, NeighborMap>,
}

impl ScanReport {
    pub fn total(&self) -> usize {
        self.needs_swap.len()
    }

    pub fn is_clean(&self) -> bool {
        self.needs_swap.is_empty()
    }
}

/// Builds a symmetric neighbor map from unordered pairs.
pub fn pairs_to_neighbor_map<'a, I>(pairs: I) -> NeighborMap
where
    I: IntoIterator<Item = &'a (Peptide, Peptide)>,
{
    let mut map = NeighborMap::default();
    for &(a, b) in pairs {
        map.entry(a).or_default().insert(b);
        map.entry(b).or_default().insert(a);
    }
    map
}

#[inline]
pub fn have_met(map: &NeighborMap, a: Peptide, b: Peptide) -> bool {
    map.get(&a).is_some_and(|n| n.contains(&b))
}

/// Walks every ordered pair of each pool. A pair seen for the first time is
/// recorded one direction at a time, so `(a, b)` and `(b, a)` in the same pool
/// never flag each other. A pair that was already recorded flags the second
/// peptide of the pair.
fn scan_replicate(
    solution: &Solution,
    replicate: ReplicateIdx,
    neighbors: &mut NeighborMap,
    mut on_violation: impl FnMut(Violation),
) {
    let Some(pools) = solution.assignments().get(&replicate) else {
        return;
    };
    for (&pool, peptides) in pools {
        for &p1 in peptides {
            for &p2 in peptides {
                if p1 == p2 {
                    continue;
                }
                let seen = neighbors.entry(p1).or_default();
                if seen.contains(&p2) {
                    on_violation(Violation {
                        replicate,
                        pool,
                        peptide: p2,
                    });
                } else {
                    seen.insert(p2);
                }
            }
        }
    }
}

/// Finds every peptide that repeats a co-occurrence, scanning replicates in
/// ascending order and treating excluded pairs as already met.
pub fn find_violating_peptides(solution: &Solution) -> ScanReport {
    let mut neighbors = pairs_to_neighbor_map(solution.invalid_neighbors());
    let mut needs_swap = Vec::new();
    let mut neighbor_snapshots = BTreeMap::new();

    for &replicate in solution.assignments().keys() {
        scan_replicate(solution, replicate, &mut neighbors, |v| needs_swap.push(v));
        neighbor_snapshots.insert(replicate, neighbors.clone());
    }

    ScanReport {
        needs_swap,
        neighbor_snapshots,
    }
}

/// Same walk as [`find_violating_peptides`] without the snapshots.
/// Every replicate gets an entry, including clean ones.
pub fn count_violations_per_replicate(solution: &Solution) -> BTreeMap<ReplicateIdx, usize> {
    let mut neighbors = pairs_to_neighbor_map(solution.invalid_neighbors());
    let mut counts = BTreeMap::new();

    for &replicate in solution.assignments().keys() {
        let mut count = 0;
        scan_replicate(solution, replicate, &mut neighbors, |_| count += 1);
        counts.insert(replicate, count);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(replicates: Vec<Vec<Vec<Peptide>>>, invalid: Vec<(Peptide, Peptide)>) -> Solution {
        Solution::from_nested(8, invalid, replicates).unwrap()
    }

    #[test]
    fn test_first_cooccurrence_is_free() {
        let s = build(vec![vec![vec![0, 1, 2], vec![3, 4]]], vec![]);
        let scan = find_violating_peptides(&s);
        assert!(scan.is_clean());
        assert!(have_met(&scan.neighbor_snapshots[&0], 0, 2));
        assert!(have_met(&scan.neighbor_snapshots[&0], 2, 0));
        assert!(!have_met(&scan.neighbor_snapshots[&0], 0, 3));
    }

    #[test]
    fn test_repeat_flags_both_members() {
        let s = build(
            vec![vec![vec![0, 1], vec![2, 3]], vec![vec![0, 1], vec![2], vec![3]]],
            vec![],
        );
        let scan = find_violating_peptides(&s);
        let mut flagged: Vec<_> = scan.needs_swap.iter().map(|v| v.peptide).collect();
        flagged.sort();
        assert_eq!(flagged, vec![0, 1]);
        assert!(scan
            .needs_swap
            .iter()
            .all(|v| v.replicate == 1 && v.pool == 0));
    }

    #[test]
    fn test_invalid_pairs_count_as_met() {
        let s = build(vec![vec![vec![0, 1, 2]]], vec![(2, 0)]);
        let counts = count_violations_per_replicate(&s);
        assert_eq!(counts[&0], 2);
    }

    #[test]
    fn test_snapshots_accumulate_in_replicate_order() {
        let s = build(
            vec![vec![vec![0, 1], vec![2, 3]], vec![vec![0, 2], vec![1, 3]]],
            vec![],
        );
        let scan = find_violating_peptides(&s);
        assert!(!have_met(&scan.neighbor_snapshots[&0], 0, 2));
        assert!(have_met(&scan.neighbor_snapshots[&1], 0, 2));
        assert!(have_met(&scan.neighbor_snapshots[&1], 0, 1));
    }

    #[test]
    fn test_counts_cover_clean_replicates() {
        let s = build(vec![vec![vec![0, 1]], vec![vec![0], vec![1]]], vec![]);
        let counts = count_violations_per_replicate(&s);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.values().sum::<usize>(), 0);
    }
}
