use crate::optimizer::scanner::count_violations_per_replicate;
use crate::solution::{ReplicateIdx, Solution};
use std::collections::BTreeMap;

/// Violation count for every replicate, clean ones included.
pub fn violations_per_replicate(solution: &Solution) -> BTreeMap<ReplicateIdx, usize> {
    count_violations_per_replicate(solution)
}

pub fn count_violations(solution: &Solution) -> usize {
    violations_per_replicate(solution).values().sum()
}

/// True when no pair of peptides shares a pool more than once across all
/// replicates and no excluded pair shares a pool at all.
pub fn is_valid(solution: &Solution) -> bool {
    count_violations(solution) == 0
}
