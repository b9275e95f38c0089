#![allow(dead_code)]

use poolforge::init::{init, InitStrategy};
use poolforge::solution::{Peptide, Solution};
use std::collections::BTreeSet;

/// Items 0..8 in two replicates where only 0 and 1 share a pool twice.
pub fn single_collision() -> Solution {
    Solution::from_nested(
        4,
        [],
        vec![
            vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]],
            vec![vec![0, 1, 6], vec![2, 4], vec![3, 5], vec![7]],
        ],
    )
    .unwrap()
}

pub fn random_start(
    num_peptides: usize,
    capacity: usize,
    num_replicates: usize,
    seed: u64,
) -> Solution {
    let mut rng = fastrand::Rng::with_seed(seed);
    let invalid: [(Peptide, Peptide); 0] = [];
    init(
        num_peptides,
        capacity,
        num_replicates,
        InitStrategy::Random,
        &invalid,
        &mut rng,
    )
    .unwrap()
}

/// Every replicate holds exactly `expected`, each peptide once.
pub fn assert_partition(solution: &Solution, expected: &BTreeSet<Peptide>) {
    for (&replicate, pools) in solution.assignments() {
        let count: usize = pools.values().map(|p| p.len()).sum();
        assert_eq!(count, expected.len(), "replicate {} has duplicates", replicate);
        assert_eq!(
            &solution.replicate_peptides(replicate).unwrap(),
            expected,
            "replicate {} lost or gained peptides",
            replicate
        );
    }
}

pub fn assert_capacity(solution: &Solution) {
    for pools in solution.assignments().values() {
        for pool in pools.values() {
            assert!(pool.len() <= solution.max_peptides_per_pool());
        }
    }
}
