use crate::error::{PfResult, PoolError};
use crate::optimizer::scanner::{have_met, pairs_to_neighbor_map};
use crate::solution::{normalize_pair, Assignments, Peptide, Pool, Replicate, Solution};
use fastrand::Rng;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum_macros::{Display, EnumIter, EnumString};

/// How the starting solution is laid out before optimization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InitStrategy {
    /// One peptide per pool. Always valid, never compact.
    Singleton,
    /// Shuffle and chunk. Usually full of collisions.
    Random,
    /// First pool with room whose members were never met.
    Greedy,
}

/// Builds a starting solution over peptides `0..num_peptides`.
pub fn init<'a, I>(
    num_peptides: usize,
    max_peptides_per_pool: usize,
    num_replicates: usize,
    strategy: InitStrategy,
    invalid_neighbors: I,
    rng: &mut Rng,
) -> PfResult<Solution>
where
    I: IntoIterator<Item = &'a (Peptide, Peptide)>,
{
    if num_peptides == 0 {
        return Err(PoolError::Config("num_peptides must be at least 1".into()));
    }
    if num_replicates == 0 {
        return Err(PoolError::Config("num_replicates must be at least 1".into()));
    }
    if max_peptides_per_pool == 0 {
        return Err(PoolError::Config(
            "peptides_per_pool must be at least 1".into(),
        ));
    }
    let upper = Peptide::try_from(num_peptides).map_err(|_| {
        PoolError::Config(format!("num_peptides {} is too large", num_peptides))
    })?;
    let peptides: Vec<Peptide> = (0..upper).collect();
    let invalid: BTreeSet<(Peptide, Peptide)> = invalid_neighbors
        .into_iter()
        .map(|&(a, b)| normalize_pair(a, b))
        .collect();

    let assignments = match strategy {
        InitStrategy::Singleton => singleton(&peptides, num_replicates),
        InitStrategy::Random => random(&peptides, max_peptides_per_pool, num_replicates, rng),
        InitStrategy::Greedy => greedy(
            &peptides,
            max_peptides_per_pool,
            num_replicates,
            &invalid,
            rng,
        ),
    };

    Solution::new(max_peptides_per_pool, invalid, assignments)
}

fn singleton(peptides: &[Peptide], num_replicates: usize) -> Assignments {
    (0..num_replicates)
        .map(|r| {
            let pools: Replicate = peptides
                .iter()
                .map(|&p| Pool::from([p]))
                .enumerate()
                .collect();
            (r, pools)
        })
        .collect()
}

fn random(
    peptides: &[Peptide],
    max_peptides_per_pool: usize,
    num_replicates: usize,
    rng: &mut Rng,
) -> Assignments {
    let mut order = peptides.to_vec();
    (0..num_replicates)
        .map(|r| {
            rng.shuffle(&mut order);
            let pools: Replicate = order
                .chunks(max_peptides_per_pool)
                .map(|chunk| chunk.iter().copied().collect::<Pool>())
                .enumerate()
                .collect();
            (r, pools)
        })
        .collect()
}

fn greedy(
    peptides: &[Peptide],
    max_peptides_per_pool: usize,
    num_replicates: usize,
    invalid: &BTreeSet<(Peptide, Peptide)>,
    rng: &mut Rng,
) -> Assignments {
    let mut neighbors = pairs_to_neighbor_map(invalid);
    let mut order = peptides.to_vec();
    let mut assignments = Assignments::new();

    for r in 0..num_replicates {
        rng.shuffle(&mut order);
        let mut pools: Vec<Pool> = Vec::new();

        for &peptide in &order {
            let slot = pools.iter().position(|pool| {
                pool.len() < max_peptides_per_pool
                    && pool.iter().all(|&other| !have_met(&neighbors, peptide, other))
            });
            match slot {
                Some(idx) => {
                    pools[idx].insert(peptide);
                }
                None => pools.push(Pool::from([peptide])),
            }
        }

        for pool in &pools {
            for (&a, &b) in pool.iter().tuple_combinations() {
                neighbors.entry(a).or_default().insert(b);
                neighbors.entry(b).or_default().insert(a);
            }
        }
        assignments.insert(r, pools.into_iter().enumerate().collect());
    }
    assignments
}
