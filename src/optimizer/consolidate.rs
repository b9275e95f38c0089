use crate::error::PfResult;
use crate::optimizer::scanner::{have_met, pairs_to_neighbor_map, NeighborMap};
use crate::solution::{Pool, PoolIdx, ReplicateIdx, Solution};
use itertools::Itertools;
use std::collections::BTreeSet;
use tracing::debug;

/// Neighbor map built from every replicate except `replicate`, seeded with
/// the excluded pairs. Merging pools inside `replicate` is safe exactly when
/// no two peptides of the merged pool are neighbors here.
pub fn neighbors_excluding(solution: &Solution, replicate: ReplicateIdx) -> NeighborMap {
    let mut map = pairs_to_neighbor_map(solution.invalid_neighbors());
    for (&other, pools) in solution.assignments() {
        if other == replicate {
            continue;
        }
        for peptides in pools.values() {
            for (&a, &b) in peptides.iter().tuple_combinations() {
                map.entry(a).or_default().insert(b);
                map.entry(b).or_default().insert(a);
            }
        }
    }
    map
}

fn can_merge(excluding: &NeighborMap, pool_1: &Pool, pool_2: &Pool) -> bool {
    pool_1
        .iter()
        .chain(pool_2)
        .tuple_combinations()
        .all(|(&a, &b)| !have_met(excluding, a, b))
}

/// One first-fit pass merging undersized pools, replicate by replicate.
///
/// A pool takes part in at most one merge per call. Two pools qualify when
/// both are non-empty, their combined size stays below the capacity, and no
/// pair of their peptides has met in another replicate or is excluded. The
/// smaller pool is poured into the larger one; emptied pools are removed and
/// the remaining pools renumbered before returning.
pub fn merge_small_pools(solution: &mut Solution) -> PfResult<usize> {
    let capacity = solution.max_peptides_per_pool();
    let mut num_merged = 0;

    for replicate in 0..solution.num_replicates() {
        // Built per replicate so merges made in earlier replicates are seen.
        let excluding = neighbors_excluding(solution, replicate);
        let pool_ids: Vec<PoolIdx> = solution.replicate(replicate)?.keys().copied().collect();
        let mut merged: BTreeSet<PoolIdx> = BTreeSet::new();

        for &pool_1 in &pool_ids {
            if merged.contains(&pool_1) {
                continue;
            }
            let size_1 = solution.pool(replicate, pool_1)?.len();
            if size_1 == 0 || size_1 >= capacity {
                continue;
            }

            for &pool_2 in &pool_ids {
                if pool_2 == pool_1 || merged.contains(&pool_2) {
                    continue;
                }
                let peptides_1 = solution.pool(replicate, pool_1)?;
                let peptides_2 = solution.pool(replicate, pool_2)?;
                if peptides_2.is_empty() || peptides_1.len() + peptides_2.len() >= capacity {
                    continue;
                }
                if !can_merge(&excluding, peptides_1, peptides_2) {
                    continue;
                }

                let (target, source) = if peptides_2.len() > peptides_1.len() {
                    (pool_2, pool_1)
                } else {
                    (pool_1, pool_2)
                };
                debug!(replicate, target, source, "merging pools");
                solution.merge_pools(replicate, target, source)?;
                merged.insert(pool_1);
                merged.insert(pool_2);
                num_merged += 1;
                break;
            }
        }
    }

    solution.remove_empty_pools();
    Ok(num_merged)
}

/// Merges small pools until a pass makes no progress. Returns the total
/// number of merges; empty pools are gone afterwards either way.
pub fn cleanup(solution: &mut Solution) -> PfResult<usize> {
    let mut total_merged = 0;
    loop {
        let num_merged = merge_small_pools(solution)?;
        if num_merged == 0 {
            break;
        }
        total_merged += num_merged;
        debug!(
            merged = num_merged,
            pools = solution.num_pools(),
            "merged small pools"
        );
    }
    Ok(total_merged)
}
