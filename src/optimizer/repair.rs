use crate::error::PfResult;
use crate::optimizer::scanner::{find_violating_peptides, have_met, ScanReport, Violation};
use crate::solution::{Peptide, PoolIdx, ReplicateIdx, Solution};
use fastrand::Rng;
use fnv::FnvHashSet;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// What one repair pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Violations the pass started from.
    pub violations: usize,
    /// Peptides moved into an empty pool.
    pub relocations: usize,
    /// Peptides moved into a pool with spare room.
    pub moves: usize,
    pub swaps: usize,
    /// Violations with no eligible partner this pass.
    pub skipped: Vec<Violation>,
}

impl RepairReport {
    pub fn changes(&self) -> usize {
        self.relocations + self.moves + self.swaps
    }
}

/// Runs one randomized repair pass over the current violations.
///
/// The work queue is shuffled, then each violating peptide is either dropped
/// into an empty pool of its replicate, moved into a pool with room, or
/// swapped with a peptide from another pool. Partners are only taken from
/// pools whose members have never met the violating peptide according to the
/// neighbor snapshot of that replicate. A pool touched once is left alone for
/// the rest of the pass, and so is a peptide in every replicate, so later fixes
/// cannot undo earlier ones.
pub fn improve_solution(solution: &mut Solution, rng: &mut Rng) -> PfResult<RepairReport> {
    let ScanReport {
        mut needs_swap,
        neighbor_snapshots,
    } = find_violating_peptides(solution);

    rng.shuffle(&mut needs_swap);

    let mut report = RepairReport {
        violations: needs_swap.len(),
        ..Default::default()
    };
    let mut swapped_pools: FnvHashSet<(ReplicateIdx, PoolIdx)> = FnvHashSet::default();
    // Pools are keyed per replicate; peptides are frozen across all replicates.
    let mut swapped_peptides: FnvHashSet<Peptide> = FnvHashSet::default();
    let mut empty_pools: BTreeMap<ReplicateIdx, BTreeSet<PoolIdx>> = solution
        .assignments()
        .iter()
        .map(|(&replicate, pools)| {
            let empties = pools
                .iter()
                .filter(|(_, peptides)| peptides.is_empty())
                .map(|(&idx, _)| idx)
                .collect();
            (replicate, empties)
        })
        .collect();

    for violation in needs_swap {
        let Violation {
            replicate,
            pool: pool_a,
            peptide: peptide_a,
        } = violation;

        if swapped_pools.contains(&(replicate, pool_a))
            || swapped_peptides.contains(&peptide_a)
        {
            continue;
        }

        // 1. Cheapest fix: an empty pool.
        let empty_target = match empty_pools.get_mut(&replicate) {
            Some(empties) if !empties.is_empty() => {
                let pick = empties.iter().nth(rng.usize(0..empties.len())).copied();
                if let Some(idx) = pick {
                    empties.remove(&idx);
                }
                pick
            }
            _ => None,
        };

        if let Some(pool_b) = empty_target {
            debug!(
                replicate,
                peptide = peptide_a,
                from = pool_a,
                to = pool_b,
                "relocating peptide to empty pool"
            );
            solution.move_peptide(replicate, pool_a, peptide_a, pool_b)?;
            swapped_pools.insert((replicate, pool_a));
            swapped_pools.insert((replicate, pool_b));
            swapped_peptides.insert(peptide_a);
            report.relocations += 1;
            continue;
        }

        // 2. Collect partners from pools that never met peptide_a.
        let snapshot = neighbor_snapshots.get(&replicate);
        let met_a = |p: Peptide| snapshot.is_some_and(|map| have_met(map, p, peptide_a));

        let mut candidates: Vec<(PoolIdx, Peptide)> = Vec::new();
        for (&pool_i, members) in solution.replicate(replicate)? {
            if pool_i == pool_a || swapped_pools.contains(&(replicate, pool_i)) {
                continue;
            }
            if members.iter().any(|&p| met_a(p)) {
                continue;
            }
            candidates.extend(
                members
                    .iter()
                    .filter(|&p| !swapped_peptides.contains(p))
                    .map(|&p| (pool_i, p)),
            );
        }

        if candidates.is_empty() {
            debug!(
                replicate,
                pool = pool_a,
                peptide = peptide_a,
                "no valid peptide to swap with"
            );
            report.skipped.push(violation);
            continue;
        }

        let (pool_b, peptide_b) = candidates[rng.usize(0..candidates.len())];
        let size_a = solution.pool(replicate, pool_a)?.len();
        let size_b = solution.pool(replicate, pool_b)?.len();

        // 3. Move when both pools can afford it, otherwise swap.
        if size_a > 1 && size_b < solution.max_peptides_per_pool() && rng.bool() {
            debug!(
                replicate,
                peptide = peptide_a,
                from = pool_a,
                to = pool_b,
                "moving peptide"
            );
            solution.move_peptide(replicate, pool_a, peptide_a, pool_b)?;
            swapped_peptides.insert(peptide_a);
            report.moves += 1;
        } else {
            debug!(
                replicate,
                peptide_a,
                pool_a,
                peptide_b,
                pool_b,
                "swapping peptides"
            );
            solution.swap_peptides(replicate, pool_a, peptide_a, pool_b, peptide_b)?;
            swapped_peptides.insert(peptide_a);
            swapped_peptides.insert(peptide_b);
            report.swaps += 1;
        }
        swapped_pools.insert((replicate, pool_a));
        swapped_pools.insert((replicate, pool_b));
    }

    Ok(report)
}
