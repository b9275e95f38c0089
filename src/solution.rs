use crate::error::{PfResult, PoolError};
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Opaque identifier of one item (a peptide in ELISpot terms).
pub type Peptide = u32;
pub type PoolIdx = usize;
pub type ReplicateIdx = usize;

/// Items tested together in one well.
pub type Pool = BTreeSet<Peptide>;
/// One complete partition of the items into pools.
pub type Replicate = BTreeMap<PoolIdx, Pool>;
pub type Assignments = BTreeMap<ReplicateIdx, Replicate>;

/// Assignment of peptides to pools across several replicates.
///
/// All containers are ordered so that iterating a solution always visits
/// replicates, pools and peptides in the same order. Seeded optimizer runs
/// depend on this to be reproducible.
///
/// Mutators keep two invariants: no pool grows past `max_peptides_per_pool`,
/// and a peptide never appears in two pools of the same replicate. Pools may be
/// empty between an optimizer step and the final cleanup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    max_peptides_per_pool: usize,
    invalid_neighbors: BTreeSet<(Peptide, Peptide)>,
    assignments: Assignments,
}

/// Stores an unordered pair with the smaller id first.
pub fn normalize_pair(a: Peptide, b: Peptide) -> (Peptide, Peptide) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Solution {
    pub fn new<I>(
        max_peptides_per_pool: usize,
        invalid_neighbors: I,
        assignments: Assignments,
    ) -> PfResult<Self>
    where
        I: IntoIterator<Item = (Peptide, Peptide)>,
    {
        let solution = Self {
            max_peptides_per_pool,
            invalid_neighbors: invalid_neighbors
                .into_iter()
                .map(|(a, b)| normalize_pair(a, b))
                .collect(),
            assignments,
        };
        solution.validate()?;
        Ok(solution)
    }

    /// Builds a solution from plain nested lists: `replicates[r][p]` holds
    /// the peptides of pool `p` in replicate `r`.
    pub fn from_nested<I>(
        max_peptides_per_pool: usize,
        invalid_neighbors: I,
        replicates: Vec<Vec<Vec<Peptide>>>,
    ) -> PfResult<Self>
    where
        I: IntoIterator<Item = (Peptide, Peptide)>,
    {
        let mut assignments = Assignments::new();
        for (r, pools) in replicates.into_iter().enumerate() {
            let mut replicate = Replicate::new();
            for (p, peptides) in pools.into_iter().enumerate() {
                let pool: Pool = peptides.iter().copied().collect();
                if pool.len() != peptides.len() {
                    return Err(PoolError::Validation(format!(
                        "pool {} of replicate {} lists a peptide twice",
                        p, r
                    )));
                }
                replicate.insert(p, pool);
            }
            assignments.insert(r, replicate);
        }
        Self::new(max_peptides_per_pool, invalid_neighbors, assignments)
    }

    /// Checks the structural invariants. Deserialized solutions skip the
    /// constructor, so loaders call this directly.
    pub fn validate(&self) -> PfResult<()> {
        if self.max_peptides_per_pool == 0 {
            return Err(PoolError::Validation(
                "max_peptides_per_pool must be at least 1".into(),
            ));
        }
        if self.assignments.is_empty() {
            return Err(PoolError::Validation(
                "solution must contain at least one replicate".into(),
            ));
        }
        for (expected, &replicate) in self.assignments.keys().enumerate() {
            if replicate != expected {
                return Err(PoolError::Validation(format!(
                    "replicates must be numbered 0..{}, found {}",
                    self.assignments.len(),
                    replicate
                )));
            }
        }
        for &(a, b) in &self.invalid_neighbors {
            if a == b {
                return Err(PoolError::Validation(format!(
                    "peptide {} cannot be excluded from itself",
                    a
                )));
            }
        }
        let mut reference: Option<BTreeSet<Peptide>> = None;
        for (&replicate, pools) in &self.assignments {
            if pools.is_empty() {
                return Err(PoolError::EmptyReplicate(replicate));
            }
            let mut seen = BTreeSet::new();
            for (&pool, peptides) in pools {
                if peptides.len() > self.max_peptides_per_pool {
                    return Err(PoolError::Validation(format!(
                        "pool {} of replicate {} holds {} peptides (max {})",
                        pool,
                        replicate,
                        peptides.len(),
                        self.max_peptides_per_pool
                    )));
                }
                for &peptide in peptides {
                    if !seen.insert(peptide) {
                        return Err(PoolError::Validation(format!(
                            "peptide {} appears twice in replicate {}",
                            peptide, replicate
                        )));
                    }
                }
            }
            // Every replicate must hold the same peptides as replicate 0.
            if let Some(expected) = &reference {
                if *expected != seen {
                    let missing = expected.difference(&seen).count();
                    let extra = seen.difference(expected).count();
                    return Err(PoolError::Validation(format!(
                        "replicate {} differs from replicate 0 ({} missing, {} extra peptides)",
                        replicate, missing, extra
                    )));
                }
            } else {
                reference = Some(seen);
            }
        }
        Ok(())
    }

    pub fn max_peptides_per_pool(&self) -> usize {
        self.max_peptides_per_pool
    }

    pub fn num_replicates(&self) -> usize {
        self.assignments.len()
    }

    pub fn invalid_neighbors(&self) -> &BTreeSet<(Peptide, Peptide)> {
        &self.invalid_neighbors
    }

    pub fn assignments(&self) -> &Assignments {
        &self.assignments
    }

    pub fn replicate(&self, replicate: ReplicateIdx) -> PfResult<&Replicate> {
        self.assignments
            .get(&replicate)
            .ok_or(PoolError::MissingReplicate(replicate))
    }

    fn replicate_mut(&mut self, replicate: ReplicateIdx) -> PfResult<&mut Replicate> {
        self.assignments
            .get_mut(&replicate)
            .ok_or(PoolError::MissingReplicate(replicate))
    }

    pub fn pool(&self, replicate: ReplicateIdx, pool: PoolIdx) -> PfResult<&Pool> {
        self.replicate(replicate)?
            .get(&pool)
            .ok_or(PoolError::MissingPool { replicate, pool })
    }

    /// Total number of pools across all replicates.
    pub fn num_pools(&self) -> usize {
        self.assignments.values().map(|pools| pools.len()).sum()
    }

    pub fn num_pools_in_replicate(&self, replicate: ReplicateIdx) -> PfResult<usize> {
        Ok(self.replicate(replicate)?.len())
    }

    pub fn largest_pool(&self) -> usize {
        self.assignments
            .values()
            .flat_map(|pools| pools.values().map(|p| p.len()))
            .max()
            .unwrap_or(0)
    }

    /// Every peptide that appears in at least one replicate.
    pub fn peptides(&self) -> BTreeSet<Peptide> {
        self.assignments
            .values()
            .flat_map(|pools| pools.values().flatten().copied())
            .collect()
    }

    pub fn replicate_peptides(&self, replicate: ReplicateIdx) -> PfResult<BTreeSet<Peptide>> {
        Ok(self
            .replicate(replicate)?
            .values()
            .flatten()
            .copied()
            .collect())
    }

    pub fn peptide_to_pool(
        &self,
        replicate: ReplicateIdx,
    ) -> PfResult<FnvHashMap<Peptide, PoolIdx>> {
        let mut map = FnvHashMap::default();
        for (&pool, peptides) in self.replicate(replicate)? {
            for &peptide in peptides {
                map.insert(peptide, pool);
            }
        }
        Ok(map)
    }

    /// Appends an empty pool to a replicate and returns its index.
    pub fn add_empty_pool(&mut self, replicate: ReplicateIdx) -> PfResult<PoolIdx> {
        let pools = self.replicate_mut(replicate)?;
        let idx = pools.keys().next_back().map_or(0, |&last| last + 1);
        pools.insert(idx, Pool::new());
        Ok(idx)
    }

    /// Drops empty pools and renumbers the survivors of each replicate from 0,
    /// keeping their relative order.
    pub fn remove_empty_pools(&mut self) -> usize {
        let mut removed = 0;
        for pools in self.assignments.values_mut() {
            let before = pools.len();
            let kept: Replicate = std::mem::take(pools)
                .into_values()
                .filter(|p| !p.is_empty())
                .enumerate()
                .collect();
            removed += before - kept.len();
            *pools = kept;
        }
        removed
    }

    pub fn move_peptide(
        &mut self,
        replicate: ReplicateIdx,
        from: PoolIdx,
        peptide: Peptide,
        to: PoolIdx,
    ) -> PfResult<()> {
        let capacity = self.max_peptides_per_pool;
        let pools = self.replicate_mut(replicate)?;

        match pools.get(&to) {
            None => return Err(PoolError::MissingPool { replicate, pool: to }),
            Some(target) if from != to && target.len() >= capacity => {
                return Err(PoolError::PoolFull {
                    replicate,
                    pool: to,
                    capacity,
                })
            }
            Some(_) => {}
        }

        let source = pools
            .get_mut(&from)
            .ok_or(PoolError::MissingPool { replicate, pool: from })?;
        if !source.contains(&peptide) {
            return Err(PoolError::PeptideNotInPool {
                replicate,
                pool: from,
                peptide,
            });
        }
        if from == to {
            return Ok(());
        }
        source.remove(&peptide);

        if let Some(target) = pools.get_mut(&to) {
            target.insert(peptide);
        }
        Ok(())
    }

    pub fn swap_peptides(
        &mut self,
        replicate: ReplicateIdx,
        pool_a: PoolIdx,
        peptide_a: Peptide,
        pool_b: PoolIdx,
        peptide_b: Peptide,
    ) -> PfResult<()> {
        let pools = self.replicate_mut(replicate)?;

        for (pool, peptide) in [(pool_a, peptide_a), (pool_b, peptide_b)] {
            let members = pools
                .get(&pool)
                .ok_or(PoolError::MissingPool { replicate, pool })?;
            if !members.contains(&peptide) {
                return Err(PoolError::PeptideNotInPool {
                    replicate,
                    pool,
                    peptide,
                });
            }
        }
        if pool_a == pool_b {
            return Ok(());
        }

        if let Some(a) = pools.get_mut(&pool_a) {
            a.remove(&peptide_a);
            a.insert(peptide_b);
        }
        if let Some(b) = pools.get_mut(&pool_b) {
            b.remove(&peptide_b);
            b.insert(peptide_a);
        }
        Ok(())
    }

    /// Moves every peptide of `source` into `target`, leaving `source` empty.
    pub fn merge_pools(
        &mut self,
        replicate: ReplicateIdx,
        target: PoolIdx,
        source: PoolIdx,
    ) -> PfResult<()> {
        let capacity = self.max_peptides_per_pool;
        let pools = self.replicate_mut(replicate)?;

        let target_len = pools
            .get(&target)
            .ok_or(PoolError::MissingPool { replicate, pool: target })?
            .len();
        let moved = std::mem::take(
            pools
                .get_mut(&source)
                .ok_or(PoolError::MissingPool { replicate, pool: source })?,
        );

        if target_len + moved.len() > capacity {
            // Put the peptides back before reporting.
            if let Some(src) = pools.get_mut(&source) {
                *src = moved;
            }
            return Err(PoolError::PoolFull {
                replicate,
                pool: target,
                capacity,
            });
        }

        if let Some(dst) = pools.get_mut(&target) {
            dst.extend(moved);
        }
        Ok(())
    }
}
