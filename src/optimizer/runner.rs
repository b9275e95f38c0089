use crate::config::Config;
use crate::error::{PfResult, PoolError};
use crate::optimizer::consolidate::cleanup;
use crate::optimizer::repair::improve_solution;
use crate::solution::Solution;
use crate::validity::{count_violations, violations_per_replicate};
use fastrand::Rng;
use tracing::{debug, info, warn};

/// Progress narration: `info!` when verbose, `debug!` otherwise.
macro_rules! narrate {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            info!($($arg)+);
        } else {
            debug!($($arg)+);
        }
    };
}

#[derive(Debug, Clone)]
pub struct OptimizationOptions {
    pub max_iters: usize,
    pub add_pool_if_stuck: bool,
    pub stall_limit: usize,
    pub violation_pool_threshold: usize,
    pub verbose: bool,
    pub return_history: bool,
}

impl Default for OptimizationOptions {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            add_pool_if_stuck: true,
            stall_limit: 3,
            violation_pool_threshold: 1000,
            verbose: false,
            return_history: true,
        }
    }
}

impl From<&Config> for OptimizationOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            max_iters: cfg.search.max_iters,
            add_pool_if_stuck: cfg.search.add_pool_if_stuck,
            stall_limit: cfg.search.stall_limit.max(1),
            violation_pool_threshold: cfg.search.violation_pool_threshold.max(1),
            verbose: cfg.search.verbose,
            return_history: cfg.search.return_history,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizationResult {
    /// True when the returned solution has no violations.
    pub success: bool,
    /// Total violations before the first iteration and after each one.
    pub history: Option<Vec<usize>>,
    pub iterations: usize,
    pub pools_added: usize,
    pub merges: usize,
    pub skipped_repairs: usize,
}

/// Observer for the driver loop. Purely informational: the loop only stops
/// on success or when the iteration budget runs out.
pub trait ProgressCallback {
    fn on_iteration(&self, iteration: usize, violations: usize, num_pools: usize);
}

impl ProgressCallback for () {
    fn on_iteration(&self, _iteration: usize, _violations: usize, _num_pools: usize) {}
}

/// Repairs `solution` in place until it is valid or `max_iters` passes ran,
/// then merges small pools. Running out of budget is reported through
/// `success`, not as an error.
pub fn optimize(
    solution: &mut Solution,
    options: &OptimizationOptions,
    rng: &mut Rng,
) -> PfResult<OptimizationResult> {
    optimize_with_progress(solution, options, rng, &())
}

pub fn optimize_with_progress<CB: ProgressCallback + ?Sized>(
    solution: &mut Solution,
    options: &OptimizationOptions,
    rng: &mut Rng,
    callback: &CB,
) -> PfResult<OptimizationResult> {
    let threshold = options.violation_pool_threshold.max(1);
    let stall_limit = options.stall_limit.max(1);

    let replicate_to_violations = violations_per_replicate(solution);
    let mut old_violations: usize = replicate_to_violations.values().sum();
    let mut history = vec![old_violations];
    let mut pools_added = 0;
    let mut skipped_repairs = 0;
    let mut iterations = 0;

    narrate!(
        options.verbose,
        "Initial solution has {} violations",
        old_violations
    );

    // 1. Far from valid: give crowded replicates room up front
    if old_violations > threshold * solution.num_replicates() {
        for (&replicate, &count) in &replicate_to_violations {
            if count > threshold {
                let new_pools = count.div_ceil(threshold);
                narrate!(
                    options.verbose,
                    "-- replicate {} has {} violations, adding {} pools",
                    replicate + 1,
                    count,
                    new_pools
                );
                for _ in 0..new_pools {
                    solution.add_empty_pool(replicate)?;
                }
                pools_added += new_pools;
            }
        }
    }

    // 2. Repair loop
    let mut stalled = 0;
    for i in 0..options.max_iters {
        let report = improve_solution(solution, rng)?;
        skipped_repairs += report.skipped.len();

        let replicate_to_violations = violations_per_replicate(solution);
        let new_violations: usize = replicate_to_violations.values().sum();
        history.push(new_violations);
        iterations = i + 1;

        narrate!(
            options.verbose,
            "{}) {} -> {} violations ({} pools)",
            iterations,
            old_violations,
            new_violations,
            solution.num_pools()
        );
        callback.on_iteration(iterations, new_violations, solution.num_pools());

        if old_violations <= new_violations {
            stalled += 1;
        } else {
            stalled = 0;
        }
        old_violations = new_violations;

        if new_violations == 0 {
            narrate!(
                options.verbose,
                "Found valid solution after {} iterations",
                iterations
            );
            break;
        }

        if stalled >= stall_limit && options.add_pool_if_stuck {
            for (&replicate, _) in replicate_to_violations.iter().filter(|(_, &v)| v > 0) {
                let idx = solution.add_empty_pool(replicate)?;
                narrate!(
                    options.verbose,
                    "-- adding pool {} to replicate {}",
                    idx + 1,
                    replicate + 1
                );
                pools_added += 1;
            }
            stalled = 0;
        }
    }

    let success = old_violations == 0;
    if !success {
        warn!(
            "No valid solution after {} iterations ({} violations remain)",
            iterations, old_violations
        );
    }

    // 3. Compact whatever we ended with
    let merges = cleanup(solution)?;
    narrate!(
        options.verbose,
        "-- merged {} small pools, final number of pools: {}",
        merges,
        solution.num_pools()
    );

    if success {
        let remaining = count_violations(solution);
        if remaining != 0 {
            return Err(PoolError::Invariant(format!(
                "cleanup left {} violations in a valid solution",
                remaining
            )));
        }
    }

    Ok(OptimizationResult {
        success,
        history: options.return_history.then_some(history),
        iterations,
        pools_added,
        merges,
        skipped_repairs,
    })
}

/// Owns the search settings and builds the RNG for each run.
pub struct Optimizer {
    options: OptimizationOptions,
}

impl Optimizer {
    pub fn new(options: OptimizationOptions) -> Self {
        Self { options }
    }

    pub fn run<CB: ProgressCallback + ?Sized>(
        &self,
        solution: &mut Solution,
        seed: Option<u64>,
        callback: &CB,
    ) -> PfResult<OptimizationResult> {
        let mut rng = if let Some(s) = seed {
            Rng::with_seed(s)
        } else {
            Rng::new()
        };
        optimize_with_progress(solution, &self.options, &mut rng, callback)
    }
}
