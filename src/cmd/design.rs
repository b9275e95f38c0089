use crate::reports;
use clap::{ArgMatches, Args};
use poolforge::config::Config;
use poolforge::error::{PfResult, PoolError};
use poolforge::init::init;
use poolforge::loader;
use poolforge::optimizer::{OptimizationOptions, OptimizationResult, Optimizer, ProgressCallback};
use poolforge::solution::{Peptide, Solution};
use poolforge::validity::count_violations;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct DesignArgs {
    #[command(flatten)]
    pub config: Config,

    /// JSON file with design and search settings; flags typed on the
    /// command line override it.
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// CSV of peptide pairs that must never share a pool.
    #[arg(long)]
    pub invalid_pairs: Option<PathBuf>,

    #[arg(short = 'S', long)]
    pub seed: Option<u64>,

    #[arg(short = 'a', long, default_value_t = 1)]
    pub attempts: usize,

    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub csv: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub show_pools: bool,
}

pub struct Attempt {
    pub number: usize,
    pub initial_violations: usize,
    pub initial_pools: usize,
    pub final_violations: usize,
    pub solution: Solution,
    pub result: OptimizationResult,
    pub elapsed: Duration,
}

struct CliProgress {
    attempt: usize,
}

impl ProgressCallback for CliProgress {
    fn on_iteration(&self, iteration: usize, violations: usize, num_pools: usize) {
        if iteration % 100 == 0 {
            info!(
                "#{} It {:5} | Violations: {:5} | Pools: {}",
                self.attempt, iteration, violations, num_pools
            );
        }
    }
}

pub fn run(args: DesignArgs, matches: &ArgMatches) -> PfResult<bool> {
    // 1. Settings: file first, then explicit flags
    let config = match &args.config_file {
        Some(path) => {
            info!("📂 Loading Config: {}", path.display());
            let mut file_config = Config::load_from_file(path)?;
            file_config.merge_from_cli(&args.config, matches);
            file_config
        }
        None => args.config.clone(),
    };
    config.validate()?;
    if args.attempts == 0 {
        return Err(PoolError::Config("attempts must be at least 1".into()));
    }

    let invalid: BTreeSet<(Peptide, Peptide)> = match &args.invalid_pairs {
        Some(path) => {
            info!("📂 Loading Excluded Pairs: {}", path.display());
            loader::load_invalid_pairs_from_file(path)?
        }
        None => BTreeSet::new(),
    };

    info!(
        "🧪 {} peptides, {} per pool, {} replicates ({} start, {} attempts)",
        config.design.num_peptides,
        config.design.peptides_per_pool,
        config.design.num_replicates,
        config.design.strategy,
        args.attempts
    );

    // 2. Independent attempts in parallel
    let optimizer = Optimizer::new(OptimizationOptions::from(&config));
    let mut attempts = (0..args.attempts)
        .into_par_iter()
        .map(|i| run_attempt(i, &args, &config, &invalid, &optimizer))
        .collect::<PfResult<Vec<Attempt>>>()?;

    // 3. Valid beats invalid, then fewest violations, then fewest pools
    attempts.sort_by_key(|a| {
        (
            !a.result.success,
            a.final_violations,
            a.solution.num_pools(),
            a.number,
        )
    });
    reports::print_attempts_table(&attempts);

    let Some(best) = attempts.first() else {
        return Err(PoolError::Config("no attempts were run".into()));
    };
    info!("=== 🏆 BEST: Attempt #{} ===", best.number);
    reports::print_solution_summary(&best.solution);
    if let Some(history) = &best.result.history {
        reports::print_history(history);
    }
    if args.show_pools {
        reports::print_pool_grid(&best.solution);
    }

    // 4. Persist
    if let Some(path) = &args.output {
        loader::save_solution(&best.solution, path)?;
        info!("💾 Saved solution to {}", path.display());
    }
    if let Some(path) = &args.csv {
        let writer = BufWriter::new(File::create(path)?);
        loader::write_assignments_csv(&best.solution, writer)?;
        info!("💾 Saved assignments to {}", path.display());
    }

    Ok(best.result.success)
}

fn run_attempt(
    index: usize,
    args: &DesignArgs,
    config: &Config,
    invalid: &BTreeSet<(Peptide, Peptide)>,
    optimizer: &Optimizer,
) -> PfResult<Attempt> {
    let start = Instant::now();
    let seed = args.seed.map(|s| s.wrapping_add(index as u64));
    let mut rng = if let Some(s) = seed {
        fastrand::Rng::with_seed(s)
    } else {
        fastrand::Rng::new()
    };

    let mut solution = init(
        config.design.num_peptides,
        config.design.peptides_per_pool,
        config.design.num_replicates,
        config.design.strategy,
        invalid,
        &mut rng,
    )?;
    let initial_violations = count_violations(&solution);
    let initial_pools = solution.num_pools();

    let progress = CliProgress { attempt: index + 1 };
    let result = optimizer.run(
        &mut solution,
        seed.map(|s| s.wrapping_add(9999)),
        &progress,
    )?;
    let final_violations = count_violations(&solution);

    Ok(Attempt {
        number: index + 1,
        initial_violations,
        initial_pools,
        final_violations,
        solution,
        result,
        elapsed: start.elapsed(),
    })
}
