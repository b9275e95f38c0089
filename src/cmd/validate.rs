use crate::reports;
use clap::Args;
use poolforge::error::PfResult;
use poolforge::loader;
use poolforge::solution::Solution;
use poolforge::validity::is_valid;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(short, long)]
    pub solution: PathBuf,

    /// Extra excluded pairs checked on top of those stored in the solution.
    #[arg(long)]
    pub invalid_pairs: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub show_pools: bool,
}

pub fn run(args: ValidateArgs) -> PfResult<bool> {
    info!("📂 Loading Solution: {}", args.solution.display());
    let mut solution = loader::load_solution(&args.solution)?;

    if let Some(path) = &args.invalid_pairs {
        let extra = loader::load_invalid_pairs_from_file(path)?;
        let merged: Vec<_> = solution
            .invalid_neighbors()
            .iter()
            .chain(&extra)
            .copied()
            .collect();
        solution = Solution::new(
            solution.max_peptides_per_pool(),
            merged,
            solution.assignments().clone(),
        )?;
    }

    info!("\n🔎 === POOL AUDIT === 🔎");
    reports::print_solution_summary(&solution);
    if args.show_pools {
        reports::print_pool_grid(&solution);
    }

    let valid = is_valid(&solution);
    if valid {
        info!("✅ No peptide pair shares a pool more than once.");
    } else {
        reports::print_violation_report(&solution);
    }
    Ok(valid)
}
