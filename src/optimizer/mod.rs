pub mod consolidate;
pub mod repair;
pub mod runner;
pub mod scanner;

pub use self::consolidate::{cleanup, merge_small_pools};
pub use self::repair::{improve_solution, RepairReport};
pub use self::runner::{
    optimize, optimize_with_progress, OptimizationOptions, OptimizationResult, Optimizer,
    ProgressCallback,
};
pub use self::scanner::{find_violating_peptides, ScanReport, Violation};
