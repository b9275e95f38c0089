pub mod config;
pub mod error;
pub mod init;
pub mod loader;
pub mod optimizer;
pub mod solution;
pub mod validity;

pub use error::{PfResult, PoolError};
pub use solution::Solution;
