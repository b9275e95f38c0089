use crate::solution::{Peptide, PoolIdx, ReplicateIdx};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Parsing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Replicate {0} does not exist")]
    MissingReplicate(ReplicateIdx),

    #[error("Pool {pool} does not exist in replicate {replicate}")]
    MissingPool {
        replicate: ReplicateIdx,
        pool: PoolIdx,
    },

    #[error("Peptide {peptide} is not in pool {pool} of replicate {replicate}")]
    PeptideNotInPool {
        replicate: ReplicateIdx,
        pool: PoolIdx,
        peptide: Peptide,
    },

    #[error("Pool {pool} of replicate {replicate} is already at capacity ({capacity})")]
    PoolFull {
        replicate: ReplicateIdx,
        pool: PoolIdx,
        capacity: usize,
    },

    #[error("Replicate {0} has no pools")]
    EmptyReplicate(ReplicateIdx),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    #[error("Invariant Violated: {0}")]
    Invariant(String),
}

pub type PfResult<T> = Result<T, PoolError>;
