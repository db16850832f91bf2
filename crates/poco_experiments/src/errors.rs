//! Errors that stop a run before or during execution.
//!
//! Per-replicate and per-combination failures are data, recorded in the
//! results. Only the variants here abort.

use std::path::PathBuf;

use poco_core::RegistrationError;
use poco_sweep_core::contract::ValidationError;

/// Invalid run setup, detected before any replicate is drawn.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("parameter grid has no dimensions")]
    EmptyGrid,

    #[error("dimension names must be non-empty")]
    EmptyDimensionName,

    #[error("dimension '{0}' clashes with a results table column")]
    ReservedDimension(String),

    #[error("dimension '{0}' is declared more than once")]
    DuplicateDimension(String),

    #[error("dimension '{0}' has no values")]
    EmptyDimension(String),

    #[error("dimension '{dimension}' contains non-finite value {value}")]
    NonFiniteValue { dimension: String, value: f64 },

    #[error("grid point {index} does not match the grid dimensions")]
    InconsistentPoint { index: usize },

    #[error("no estimators registered")]
    EmptyEstimatorSet,

    #[error("{name} must lie strictly between 0 and 1, got {value}")]
    InvalidProbability { name: &'static str, value: f64 },

    #[error("null value must be finite")]
    NonFiniteNullValue,

    #[error("{0} must be a positive integer")]
    ZeroCount(&'static str),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Request(#[from] ValidationError),

    #[error("invalid generator setup: {0}")]
    InvalidGenerator(String),

    #[error("failed to load data file {}: {reason}", .path.display())]
    DataFile { path: PathBuf, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("run cancelled after {completed_batches} of {total_batches} batches")]
    Cancelled {
        completed_batches: usize,
        total_batches: usize,
    },

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
