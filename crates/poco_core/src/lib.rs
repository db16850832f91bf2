//! Core primitives for estimator evaluation by simulation.
//!
//! This crate owns everything that happens inside a single replicate:
//! the dataset representation, deterministic seed derivation, the
//! [`generators::DataGenerator`] and [`estimators::Estimator`] contracts with
//! their built-in implementations, and the small amount of distribution math
//! needed for intervals and hypothesis tests.
//!
//! Orchestration across a parameter grid lives in `poco_experiments`.

pub mod dataset;
pub mod estimators;
pub mod generators;
pub mod point;
pub mod seed;
pub mod stats;

pub use dataset::{Dataset, DatasetError};
pub use estimators::{
    Capabilities, Estimate, EstimationError, Estimator, EstimatorSet, FnEstimator, Interval,
    RegistrationError,
};
pub use generators::{DataGenerator, Draw, GenerationError};
pub use point::ParameterPoint;
pub use stats::Alternative;

/// Greeting printed by the `poco hello` command.
pub const GREETING: &str = "Hello from poco!";

/// Return the package greeting.
pub fn greeting() -> &'static str {
    GREETING
}
