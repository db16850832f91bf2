//! Simulation-based evaluation of estimators across parameter grids.
//!
//! This crate runs many replicates of a data-generating process over a grid of
//! parameter combinations, applies a set of estimators to every replicate,
//! and summarises how they behave: power, coverage, bias and standard-error
//! bias per (combination, estimator) cell.
//!
//! # Quick Start
//!
//! ```no_run
//! use poco_core::estimators::SampleMeanEstimator;
//! use poco_core::generators::NormalMeanShifter;
//! use poco_core::EstimatorSet;
//! use poco_experiments::{run_simulation, CurveView, Metric, ParameterSpace, RunConfig};
//! use poco_core::ParameterPoint;
//!
//! let grid = ParameterSpace::grid()
//!     .dimension("n", vec![50.0, 100.0])
//!     .linspace("effect_size", 0.0, 0.5, 11)
//!     .generate()?;
//! let estimators = EstimatorSet::new().with(SampleMeanEstimator::new("y"))?;
//!
//! let results = run_simulation(
//!     &grid,
//!     &estimators,
//!     &NormalMeanShifter::default(),
//!     &RunConfig::default().with_replicates(500).with_seed(24),
//! )?;
//!
//! let power = CurveView::new(&results).curve(
//!     "sample_mean",
//!     Metric::Power,
//!     "effect_size",
//!     &ParameterPoint::new().with("n", 100.0),
//! )?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! - [`parameters`]: grid construction (Cartesian product, random sampling)
//! - [`runner`]: batched parallel replicate execution using rayon
//! - [`metrics`]: aggregation of replicate results into summary metrics
//! - [`results`]: raw and aggregated result containers
//! - [`curves`]: curve projections for plotting
//! - [`export`]: CSV/JSON/Parquet export and CSV import
//! - [`config`]: building runs from request files
//! - [`presets`]: ready-made requests

pub mod config;
pub mod curves;
pub mod errors;
pub mod export;
pub mod metrics;
pub mod parameters;
pub mod presets;
pub mod results;
pub mod runner;

pub use curves::{Curve, CurveError, CurvePoint, CurveView, Metric};
pub use errors::{ConfigurationError, RunError};
pub use export::{
    export_to_csv, export_to_json, export_to_parquet, import_from_csv, import_from_json,
    ExportError, ImportedTable,
};
pub use metrics::{aggregate, aggregate_with, reaggregate_at_confidence, AggregatedMetric};
pub use parameters::{ParameterGrid, ParameterSpace};
pub use results::{
    AggregationSettings, CombinationError, EstimateResult, RawResults, ReplicateFailure,
    RunMetadata, SimulationResults,
};
pub use runner::{
    run_replicates, run_simulation, run_simulation_with_raw, CancellationToken, RunConfig,
};
