//! Parallel replicate execution using rayon.
//!
//! A run expands into work items, one per (valid combination, replicate).
//! Each item draws one dataset with its own derived RNG and applies every
//! estimator to it. Items are processed in deterministic batches; results are
//! keyed by (combination, estimator, replicate) and aggregated in key order,
//! so the output is identical for any number of worker threads.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use poco_core::seed::replicate_rng;
use poco_core::{DataGenerator, EstimationError, EstimatorSet, GenerationError, ParameterPoint};
use poco_sweep_core::batching::{plan_batches, ReplicateSlot};
use rayon::prelude::*;

use crate::errors::{ConfigurationError, RunError};
use crate::metrics::{aggregate, validate_settings};
use crate::parameters::ParameterGrid;
use crate::results::{
    AggregationSettings, CombinationError, EstimateResult, RawResults, ReplicateFailure,
    RunMetadata, SimulationResults,
};

/// Work items per batch when the caller does not choose.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Cooperative cancellation flag shared with a running simulation.
///
/// The runner checks it before starting each batch; work already in flight
/// finishes, and the partial results are discarded.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Execution settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Replicates per combination. Zero is accepted and yields undefined
    /// metrics.
    pub replicates: usize,
    pub seed: u64,
    /// Worker threads; `None` uses rayon's default.
    pub threads: Option<usize>,
    /// Work items per batch; `None` uses [`DEFAULT_BATCH_SIZE`].
    pub batch_size: Option<usize>,
    pub settings: AggregationSettings,
    pub show_progress: bool,
    pub cancellation: Option<CancellationToken>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            replicates: 100,
            seed: 42,
            threads: None,
            batch_size: None,
            settings: AggregationSettings::default(),
            show_progress: false,
            cancellation: None,
        }
    }
}

impl RunConfig {
    pub fn with_replicates(mut self, replicates: usize) -> Self {
        self.replicates = replicates;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_settings(mut self, settings: AggregationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.threads == Some(0) {
            return Err(ConfigurationError::ZeroCount("threads"));
        }
        if self.batch_size == Some(0) {
            return Err(ConfigurationError::ZeroCount("batch_size"));
        }
        validate_settings(&self.settings)
    }
}

/// Run a simulation and aggregate its results.
///
/// Fails only on invalid configuration, cancellation, or when the worker
/// pool cannot be created. Generator and estimator failures are recorded in
/// the results.
pub fn run_simulation(
    grid: &ParameterGrid,
    estimators: &EstimatorSet,
    generator: &dyn DataGenerator,
    config: &RunConfig,
) -> Result<SimulationResults, RunError> {
    let raw = run_replicates(grid, estimators, generator, config)?;
    Ok(aggregate(&raw))
}

/// Like [`run_simulation`] but also returns the per-replicate results.
pub fn run_simulation_with_raw(
    grid: &ParameterGrid,
    estimators: &EstimatorSet,
    generator: &dyn DataGenerator,
    config: &RunConfig,
) -> Result<(SimulationResults, RawResults), RunError> {
    let raw = run_replicates(grid, estimators, generator, config)?;
    Ok((aggregate(&raw), raw))
}

/// Execute every replicate of the run without aggregating.
pub fn run_replicates(
    grid: &ParameterGrid,
    estimators: &EstimatorSet,
    generator: &dyn DataGenerator,
    config: &RunConfig,
) -> Result<RawResults, RunError> {
    if grid.is_empty() {
        return Err(ConfigurationError::EmptyGrid.into());
    }
    if estimators.is_empty() {
        return Err(ConfigurationError::EmptyEstimatorSet.into());
    }
    config.validate()?;

    let started = Instant::now();
    tracing::info!(
        generator = generator.name(),
        combinations = grid.len(),
        estimators = estimators.len(),
        replicates = config.replicates,
        seed = config.seed,
        "starting simulation run"
    );

    let mut combination_errors = Vec::new();
    let mut valid_combinations = Vec::with_capacity(grid.len());
    for (combination_index, point) in grid.points().iter().enumerate() {
        match generator.validate(point) {
            Ok(()) => valid_combinations.push(combination_index),
            Err(error) => {
                tracing::warn!(combination = %point, %error, "combination rejected by generator");
                combination_errors.push(CombinationError {
                    combination_index,
                    point: point.clone(),
                    error,
                });
            }
        }
    }

    let replicates = config.replicates;
    let total_items = valid_combinations.len() * replicates;
    let batches = plan_batches(total_items, config.batch_size.unwrap_or(DEFAULT_BATCH_SIZE))
        .map_err(ConfigurationError::from)?;

    let pool = match config.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new().num_threads(threads).build()?,
        None => rayon::ThreadPoolBuilder::new().build()?,
    };

    let progress = (config.show_progress && total_items > 0).then(|| progress_bar(total_items));

    let mut results = Vec::with_capacity(total_items * estimators.len());
    for batch in &batches {
        if config
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            if let Some(bar) = &progress {
                bar.abandon_with_message("Cancelled");
            }
            tracing::warn!(
                completed_batches = batch.batch_id,
                total_batches = batches.len(),
                "simulation run cancelled"
            );
            return Err(RunError::Cancelled {
                completed_batches: batch.batch_id,
                total_batches: batches.len(),
            });
        }

        let batch_results: Vec<Vec<EstimateResult>> = pool.install(|| {
            batch
                .items()
                .into_par_iter()
                .map(|item| {
                    let slot = ReplicateSlot::of_item(item, replicates);
                    let combination_index = valid_combinations[slot.combination];
                    let outcome = run_replicate(
                        generator,
                        estimators,
                        &grid.points()[combination_index],
                        combination_index,
                        slot.replicate,
                        config,
                    );
                    if let Some(bar) = &progress {
                        bar.inc(1);
                    }
                    outcome
                })
                .collect()
        });
        results.extend(batch_results.into_iter().flatten());
        tracing::debug!(
            batch = batch.batch_id,
            items = batch.len(),
            "finished batch"
        );
    }

    if let Some(bar) = &progress {
        bar.finish_with_message("Completed");
    }

    let failed = results.iter().filter(|r| !r.is_success()).count();
    tracing::info!(
        results = results.len(),
        failed,
        rejected_combinations = combination_errors.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "simulation run finished"
    );

    let metadata = RunMetadata {
        seed: config.seed,
        replicates,
        generator: generator.name().to_string(),
        estimators: estimators.names(),
        grid: grid.clone(),
        settings: config.settings,
        combination_errors,
    };
    Ok(RawResults::new(metadata, results))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(_) => "non-string panic payload".to_string(),
    }
}

/// Draw one replicate and apply every estimator to it.
///
/// A panic in the generator or an estimator is caught and recorded as a
/// failure of that replicate only.
fn run_replicate(
    generator: &dyn DataGenerator,
    estimators: &EstimatorSet,
    point: &ParameterPoint,
    combination_index: usize,
    replicate_index: usize,
    config: &RunConfig,
) -> Vec<EstimateResult> {
    let mut rng = replicate_rng(config.seed, combination_index, replicate_index);
    let confidence_level = config.settings.confidence_level;

    let generated = panic::catch_unwind(AssertUnwindSafe(|| generator.generate(point, &mut rng)))
        .unwrap_or_else(|payload| {
            Err(GenerationError::Failure(format!(
                "generator panicked: {}",
                panic_message(payload)
            )))
        });

    match generated {
        Ok(draw) => estimators
            .iter()
            .enumerate()
            .map(|(estimator_index, estimator)| {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    estimator.apply(&draw.dataset, confidence_level)
                }))
                .unwrap_or_else(|payload| Err(EstimationError::Panicked(panic_message(payload))));
                EstimateResult {
                    combination_index,
                    estimator_index,
                    replicate_index,
                    truth: draw.truth,
                    outcome: outcome.map_err(ReplicateFailure::Estimation),
                }
            })
            .collect(),
        Err(error) => {
            tracing::debug!(combination = %point, replicate = replicate_index, %error, "replicate generation failed");
            (0..estimators.len())
                .map(|estimator_index| EstimateResult {
                    combination_index,
                    estimator_index,
                    replicate_index,
                    truth: None,
                    outcome: Err(ReplicateFailure::Generation(error.clone())),
                })
                .collect()
        }
    }
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    match ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        Ok(style) => bar.set_style(style.progress_chars("#>-")),
        Err(error) => tracing::debug!(%error, "falling back to default progress style"),
    }
    bar
}
