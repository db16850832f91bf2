//! Raw per-replicate results and the summarised output of a run.

use poco_core::{Alternative, Estimate, EstimationError, GenerationError, ParameterPoint};
use serde::{Deserialize, Serialize};

use crate::metrics::AggregatedMetric;
use crate::parameters::ParameterGrid;

/// Why a replicate produced no estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum ReplicateFailure {
    #[error(transparent)]
    Generation(GenerationError),

    #[error(transparent)]
    Estimation(EstimationError),
}

/// One estimator applied to one replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateResult {
    pub combination_index: usize,
    pub estimator_index: usize,
    pub replicate_index: usize,
    /// Truth reported by the generator for this replicate.
    pub truth: Option<f64>,
    pub outcome: Result<Estimate, ReplicateFailure>,
}

impl EstimateResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn estimate(&self) -> Option<&Estimate> {
        self.outcome.as_ref().ok()
    }

    fn key(&self) -> (usize, usize, usize) {
        (
            self.combination_index,
            self.estimator_index,
            self.replicate_index,
        )
    }
}

/// A combination rejected by the generator before any replicate ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationError {
    pub combination_index: usize,
    pub point: ParameterPoint,
    pub error: GenerationError,
}

/// Settings under which raw results are reduced to metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregationSettings {
    pub significance_level: f64,
    pub confidence_level: f64,
    pub null_value: f64,
    pub alternative: Alternative,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            confidence_level: 0.95,
            null_value: 0.0,
            alternative: Alternative::TwoSided,
        }
    }
}

/// Everything that identifies a run apart from its metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub seed: u64,
    pub replicates: usize,
    pub generator: String,
    pub estimators: Vec<String>,
    pub grid: ParameterGrid,
    pub settings: AggregationSettings,
    pub combination_errors: Vec<CombinationError>,
}

/// Per-replicate results of a run, sorted by
/// `(combination, estimator, replicate)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResults {
    metadata: RunMetadata,
    results: Vec<EstimateResult>,
}

impl RawResults {
    pub(crate) fn new(metadata: RunMetadata, mut results: Vec<EstimateResult>) -> Self {
        results.sort_by_key(EstimateResult::key);
        Self { metadata, results }
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn results(&self) -> &[EstimateResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// All replicates of one (combination, estimator) cell, in replicate order.
    pub fn estimates_for(&self, combination_index: usize, estimator_index: usize) -> &[EstimateResult] {
        let cell = (combination_index, estimator_index);
        let start = self
            .results
            .partition_point(|r| (r.combination_index, r.estimator_index) < cell);
        let end = self
            .results
            .partition_point(|r| (r.combination_index, r.estimator_index) <= cell);
        &self.results[start..end]
    }

    /// Successful point estimates of one cell.
    pub fn point_estimates(&self, combination_index: usize, estimator_index: usize) -> Vec<f64> {
        self.estimates_for(combination_index, estimator_index)
            .iter()
            .filter_map(|r| r.estimate().map(|estimate| estimate.point))
            .collect()
    }

    /// Empirical quantiles of the successful estimates of one cell, using
    /// linear interpolation between order statistics. `None` when the cell
    /// has no successes.
    pub fn estimate_quantiles(
        &self,
        combination_index: usize,
        estimator_index: usize,
        levels: &[f64],
    ) -> Option<Vec<f64>> {
        let mut sorted = self.point_estimates(combination_index, estimator_index);
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        Some(levels.iter().map(|&q| quantile_sorted(&sorted, q)).collect())
    }

    /// Successful results of one cell sorted by estimate, thinned to at most
    /// `n_max` evenly spaced entries.
    pub fn ranked_estimates(
        &self,
        combination_index: usize,
        estimator_index: usize,
        n_max: usize,
    ) -> Vec<&EstimateResult> {
        let mut ranked: Vec<&EstimateResult> = self
            .estimates_for(combination_index, estimator_index)
            .iter()
            .filter(|r| r.is_success())
            .collect();
        ranked.sort_by(|a, b| {
            let a = a.estimate().map_or(f64::NAN, |e| e.point);
            let b = b.estimate().map_or(f64::NAN, |e| e.point);
            a.total_cmp(&b)
        });

        let total = ranked.len();
        if n_max == 0 {
            return Vec::new();
        }
        if total <= n_max || n_max == 1 {
            ranked.truncate(n_max);
            return ranked;
        }
        let step = (total - 1) as f64 / (n_max - 1) as f64;
        (0..n_max)
            .map(|i| ranked[(i as f64 * step).round() as usize])
            .collect()
    }
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Aggregated output of a run: one metric row per (combination, estimator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    metadata: RunMetadata,
    metrics: Vec<AggregatedMetric>,
}

impl SimulationResults {
    pub(crate) fn new(metadata: RunMetadata, metrics: Vec<AggregatedMetric>) -> Self {
        Self { metadata, metrics }
    }

    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn metrics(&self) -> &[AggregatedMetric] {
        &self.metrics
    }

    pub fn estimator_names(&self) -> &[String] {
        &self.metadata.estimators
    }

    pub fn combination_errors(&self) -> &[CombinationError] {
        &self.metadata.combination_errors
    }

    /// Metric row for one combination and estimator.
    pub fn get(&self, combination_index: usize, estimator: &str) -> Option<&AggregatedMetric> {
        self.metrics
            .iter()
            .find(|m| m.combination_index == combination_index && m.estimator == estimator)
    }

    pub fn for_estimator<'a>(
        &'a self,
        estimator: &'a str,
    ) -> impl Iterator<Item = &'a AggregatedMetric> + 'a {
        self.metrics.iter().filter(move |m| m.estimator == estimator)
    }
}
