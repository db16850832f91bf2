//! Reduction of raw replicate results to per-cell summary statistics.
//!
//! A cell is one (parameter combination, estimator) pair. Every statistic is
//! computed over the successful replicates of the cell, in replicate order,
//! so the output does not depend on how the work was scheduled.

use poco_core::stats::{interval_rejects, mean, sample_std, wald_rejects, z_critical};
use poco_core::{Alternative, Estimate, Interval, ParameterPoint};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;
use crate::results::{AggregationSettings, EstimateResult, RawResults, SimulationResults};

/// Summary of one (combination, estimator) cell.
///
/// Statistics that cannot be computed from the available replicates are
/// `None` rather than a sentinel number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetric {
    /// Grid values of the combination.
    pub parameters: ParameterPoint,
    pub estimator: String,
    pub combination_index: usize,
    /// True value of the estimand reported by the generator.
    pub truth: Option<f64>,
    pub replicates: usize,
    pub successes: usize,
    pub failures: usize,
    /// `failures / replicates`; undefined for zero replicates.
    pub failure_rate: Option<f64>,
    /// Share of decided replicates that reject the null.
    pub power: Option<f64>,
    pub power_mcse: Option<f64>,
    /// Share of replicates with an interval that contains the truth.
    pub coverage: Option<f64>,
    pub coverage_mcse: Option<f64>,
    pub mean_estimate: Option<f64>,
    /// Mean of `estimate - truth`.
    pub bias: Option<f64>,
    /// Sample standard deviation of the estimates (`ddof = 1`).
    pub empirical_sd: Option<f64>,
    pub mean_standard_error: Option<f64>,
    /// `mean_standard_error - empirical_sd`.
    pub se_bias: Option<f64>,
}

/// Monte Carlo standard error of a proportion estimated from `n` draws.
pub fn proportion_mcse(p: f64, n: usize) -> Option<f64> {
    if n == 0 {
        return None;
    }
    Some((p * (1.0 - p) / n as f64).sqrt())
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if !(value > 0.0 && value < 1.0) {
        return Err(ConfigurationError::InvalidProbability { name, value });
    }
    Ok(())
}

pub fn validate_settings(settings: &AggregationSettings) -> Result<(), ConfigurationError> {
    check_probability("significance_level", settings.significance_level)?;
    check_probability("confidence_level", settings.confidence_level)?;
    if !settings.null_value.is_finite() {
        return Err(ConfigurationError::NonFiniteNullValue);
    }
    Ok(())
}

/// Relative widening beyond `z·SE` at which an interval counts as built from
/// a heavier-tailed reference distribution.
const WIDER_INTERVAL_TOLERANCE: f64 = 1e-3;

/// Does one estimate reject the null?
///
/// Uses a Wald z-test when a positive standard error is available, otherwise
/// inverts the interval. `None` when the estimate carries neither.
///
/// An estimate that reports both, with an interval wider than `z·SE` (a t
/// interval from a small-sample regression), is decided by its interval
/// instead, provided the test is two-sided and the interval's confidence
/// level matches the significance level. The Wald test would otherwise reject more often than
/// the interval's own coverage implies.
pub fn rejects_null(estimate: &Estimate, settings: &AggregationSettings) -> Option<bool> {
    let invert = |interval: Interval| {
        interval_rejects(
            interval.lower,
            interval.upper,
            settings.null_value,
            settings.alternative,
        )
    };
    if let Some(interval) = heavier_tailed_interval(estimate, settings) {
        return Some(invert(interval));
    }
    if let Some(decision) = estimate.standard_error.and_then(|se| {
        wald_rejects(
            estimate.point,
            se,
            settings.null_value,
            settings.significance_level,
            settings.alternative,
        )
    }) {
        return Some(decision);
    }
    estimate.interval.map(invert)
}

fn heavier_tailed_interval(estimate: &Estimate, settings: &AggregationSettings) -> Option<Interval> {
    let interval = estimate.interval?;
    let se = estimate.standard_error.filter(|se| *se > 0.0 && se.is_finite())?;
    if settings.alternative != Alternative::TwoSided
        || ((1.0 - settings.confidence_level) - settings.significance_level).abs() > 1e-12
    {
        return None;
    }
    let normal_half_width = z_critical(settings.confidence_level) * se;
    let half_width = (interval.upper - interval.lower) / 2.0;
    (half_width > normal_half_width * (1.0 + WIDER_INTERVAL_TOLERANCE)).then_some(interval)
}

/// Interval used for coverage. With `rebuild_z`, estimates that report a
/// standard error get `estimate ± z·SE` instead of their own interval.
fn coverage_interval(estimate: &Estimate, rebuild_z: Option<f64>) -> Option<Interval> {
    match (rebuild_z, estimate.standard_error) {
        (Some(z), Some(se)) => Some(Interval::around(estimate.point, z * se)),
        _ => estimate.interval,
    }
}

fn rebuilt_estimate(estimate: &Estimate, rebuild_z: Option<f64>) -> Estimate {
    Estimate {
        interval: coverage_interval(estimate, rebuild_z),
        ..*estimate
    }
}

fn summarise_cell(
    parameters: &ParameterPoint,
    estimator: &str,
    combination_index: usize,
    replicates: usize,
    cell: &[EstimateResult],
    settings: &AggregationSettings,
    rebuild_z: Option<f64>,
) -> AggregatedMetric {
    let successes: Vec<(Estimate, Option<f64>)> = cell
        .iter()
        .filter_map(|r| {
            r.estimate()
                .map(|estimate| (rebuilt_estimate(estimate, rebuild_z), r.truth))
        })
        .collect();
    let failures = replicates.saturating_sub(successes.len());

    let truth = cell.iter().find_map(|r| r.truth);

    let points: Vec<f64> = successes.iter().map(|(e, _)| e.point).collect();
    let mean_estimate = mean(&points);
    let errors: Vec<f64> = successes
        .iter()
        .filter_map(|(e, truth)| truth.map(|t| e.point - t))
        .collect();
    let bias = mean(&errors);
    let empirical_sd = sample_std(&points);

    let reported_se: Vec<f64> = successes
        .iter()
        .filter_map(|(e, _)| e.standard_error)
        .collect();
    let mean_standard_error = mean(&reported_se);
    let se_bias = match (mean_standard_error, empirical_sd) {
        (Some(se), Some(sd)) => Some(se - sd),
        _ => None,
    };

    let decisions: Vec<bool> = successes
        .iter()
        .filter_map(|(e, _)| rejects_null(e, settings))
        .collect();
    let power = mean_of_flags(&decisions);

    let covered: Vec<bool> = successes
        .iter()
        .filter_map(|(e, truth)| Some(e.interval?.contains((*truth)?)))
        .collect();
    let coverage = mean_of_flags(&covered);

    AggregatedMetric {
        parameters: parameters.clone(),
        estimator: estimator.to_string(),
        combination_index,
        truth,
        replicates,
        successes: successes.len(),
        failures,
        failure_rate: (replicates > 0).then(|| failures as f64 / replicates as f64),
        power,
        power_mcse: power.and_then(|p| proportion_mcse(p, decisions.len())),
        coverage,
        coverage_mcse: coverage.and_then(|p| proportion_mcse(p, covered.len())),
        mean_estimate,
        bias,
        empirical_sd,
        mean_standard_error,
        se_bias,
    }
}

fn mean_of_flags(flags: &[bool]) -> Option<f64> {
    if flags.is_empty() {
        return None;
    }
    Some(flags.iter().filter(|flag| **flag).count() as f64 / flags.len() as f64)
}

fn aggregate_impl(
    raw: &RawResults,
    settings: AggregationSettings,
    rebuild_z: Option<f64>,
) -> SimulationResults {
    let mut metadata = raw.metadata().clone();
    metadata.settings = settings;

    let mut metrics = Vec::with_capacity(metadata.grid.len() * metadata.estimators.len());
    for (combination_index, point) in metadata.grid.points().iter().enumerate() {
        for (estimator_index, estimator) in metadata.estimators.iter().enumerate() {
            metrics.push(summarise_cell(
                point,
                estimator,
                combination_index,
                metadata.replicates,
                raw.estimates_for(combination_index, estimator_index),
                &settings,
                rebuild_z,
            ));
        }
    }

    SimulationResults::new(metadata, metrics)
}

/// Aggregate raw results under the settings they were produced with.
pub fn aggregate(raw: &RawResults) -> SimulationResults {
    aggregate_impl(raw, raw.metadata().settings, None)
}

/// Aggregate under different test settings, e.g. another alternative
/// hypothesis or significance level. Intervals are used as reported.
pub fn aggregate_with(
    raw: &RawResults,
    settings: AggregationSettings,
) -> Result<SimulationResults, ConfigurationError> {
    validate_settings(&settings)?;
    Ok(aggregate_impl(raw, settings, None))
}

/// Re-aggregate at another confidence level. Estimates with a standard error
/// get a rebuilt normal interval `estimate ± z·SE`; the others keep the
/// interval they reported.
pub fn reaggregate_at_confidence(
    raw: &RawResults,
    confidence_level: f64,
) -> Result<SimulationResults, ConfigurationError> {
    let settings = AggregationSettings {
        confidence_level,
        ..raw.metadata().settings
    };
    validate_settings(&settings)?;
    Ok(aggregate_impl(
        raw,
        settings,
        Some(z_critical(confidence_level)),
    ))
}
