use super::{Capabilities, Estimate, EstimationError, Estimator, Interval};
use crate::dataset::Dataset;
use crate::stats::t_quantile;

/// Two-way fixed effects regression of an outcome on a treatment indicator.
///
/// Requires a balanced panel (every entity observed once in every period).
/// The slope is estimated on double-demeaned data; the classical standard
/// error uses `N*T - N - T` residual degrees of freedom and the interval a
/// Student-t quantile. With `to_percentage`, the estimate, its standard error
/// and the interval are divided by the mean outcome of treated rows.
#[derive(Debug, Clone)]
pub struct TwoWayFixedEffectsEstimator {
    name: String,
    outcome: String,
    treatment: String,
    entity: String,
    time: String,
    to_percentage: bool,
}

impl Default for TwoWayFixedEffectsEstimator {
    fn default() -> Self {
        Self {
            name: "twfe".to_string(),
            outcome: "y".to_string(),
            treatment: "d".to_string(),
            entity: "entity".to_string(),
            time: "time".to_string(),
            to_percentage: false,
        }
    }
}

impl TwoWayFixedEffectsEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(
        mut self,
        outcome: impl Into<String>,
        treatment: impl Into<String>,
        entity: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        self.outcome = outcome.into();
        self.treatment = treatment.into();
        self.entity = entity.into();
        self.time = time.into();
        self
    }

    pub fn to_percentage(mut self, enabled: bool) -> Self {
        self.to_percentage = enabled;
        self
    }
}

/// Map identifier values to dense indices in sorted order.
fn dense_ids(values: &[f64]) -> (Vec<usize>, usize) {
    let mut unique = values.to_vec();
    unique.sort_by(f64::total_cmp);
    unique.dedup();
    let ids = values
        .iter()
        .map(|v| {
            unique
                .binary_search_by(|probe| probe.total_cmp(v))
                .unwrap_or_default()
        })
        .collect();
    (ids, unique.len())
}

/// Subtract entity and period means and add back the grand mean.
fn double_demean(values: &[f64], entity: &[usize], time: &[usize], n: usize, t: usize) -> Vec<f64> {
    let mut entity_sum = vec![0.0; n];
    let mut time_sum = vec![0.0; t];
    let mut total = 0.0;
    for ((value, &i), &p) in values.iter().zip(entity).zip(time) {
        entity_sum[i] += value;
        time_sum[p] += value;
        total += value;
    }
    let grand = total / values.len() as f64;

    values
        .iter()
        .zip(entity)
        .zip(time)
        .map(|((value, &i), &p)| value - entity_sum[i] / t as f64 - time_sum[p] / n as f64 + grand)
        .collect()
}

impl Estimator for TwoWayFixedEffectsEstimator {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::FULL
    }

    fn estimate(
        &self,
        dataset: &Dataset,
        confidence_level: f64,
    ) -> Result<Estimate, EstimationError> {
        let y = dataset.column(&self.outcome)?;
        let d = dataset.column(&self.treatment)?;
        let (entity, n) = dense_ids(dataset.column(&self.entity)?);
        let (time, t) = dense_ids(dataset.column(&self.time)?);

        if y.iter().chain(d).any(|v| !v.is_finite()) {
            return Err(EstimationError::InvalidData(
                "outcome and treatment must be finite".to_string(),
            ));
        }
        if dataset.rows() != n * t {
            return Err(EstimationError::InvalidData(format!(
                "panel is unbalanced: {} rows for {n} entities x {t} periods",
                dataset.rows()
            )));
        }
        let mut seen = vec![false; n * t];
        for (&i, &p) in entity.iter().zip(&time) {
            let cell = i * t + p;
            if seen[cell] {
                return Err(EstimationError::InvalidData(
                    "duplicate entity/period observation".to_string(),
                ));
            }
            seen[cell] = true;
        }

        let degrees_of_freedom = (n * t) as f64 - n as f64 - t as f64;
        if degrees_of_freedom < 1.0 {
            return Err(EstimationError::InvalidData(
                "not enough observations for two-way fixed effects".to_string(),
            ));
        }

        let y_within = double_demean(y, &entity, &time, n, t);
        let d_within = double_demean(d, &entity, &time, n, t);

        let sxx: f64 = d_within.iter().map(|v| v * v).sum();
        if sxx <= 1e-12 {
            return Err(EstimationError::NonConvergence(
                "treatment has no within variation".to_string(),
            ));
        }
        let sxy: f64 = d_within.iter().zip(&y_within).map(|(x, y)| x * y).sum();
        let beta = sxy / sxx;

        let rss: f64 = d_within
            .iter()
            .zip(&y_within)
            .map(|(x, y)| {
                let residual = y - beta * x;
                residual * residual
            })
            .sum();
        let se = (rss / degrees_of_freedom / sxx).sqrt();

        let critical = t_quantile(1.0 - (1.0 - confidence_level) / 2.0, degrees_of_freedom)
            .ok_or_else(|| {
                EstimationError::InvalidData(format!(
                    "confidence level {confidence_level} is outside (0, 1)"
                ))
            })?;
        let mut estimate = Estimate::point(beta)
            .with_standard_error(se)
            .with_interval(Interval::around(beta, critical * se));

        if self.to_percentage {
            let treated: Vec<f64> = y
                .iter()
                .zip(d)
                .filter(|(_, treatment)| **treatment == 1.0)
                .map(|(&outcome, _)| outcome)
                .collect();
            let baseline = treated.iter().sum::<f64>() / treated.len() as f64;
            if treated.is_empty() || baseline == 0.0 {
                return Err(EstimationError::NonConvergence(
                    "treated outcome mean is zero or undefined".to_string(),
                ));
            }
            estimate = Estimate::point(beta / baseline)
                .with_standard_error(se / baseline.abs())
                .with_interval(Interval::around(beta / baseline, critical * se / baseline.abs()));
        }

        Ok(estimate)
    }
}
