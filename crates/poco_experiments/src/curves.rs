//! Read-only curve projections of aggregated results.
//!
//! A curve plots one metric of one estimator against a single grid
//! dimension. Every other dimension must either be fixed by the caller or,
//! with [`CurveView::facets`], split into one curve per distinct combination.
//! Rendering is left to whatever consumes the [`Curve`] data.

use std::fmt;
use std::str::FromStr;

use poco_core::ParameterPoint;
use serde::{Deserialize, Serialize};

use crate::metrics::AggregatedMetric;
use crate::results::SimulationResults;

/// Metric plotted on the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Power,
    Coverage,
    Bias,
    SeBias,
    MeanEstimate,
    FailureRate,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Power,
        Metric::Coverage,
        Metric::Bias,
        Metric::SeBias,
        Metric::MeanEstimate,
        Metric::FailureRate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Coverage => "coverage",
            Self::Bias => "bias",
            Self::SeBias => "se_bias",
            Self::MeanEstimate => "mean_estimate",
            Self::FailureRate => "failure_rate",
        }
    }

    pub fn value(self, metric: &AggregatedMetric) -> Option<f64> {
        match self {
            Self::Power => metric.power,
            Self::Coverage => metric.coverage,
            Self::Bias => metric.bias,
            Self::SeBias => metric.se_bias,
            Self::MeanEstimate => metric.mean_estimate,
            Self::FailureRate => metric.failure_rate,
        }
    }

    /// Horizontal guide drawn with the curve: the nominal level for power and
    /// coverage, zero for the bias curves.
    fn reference(self, results: &SimulationResults) -> Option<f64> {
        let settings = &results.metadata().settings;
        match self {
            Self::Power => Some(settings.significance_level),
            Self::Coverage => Some(settings.confidence_level),
            Self::Bias | Self::SeBias => Some(0.0),
            Self::MeanEstimate | Self::FailureRate => None,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = CurveError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|metric| metric.as_str() == raw)
            .ok_or_else(|| CurveError::UnknownMetric(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CurveError {
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    #[error("estimator '{0}' is not part of these results")]
    UnknownEstimator(String),

    #[error("'{0}' is not a grid dimension")]
    UnknownParameter(String),

    #[error("parameter '{0}' varies but is neither the axis nor fixed")]
    UnfixedParameter(String),

    #[error("no combinations match the fixed parameters")]
    EmptySelection,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f64,
    /// `None` where the metric is undefined for that cell.
    pub y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub estimator: String,
    pub metric: Metric,
    pub axis: String,
    /// Values of every non-axis dimension shared by the points.
    pub held: ParameterPoint,
    pub reference: Option<f64>,
    /// Points ordered by axis value.
    pub points: Vec<CurvePoint>,
}

/// Curve projections over a finished run.
#[derive(Debug, Clone, Copy)]
pub struct CurveView<'a> {
    results: &'a SimulationResults,
}

impl<'a> CurveView<'a> {
    pub fn new(results: &'a SimulationResults) -> Self {
        Self { results }
    }

    fn check_names(&self, estimator: &str, axis: &str, fixed: &ParameterPoint) -> Result<(), CurveError> {
        if !self.results.estimator_names().iter().any(|name| name == estimator) {
            return Err(CurveError::UnknownEstimator(estimator.to_string()));
        }
        let dimensions = self.results.metadata().grid.dimensions();
        for name in std::iter::once(axis).chain(fixed.names()) {
            if !dimensions.iter().any(|dimension| dimension == name) {
                return Err(CurveError::UnknownParameter(name.to_string()));
            }
        }
        Ok(())
    }

    /// Rows of `estimator` whose parameters agree with `fixed`.
    fn selected(&self, estimator: &str, fixed: &ParameterPoint) -> Vec<&'a AggregatedMetric> {
        self.results
            .metrics()
            .iter()
            .filter(|row| {
                row.estimator == estimator
                    && fixed
                        .iter()
                        .all(|(name, value)| row.parameters.get(name) == Some(value))
            })
            .collect()
    }

    /// Single curve of `metric` against `axis`.
    ///
    /// Fails with [`CurveError::UnfixedParameter`] if a dimension other than
    /// the axis still takes several values after applying `fixed`.
    pub fn curve(
        &self,
        estimator: &str,
        metric: Metric,
        axis: &str,
        fixed: &ParameterPoint,
    ) -> Result<Curve, CurveError> {
        self.check_names(estimator, axis, fixed)?;
        let rows = self.selected(estimator, fixed);
        if rows.is_empty() {
            return Err(CurveError::EmptySelection);
        }

        for dimension in self.results.metadata().grid.dimensions() {
            if dimension == axis || fixed.get(dimension).is_some() {
                continue;
            }
            let first = rows[0].parameters.get(dimension);
            if rows.iter().any(|row| row.parameters.get(dimension) != first) {
                return Err(CurveError::UnfixedParameter(dimension.clone()));
            }
        }

        Ok(self.build_curve(estimator, metric, axis, &rows))
    }

    /// One curve per distinct combination of the non-axis dimensions that
    /// are not fixed, in grid order.
    pub fn facets(
        &self,
        estimator: &str,
        metric: Metric,
        axis: &str,
        fixed: &ParameterPoint,
    ) -> Result<Vec<Curve>, CurveError> {
        self.check_names(estimator, axis, fixed)?;
        let rows = self.selected(estimator, fixed);
        if rows.is_empty() {
            return Err(CurveError::EmptySelection);
        }

        let mut groups: Vec<(ParameterPoint, Vec<&AggregatedMetric>)> = Vec::new();
        for row in rows {
            let key: ParameterPoint = row
                .parameters
                .iter()
                .filter(|(name, _)| *name != axis)
                .collect();
            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, members)) => members.push(row),
                None => groups.push((key, vec![row])),
            }
        }

        Ok(groups
            .into_iter()
            .map(|(_, members)| self.build_curve(estimator, metric, axis, &members))
            .collect())
    }

    /// Curves of `metric` for every estimator in the run.
    pub fn compare_estimators(
        &self,
        metric: Metric,
        axis: &str,
        fixed: &ParameterPoint,
    ) -> Result<Vec<Curve>, CurveError> {
        self.results
            .estimator_names()
            .iter()
            .map(|estimator| self.curve(estimator, metric, axis, fixed))
            .collect()
    }

    fn build_curve(
        &self,
        estimator: &str,
        metric: Metric,
        axis: &str,
        rows: &[&AggregatedMetric],
    ) -> Curve {
        let held: ParameterPoint = rows[0]
            .parameters
            .iter()
            .filter(|(name, _)| *name != axis)
            .collect();

        let mut points: Vec<CurvePoint> = rows
            .iter()
            .filter_map(|row| {
                row.parameters.get(axis).map(|x| CurvePoint {
                    x,
                    y: metric.value(row),
                })
            })
            .collect();
        points.sort_by(|a, b| a.x.total_cmp(&b.x));

        Curve {
            estimator: estimator.to_string(),
            metric,
            axis: axis.to_string(),
            held,
            reference: metric.reference(self.results),
            points,
        }
    }
}
