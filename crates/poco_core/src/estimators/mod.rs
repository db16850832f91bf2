//! Estimator contract and built-in estimators.
//!
//! An [`Estimator`] maps a dataset to an [`Estimate`]: a point estimate plus
//! an optional standard error and confidence interval. Which optional parts an
//! estimator provides is declared once through [`Capabilities`] and checked
//! when it is registered into an [`EstimatorSet`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, DatasetError};

mod registry;
mod sample_mean;
mod twfe;

pub use registry::{EstimatorSet, RegisteredEstimator, RegistrationError};
pub use sample_mean::SampleMeanEstimator;
pub use twfe::TwoWayFixedEffectsEstimator;

/// Closed confidence interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Symmetric interval `center ± half_width`.
    pub fn around(center: f64, half_width: f64) -> Self {
        Self {
            lower: center - half_width,
            upper: center + half_width,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Optional outputs an estimator promises to report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub standard_error: bool,
    pub interval: bool,
}

impl Capabilities {
    pub const POINT_ONLY: Self = Self {
        standard_error: false,
        interval: false,
    };

    pub const FULL: Self = Self {
        standard_error: true,
        interval: true,
    };
}

/// Output of one estimator on one dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub point: f64,
    pub standard_error: Option<f64>,
    pub interval: Option<Interval>,
}

impl Estimate {
    pub fn point(point: f64) -> Self {
        Self {
            point,
            standard_error: None,
            interval: None,
        }
    }

    pub fn with_standard_error(mut self, standard_error: f64) -> Self {
        self.standard_error = Some(standard_error);
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = Some(interval);
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum EstimationError {
    #[error("estimator did not converge: {0}")]
    NonConvergence(String),

    #[error("dataset rejected: {0}")]
    InvalidData(String),

    #[error("estimator produced a non-finite {0}")]
    NonFinite(String),

    #[error("estimator panicked: {0}")]
    Panicked(String),
}

impl From<DatasetError> for EstimationError {
    fn from(error: DatasetError) -> Self {
        Self::InvalidData(error.to_string())
    }
}

/// Contract for anything that can be evaluated by simulation.
pub trait Estimator: Send + Sync + fmt::Debug {
    /// Unique name within a run; used as the estimator column in results.
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::POINT_ONLY
    }

    /// Estimate on `dataset`; intervals use `confidence_level` (e.g. 0.95).
    fn estimate(&self, dataset: &Dataset, confidence_level: f64)
        -> Result<Estimate, EstimationError>;
}

/// Adapter turning a closure into an [`Estimator`].
pub struct FnEstimator<F> {
    name: String,
    capabilities: Capabilities,
    estimate_fn: F,
}

impl<F> FnEstimator<F>
where
    F: Fn(&Dataset, f64) -> Result<Estimate, EstimationError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, capabilities: Capabilities, estimate_fn: F) -> Self {
        Self {
            name: name.into(),
            capabilities,
            estimate_fn,
        }
    }
}

impl<F> fmt::Debug for FnEstimator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEstimator")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl<F> Estimator for FnEstimator<F>
where
    F: Fn(&Dataset, f64) -> Result<Estimate, EstimationError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn estimate(
        &self,
        dataset: &Dataset,
        confidence_level: f64,
    ) -> Result<Estimate, EstimationError> {
        (self.estimate_fn)(dataset, confidence_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_contains_bounds() {
        let interval = Interval::around(1.0, 0.5);
        assert!(interval.contains(0.5));
        assert!(interval.contains(1.5));
        assert!(!interval.contains(1.6));
        assert_eq!(interval.width(), 1.0);
    }

    #[test]
    fn test_fn_estimator_delegates() {
        let estimator = FnEstimator::new("first", Capabilities::POINT_ONLY, |data, _| {
            Ok(Estimate::point(data.column("y")?[0]))
        });
        let data = Dataset::new().with_column("y", vec![3.5]).unwrap();
        assert_eq!(estimator.name(), "first");
        assert_eq!(estimator.estimate(&data, 0.95).unwrap().point, 3.5);
    }
}
