use super::{Capabilities, Estimate, EstimationError, Estimator, Interval};
use crate::dataset::Dataset;
use crate::stats::{mean, sample_std, z_critical};

/// Sample mean of one column with a normal-approximation interval.
///
/// NaN values are dropped. Standard error is `sd / sqrt(n)` with `ddof = 1`.
#[derive(Debug, Clone)]
pub struct SampleMeanEstimator {
    name: String,
    column: String,
}

impl SampleMeanEstimator {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            name: "sample_mean".to_string(),
            column: column.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Estimator for SampleMeanEstimator {
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
        let values: Vec<f64> = dataset
            .column(&self.column)?
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .collect();
        if values.len() < 2 {
            return Err(EstimationError::InvalidData(format!(
                "need at least 2 observations in '{}', got {}",
                self.column,
                values.len()
            )));
        }

        let n = values.len() as f64;
        let avg = mean(&values).ok_or_else(|| EstimationError::NonFinite("mean".to_string()))?;
        let sd = sample_std(&values)
            .ok_or_else(|| EstimationError::NonFinite("standard deviation".to_string()))?;
        let se = sd / n.sqrt();
        let z = z_critical(confidence_level);

        Ok(Estimate::point(avg)
            .with_standard_error(se)
            .with_interval(Interval::around(avg, z * se)))
    }
}
