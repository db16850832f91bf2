use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use super::{count_parameter, effect_size, real_parameter, DataGenerator, Draw, GenerationError};
use crate::dataset::Dataset;
use crate::point::ParameterPoint;

/// Parametric generator: i.i.d. normal draws with the mean shifted by the effect.
///
/// Produces a single column `y` with `n` rows drawn from
/// `Normal(baseline_mean + effect_size, std)`. The grid may override the
/// sample size through an `n` dimension and the spread through `std`.
#[derive(Debug, Clone)]
pub struct NormalMeanShifter {
    pub n_samples: usize,
    pub baseline_mean: f64,
    pub std: f64,
}

impl Default for NormalMeanShifter {
    fn default() -> Self {
        Self {
            n_samples: 100,
            baseline_mean: 0.0,
            std: 1.0,
        }
    }
}

impl NormalMeanShifter {
    pub fn new(n_samples: usize, baseline_mean: f64, std: f64) -> Self {
        Self {
            n_samples,
            baseline_mean,
            std,
        }
    }

    fn resolve(&self, point: &ParameterPoint) -> Result<(usize, f64, f64), GenerationError> {
        let n = count_parameter(point, "n", self.n_samples)?;
        let std = real_parameter(point, "std", self.std)?;
        if std < 0.0 {
            return Err(GenerationError::invalid("std", "must be non-negative"));
        }
        let effect = effect_size(point)?;
        Ok((n, std, effect))
    }
}

impl DataGenerator for NormalMeanShifter {
    fn name(&self) -> &str {
        "normal_mean_shifter"
    }

    fn validate(&self, point: &ParameterPoint) -> Result<(), GenerationError> {
        self.resolve(point).map(|_| ())
    }

    fn generate(&self, point: &ParameterPoint, rng: &mut StdRng) -> Result<Draw, GenerationError> {
        let (n, std, effect) = self.resolve(point)?;
        let normal = Normal::new(self.baseline_mean + effect, std)
            .map_err(|error| GenerationError::Failure(error.to_string()))?;
        let values: Vec<f64> = (0..n).map(|_| normal.sample(rng)).collect();

        Ok(Draw {
            dataset: Dataset::new().with_column("y", values)?,
            truth: Some(effect),
        })
    }
}
