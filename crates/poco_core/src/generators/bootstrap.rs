use rand::rngs::StdRng;
use rand::Rng;

use super::{effect_size, DataGenerator, Draw, GenerationError};
use crate::dataset::{Dataset, DatasetError};
use crate::point::ParameterPoint;

/// Empirical generator: bootstrap rows of a base dataset and shift the outcome.
///
/// Each replicate resamples `rows` rows with replacement and adds the effect
/// size to `outcome` on every row, simulating a constant additive effect.
#[derive(Debug, Clone)]
pub struct BootstrapConstantShifter {
    base: Dataset,
    outcome: String,
}

impl BootstrapConstantShifter {
    pub fn new(base: Dataset, outcome: impl Into<String>) -> Result<Self, DatasetError> {
        let outcome = outcome.into();
        base.column(&outcome)?;
        Ok(Self { base, outcome })
    }

    pub fn base(&self) -> &Dataset {
        &self.base
    }
}

impl DataGenerator for BootstrapConstantShifter {
    fn name(&self) -> &str {
        "bootstrap_constant_shifter"
    }

    fn validate(&self, point: &ParameterPoint) -> Result<(), GenerationError> {
        if self.base.is_empty() {
            return Err(GenerationError::invalid(
                &self.outcome,
                "base dataset has no rows to resample",
            ));
        }
        effect_size(point).map(|_| ())
    }

    fn generate(&self, point: &ParameterPoint, rng: &mut StdRng) -> Result<Draw, GenerationError> {
        let effect = effect_size(point)?;
        let rows = self.base.rows();
        if rows == 0 {
            return Err(GenerationError::Failure(
                "base dataset has no rows to resample".to_string(),
            ));
        }

        let indices: Vec<usize> = (0..rows).map(|_| rng.gen_range(0..rows)).collect();
        let mut dataset = self.base.select_rows(&indices)?;
        for value in dataset.column_mut(&self.outcome)? {
            *value += effect;
        }

        Ok(Draw {
            dataset,
            truth: Some(effect),
        })
    }
}
