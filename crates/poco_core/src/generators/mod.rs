//! Data-generating processes.
//!
//! A [`DataGenerator`] turns one grid combination plus a per-replicate RNG
//! into a dataset and, when known, the true value of the estimand. Parametric
//! generators simulate from a model; empirical generators resample or perturb
//! a fixed input dataset.
//!
//! Generators never touch process-global randomness: the runner hands every
//! replicate its own seeded [`StdRng`].

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, DatasetError};
use crate::point::ParameterPoint;

mod bootstrap;
mod normal_mean;
mod panel;
mod panel_block;

pub use bootstrap::BootstrapConstantShifter;
pub use normal_mean::NormalMeanShifter;
pub use panel::PanelDataGenerator;
pub use panel_block::{EffectMode, PanelBlockTreatment, PanelColumns};

/// Grid dimension read by every built-in generator as the injected effect.
pub const EFFECT_SIZE: &str = "effect_size";

/// Largest row count a built-in generator will draw for one replicate.
pub const MAX_ROWS: usize = 10_000_000;

#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum GenerationError {
    /// The combination lies outside the generator's domain. Aborts the whole
    /// combination when raised by [`DataGenerator::validate`].
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// A single replicate could not be produced.
    #[error("generation failed: {0}")]
    Failure(String),
}

impl GenerationError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<DatasetError> for GenerationError {
    fn from(error: DatasetError) -> Self {
        Self::Failure(error.to_string())
    }
}

/// One generated replicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub dataset: Dataset,
    /// Known value of the estimand, if the process defines one.
    pub truth: Option<f64>,
}

/// Contract for producing replicate datasets.
pub trait DataGenerator: Send + Sync + std::fmt::Debug {
    /// Short identifier recorded in run metadata.
    fn name(&self) -> &str;

    /// Check a combination before any replicate is drawn.
    fn validate(&self, point: &ParameterPoint) -> Result<(), GenerationError> {
        let _ = point;
        Ok(())
    }

    /// Draw one dataset for `point` using only `rng` as randomness.
    fn generate(&self, point: &ParameterPoint, rng: &mut StdRng) -> Result<Draw, GenerationError>;
}

/// Read an optional real-valued dimension, falling back to `default`.
pub(crate) fn real_parameter(
    point: &ParameterPoint,
    name: &str,
    default: f64,
) -> Result<f64, GenerationError> {
    let value = point.get(name).unwrap_or(default);
    if !value.is_finite() {
        return Err(GenerationError::invalid(name, "must be finite"));
    }
    Ok(value)
}

/// Read an optional count dimension; must be a positive integer no larger
/// than [`MAX_ROWS`].
pub(crate) fn count_parameter(
    point: &ParameterPoint,
    name: &str,
    default: usize,
) -> Result<usize, GenerationError> {
    let count = match point.get(name) {
        None => default,
        Some(value) => {
            if !value.is_finite() || value.fract() != 0.0 || value < 1.0 {
                return Err(GenerationError::invalid(
                    name,
                    format!("must be a positive integer, got {value}"),
                ));
            }
            if value > MAX_ROWS as f64 {
                return Err(too_many_rows(name, value));
            }
            value as usize
        }
    };

    if count == 0 {
        return Err(GenerationError::invalid(name, "must be a positive integer"));
    }
    if count > MAX_ROWS {
        return Err(too_many_rows(name, count as f64));
    }
    Ok(count)
}

pub(crate) fn too_many_rows(name: &str, value: f64) -> GenerationError {
    GenerationError::invalid(name, format!("{value} exceeds the limit of {MAX_ROWS} rows"))
}

/// Read a proportion dimension in `[0, 1]`.
pub(crate) fn share_parameter(
    point: &ParameterPoint,
    name: &str,
    default: f64,
) -> Result<f64, GenerationError> {
    let value = real_parameter(point, name, default)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(GenerationError::invalid(
            name,
            format!("must be between 0 and 1, got {value}"),
        ));
    }
    Ok(value)
}

pub(crate) fn effect_size(point: &ParameterPoint) -> Result<f64, GenerationError> {
    real_parameter(point, EFFECT_SIZE, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_parameter_rules() {
        let point = ParameterPoint::new()
            .with("n", 25.0)
            .with("bad", 2.5)
            .with("zero", 0.0);
        assert_eq!(count_parameter(&point, "n", 10), Ok(25));
        assert_eq!(count_parameter(&point, "missing", 10), Ok(10));
        assert!(matches!(
            count_parameter(&point, "bad", 10),
            Err(GenerationError::InvalidParameter { .. })
        ));
        assert!(matches!(
            count_parameter(&point, "zero", 10),
            Err(GenerationError::InvalidParameter { .. })
        ));
        assert!(count_parameter(&point, "missing", 0).is_err());
    }

    #[test]
    fn test_count_parameter_upper_bound() {
        let point = ParameterPoint::new()
            .with("huge", 1e20)
            .with("limit", MAX_ROWS as f64);
        assert!(matches!(
            count_parameter(&point, "huge", 10),
            Err(GenerationError::InvalidParameter { ref name, .. }) if name == "huge"
        ));
        assert_eq!(count_parameter(&point, "limit", 10), Ok(MAX_ROWS));
        assert!(count_parameter(&point, "missing", MAX_ROWS + 1).is_err());
    }

    #[test]
    fn test_share_parameter_bounds() {
        let point = ParameterPoint::new().with("share", 1.5);
        assert!(share_parameter(&point, "share", 0.5).is_err());
        assert_eq!(share_parameter(&point, "other", 0.5), Ok(0.5));
    }

    #[test]
    fn test_effect_size_defaults_to_zero() {
        assert_eq!(effect_size(&ParameterPoint::new()), Ok(0.0));
        let point = ParameterPoint::new().with(EFFECT_SIZE, f64::NAN);
        assert!(effect_size(&point).is_err());
    }
}
