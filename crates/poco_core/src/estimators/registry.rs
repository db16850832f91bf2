use std::sync::Arc;

use super::{Capabilities, Estimate, EstimationError, Estimator};
use crate::dataset::Dataset;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("estimator names must be non-empty")]
    EmptyName,

    #[error("estimator '{0}' is already registered")]
    DuplicateName(String),
}

/// An estimator together with the capabilities captured at registration.
#[derive(Debug, Clone)]
pub struct RegisteredEstimator {
    name: String,
    capabilities: Capabilities,
    estimator: Arc<dyn Estimator>,
}

impl RegisteredEstimator {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Run the estimator and normalise its output.
    ///
    /// Outputs the estimator did not declare at registration are dropped, and
    /// non-finite values are reported as failures instead of being recorded.
    pub fn apply(
        &self,
        dataset: &Dataset,
        confidence_level: f64,
    ) -> Result<Estimate, EstimationError> {
        let raw = self.estimator.estimate(dataset, confidence_level)?;
        if !raw.point.is_finite() {
            return Err(EstimationError::NonFinite("point estimate".to_string()));
        }

        let standard_error = if self.capabilities.standard_error {
            match raw.standard_error {
                Some(se) if !se.is_finite() || se < 0.0 => {
                    return Err(EstimationError::NonFinite("standard error".to_string()))
                }
                other => other,
            }
        } else {
            None
        };

        let interval = if self.capabilities.interval {
            match raw.interval {
                Some(interval) if !interval.lower.is_finite() || !interval.upper.is_finite() => {
                    return Err(EstimationError::NonFinite("interval".to_string()))
                }
                other => other,
            }
        } else {
            None
        };

        Ok(Estimate {
            point: raw.point,
            standard_error,
            interval,
        })
    }
}

/// Ordered set of uniquely named estimators evaluated on every replicate.
#[derive(Debug, Clone, Default)]
pub struct EstimatorSet {
    entries: Vec<RegisteredEstimator>,
}

impl EstimatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an estimator, recording its capabilities.
    pub fn register<E>(&mut self, estimator: E) -> Result<&mut Self, RegistrationError>
    where
        E: Estimator + 'static,
    {
        self.register_arc(Arc::new(estimator))
    }

    pub fn register_arc(
        &mut self,
        estimator: Arc<dyn Estimator>,
    ) -> Result<&mut Self, RegistrationError> {
        let name = estimator.name().trim().to_string();
        if name.is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        if self.entries.iter().any(|entry| entry.name == name) {
            return Err(RegistrationError::DuplicateName(name));
        }

        let capabilities = estimator.capabilities();
        self.entries.push(RegisteredEstimator {
            name,
            capabilities,
            estimator,
        });
        Ok(self)
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<E>(mut self, estimator: E) -> Result<Self, RegistrationError>
    where
        E: Estimator + 'static,
    {
        self.register(estimator)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RegisteredEstimator> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredEstimator> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::{FnEstimator, Interval};

    fn constant(name: &str, capabilities: Capabilities) -> impl Estimator {
        FnEstimator::new(name, capabilities, |_, _| {
            Ok(Estimate::point(1.0)
                .with_standard_error(0.5)
                .with_interval(Interval::new(0.0, 2.0)))
        })
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut set = EstimatorSet::new();
        set.register(constant("mean", Capabilities::FULL)).unwrap();
        let error = set.register(constant("mean", Capabilities::FULL)).unwrap_err();
        assert_eq!(error, RegistrationError::DuplicateName("mean".to_string()));
    }

    #[test]
    fn test_empty_name_rejected() {
        let error = EstimatorSet::new()
            .with(constant("  ", Capabilities::FULL))
            .unwrap_err();
        assert_eq!(error, RegistrationError::EmptyName);
    }

    #[test]
    fn test_undeclared_outputs_dropped() {
        let set = EstimatorSet::new()
            .with(constant("point_only", Capabilities::POINT_ONLY))
            .unwrap();
        let estimate = set.get(0).unwrap().apply(&Dataset::new(), 0.95).unwrap();
        assert_eq!(estimate.standard_error, None);
        assert_eq!(estimate.interval, None);
    }

    #[test]
    fn test_non_finite_point_is_failure() {
        let set = EstimatorSet::new()
            .with(FnEstimator::new("nan", Capabilities::POINT_ONLY, |_, _| {
                Ok(Estimate::point(f64::NAN))
            }))
            .unwrap();
        let error = set.get(0).unwrap().apply(&Dataset::new(), 0.95).unwrap_err();
        assert!(matches!(error, EstimationError::NonFinite(_)));
    }
}
