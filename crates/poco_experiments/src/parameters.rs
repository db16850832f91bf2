//! Parameter grids swept by a simulation run.
//!
//! A grid is the Cartesian product of named dimensions. Dimensions keep their
//! insertion order and the last dimension varies fastest, so combination `i`
//! is decoded from `i` as a mixed-radix number. Grids can also be sampled at
//! random or given as an explicit list of points.

use std::collections::HashSet;

use poco_core::ParameterPoint;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

pub use poco_sweep_core::contract::linspace;

use crate::errors::ConfigurationError;
use crate::export::is_reserved_column;

/// Checks shared by built and explicit grids.
fn check_dimension_name<'a>(
    name: &'a str,
    seen: &mut HashSet<&'a str>,
) -> Result<(), ConfigurationError> {
    if name.trim().is_empty() {
        return Err(ConfigurationError::EmptyDimensionName);
    }
    if is_reserved_column(name) {
        return Err(ConfigurationError::ReservedDimension(name.to_string()));
    }
    if !seen.insert(name) {
        return Err(ConfigurationError::DuplicateDimension(name.to_string()));
    }
    Ok(())
}

/// Builder for a Cartesian-product grid.
#[derive(Debug, Clone, Default)]
pub struct ParameterSpace {
    dimensions: Vec<(String, Vec<f64>)>,
}

impl ParameterSpace {
    /// Start an empty grid.
    pub fn grid() -> Self {
        Self::default()
    }

    /// Add a dimension. Validation happens in [`generate`](Self::generate).
    pub fn dimension(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.dimensions.push((name.into(), values));
        self
    }

    /// Add an evenly spaced dimension including both endpoints.
    pub fn linspace(self, name: impl Into<String>, start: f64, stop: f64, num: usize) -> Self {
        self.dimension(name, linspace(start, stop, num))
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.dimensions.is_empty() {
            return Err(ConfigurationError::EmptyGrid);
        }

        let mut seen = HashSet::new();
        for (name, values) in &self.dimensions {
            check_dimension_name(name, &mut seen)?;
            if values.is_empty() {
                return Err(ConfigurationError::EmptyDimension(name.clone()));
            }
            if let Some(value) = values.iter().find(|value| !value.is_finite()) {
                return Err(ConfigurationError::NonFiniteValue {
                    dimension: name.clone(),
                    value: *value,
                });
            }
        }
        Ok(())
    }

    /// Number of combinations in the full product.
    pub fn total_points(&self) -> usize {
        self.dimensions
            .iter()
            .map(|(_, values)| values.len())
            .product()
    }

    /// Combination at `index` of the product, last dimension fastest.
    fn point_at(&self, mut index: usize) -> ParameterPoint {
        let mut values = vec![0.0; self.dimensions.len()];
        for (slot, (_, dimension_values)) in values.iter_mut().zip(&self.dimensions).rev() {
            let radix = dimension_values.len();
            *slot = dimension_values[index % radix];
            index /= radix;
        }
        self.dimensions
            .iter()
            .zip(values)
            .map(|((name, _), value)| (name.clone(), value))
            .collect()
    }

    /// Expand the full Cartesian product.
    pub fn generate(&self) -> Result<ParameterGrid, ConfigurationError> {
        self.validate()?;
        let points = (0..self.total_points()).map(|i| self.point_at(i)).collect();
        Ok(ParameterGrid {
            dimensions: self.dimension_names(),
            points,
        })
    }

    /// Draw `count` distinct combinations of the product (Monte Carlo
    /// sampling). Sampled points keep their grid order. Asking for more
    /// points than exist returns the full grid.
    pub fn sample_random(&self, count: usize, seed: u64) -> Result<ParameterGrid, ConfigurationError> {
        self.validate()?;
        let total = self.total_points();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut indices = rand::seq::index::sample(&mut rng, total, count.min(total)).into_vec();
        indices.sort_unstable();

        Ok(ParameterGrid {
            dimensions: self.dimension_names(),
            points: indices.into_iter().map(|i| self.point_at(i)).collect(),
        })
    }

    fn dimension_names(&self) -> Vec<String> {
        self.dimensions.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Ordered parameter combinations evaluated by a run.
///
/// Every point assigns exactly the grid's dimensions, in dimension order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterGrid {
    dimensions: Vec<String>,
    points: Vec<ParameterPoint>,
}

impl ParameterGrid {
    /// Grid from explicit points. Points are reordered to dimension order.
    pub fn from_points(
        dimensions: Vec<String>,
        points: Vec<ParameterPoint>,
    ) -> Result<Self, ConfigurationError> {
        if dimensions.is_empty() {
            return Err(ConfigurationError::EmptyGrid);
        }
        let mut seen = HashSet::new();
        for name in &dimensions {
            check_dimension_name(name, &mut seen)?;
        }

        let mut ordered = Vec::with_capacity(points.len());
        for (index, point) in points.iter().enumerate() {
            if point.len() != dimensions.len() {
                return Err(ConfigurationError::InconsistentPoint { index });
            }
            let mut normalized = ParameterPoint::new();
            for name in &dimensions {
                let value = point
                    .get(name)
                    .ok_or(ConfigurationError::InconsistentPoint { index })?;
                if !value.is_finite() {
                    return Err(ConfigurationError::NonFiniteValue {
                        dimension: name.clone(),
                        value,
                    });
                }
                normalized.set(name.clone(), value);
            }
            ordered.push(normalized);
        }

        Ok(Self {
            dimensions,
            points: ordered,
        })
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn points(&self) -> &[ParameterPoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&ParameterPoint> {
        self.points.get(index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Distinct values of one dimension in first-seen order.
    pub fn values_of(&self, dimension: &str) -> Vec<f64> {
        let mut values: Vec<f64> = Vec::new();
        for value in self.points.iter().filter_map(|point| point.get(dimension)) {
            if !values.iter().any(|seen| seen.to_bits() == value.to_bits()) {
                values.push(value);
            }
        }
        values
    }
}

impl TryFrom<&[(String, Vec<f64>)]> for ParameterGrid {
    type Error = ConfigurationError;

    fn try_from(dimensions: &[(String, Vec<f64>)]) -> Result<Self, Self::Error> {
        dimensions
            .iter()
            .fold(ParameterSpace::grid(), |space, (name, values)| {
                space.dimension(name.clone(), values.clone())
            })
            .generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_search_single_parameter() {
        let grid = ParameterSpace::grid()
            .dimension("effect_size", vec![0.0, 0.1, 0.2])
            .generate()
            .unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.dimensions(), ["effect_size".to_string()]);
    }

    #[test]
    fn test_last_dimension_varies_fastest() {
        let grid = ParameterSpace::grid()
            .dimension("n", vec![10.0, 20.0])
            .dimension("effect_size", vec![0.0, 0.5, 1.0])
            .generate()
            .unwrap();

        assert_eq!(grid.len(), 6);
        let pairs: Vec<(f64, f64)> = grid
            .points()
            .iter()
            .map(|p| (p.get("n").unwrap(), p.get("effect_size").unwrap()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (10.0, 0.0),
                (10.0, 0.5),
                (10.0, 1.0),
                (20.0, 0.0),
                (20.0, 0.5),
                (20.0, 1.0)
            ]
        );
    }

    #[test]
    fn test_random_sampling() {
        let space = ParameterSpace::grid()
            .dimension("n", vec![10.0, 20.0, 30.0, 40.0])
            .dimension("effect_size", vec![0.0, 0.5, 1.0]);
        let sample = space.sample_random(5, 42).unwrap();
        assert_eq!(sample.len(), 5);
        assert_eq!(sample, space.sample_random(5, 42).unwrap());

        let full = space.generate().unwrap();
        let positions: Vec<usize> = sample
            .points()
            .iter()
            .map(|p| full.points().iter().position(|q| q == p).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(space.sample_random(100, 1).unwrap(), full);
    }

    #[test]
    fn test_invalid_dimensions_rejected() {
        assert_eq!(
            ParameterSpace::grid().generate().unwrap_err(),
            ConfigurationError::EmptyGrid
        );
        assert_eq!(
            ParameterSpace::grid()
                .dimension("n", vec![1.0])
                .dimension("n", vec![2.0])
                .generate()
                .unwrap_err(),
            ConfigurationError::DuplicateDimension("n".to_string())
        );
        assert_eq!(
            ParameterSpace::grid()
                .dimension("n", vec![])
                .generate()
                .unwrap_err(),
            ConfigurationError::EmptyDimension("n".to_string())
        );
        assert!(matches!(
            ParameterSpace::grid()
                .dimension("x", vec![f64::NAN])
                .generate()
                .unwrap_err(),
            ConfigurationError::NonFiniteValue { .. }
        ));
    }

    #[test]
    fn test_export_column_names_rejected() {
        assert_eq!(
            ParameterSpace::grid()
                .dimension("estimator", vec![1.0, 2.0])
                .generate()
                .unwrap_err(),
            ConfigurationError::ReservedDimension("estimator".to_string())
        );
        assert_eq!(
            ParameterSpace::grid()
                .dimension("n", vec![10.0])
                .dimension("power", vec![0.8])
                .sample_random(1, 0)
                .unwrap_err(),
            ConfigurationError::ReservedDimension("power".to_string())
        );
        assert_eq!(
            ParameterGrid::from_points(
                vec!["truth".to_string()],
                vec![ParameterPoint::new().with("truth", 1.0)],
            )
            .unwrap_err(),
            ConfigurationError::ReservedDimension("truth".to_string())
        );
    }

    #[test]
    fn test_explicit_points_are_reordered() {
        let grid = ParameterGrid::from_points(
            vec!["n".to_string(), "effect_size".to_string()],
            vec![ParameterPoint::new().with("effect_size", 0.2).with("n", 50.0)],
        )
        .unwrap();
        let names: Vec<&str> = grid.points()[0].names().collect();
        assert_eq!(names, vec!["n", "effect_size"]);

        let error = ParameterGrid::from_points(
            vec!["n".to_string()],
            vec![ParameterPoint::new().with("m", 1.0)],
        )
        .unwrap_err();
        assert_eq!(error, ConfigurationError::InconsistentPoint { index: 0 });
    }

    #[test]
    fn test_values_of_keeps_first_seen_order() {
        let grid = ParameterSpace::grid()
            .dimension("n", vec![30.0, 10.0])
            .linspace("effect_size", 0.0, 1.0, 3)
            .generate()
            .unwrap();
        assert_eq!(grid.values_of("n"), vec![30.0, 10.0]);
        assert_eq!(grid.values_of("effect_size"), vec![0.0, 0.5, 1.0]);
        assert!(grid.values_of("missing").is_empty());
    }
}
