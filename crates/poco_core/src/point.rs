//! A single parameter combination from a grid.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered `(name, value)` assignments for one grid combination.
///
/// Order follows the grid's dimension order so that exported tables and
/// curve facets are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterPoint {
    values: Vec<(String, f64)>,
}

impl ParameterPoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, replacing an existing assignment.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.values.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| *value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for ParameterPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (name, value)) in self.values.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

impl<N: Into<String>> FromIterator<(N, f64)> for ParameterPoint {
    fn from_iter<T: IntoIterator<Item = (N, f64)>>(iter: T) -> Self {
        let mut point = Self::new();
        for (name, value) in iter {
            point.set(name, value);
        }
        point
    }
}
