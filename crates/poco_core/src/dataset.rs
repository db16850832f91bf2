//! Column-oriented in-memory datasets.
//!
//! Generators produce a [`Dataset`] per replicate and estimators read named
//! columns from it. Every column has the same length; identifiers such as
//! panel entities and periods are stored as `f64` like any other column.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatasetError {
    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("row index {index} out of bounds for dataset with {rows} rows")]
    RowOutOfBounds { index: usize, rows: usize },
}

/// A named column of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Ordered collection of equally long named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: usize,
}

impl Dataset {
    /// Create an empty dataset with no columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dataset from `(name, values)` pairs, in order.
    pub fn from_columns<N, I>(columns: I) -> Result<Self, DatasetError>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Vec<f64>)>,
    {
        columns
            .into_iter()
            .try_fold(Self::new(), |dataset, (name, values)| {
                dataset.with_column(name, values)
            })
    }

    /// Append a column. The first column fixes the row count.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, DatasetError> {
        self.push_column(name, values)?;
        Ok(self)
    }

    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(DatasetError::DuplicateColumn(name));
        }
        if !self.columns.is_empty() && values.len() != self.rows {
            return Err(DatasetError::LengthMismatch {
                column: name,
                expected: self.rows,
                actual: values.len(),
            });
        }

        self.rows = values.len();
        self.columns.push(Column { name, values });
        Ok(())
    }

    /// Insert a column, replacing an existing column of the same name.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<(), DatasetError> {
        let name = name.into();
        match self.columns.iter_mut().find(|column| column.name == name) {
            Some(existing) => {
                if values.len() != self.rows {
                    return Err(DatasetError::LengthMismatch {
                        column: name,
                        expected: self.rows,
                        actual: values.len(),
                    });
                }
                existing.values = values;
                Ok(())
            }
            None => self.push_column(name, values),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn column(&self, name: &str) -> Result<&[f64], DatasetError> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.values.as_slice())
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    }

    pub fn column_mut(&mut self, name: &str) -> Result<&mut [f64], DatasetError> {
        self.columns
            .iter_mut()
            .find(|column| column.name == name)
            .map(|column| column.values.as_mut_slice())
            .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
    }

    /// Build a new dataset from the given row indices (repeats allowed).
    pub fn select_rows(&self, indices: &[usize]) -> Result<Self, DatasetError> {
        if let Some(&index) = indices.iter().find(|&&index| index >= self.rows) {
            return Err(DatasetError::RowOutOfBounds {
                index,
                rows: self.rows,
            });
        }

        let columns = self
            .columns
            .iter()
            .map(|column| Column {
                name: column.name.clone(),
                values: indices.iter().map(|&i| column.values[i]).collect(),
            })
            .collect();

        Ok(Self {
            columns,
            rows: indices.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_columns([("x", vec![1.0, 2.0, 3.0]), ("y", vec![4.0, 5.0, 6.0])])
            .unwrap()
    }

    #[test]
    fn test_from_columns_keeps_order_and_rows() {
        let dataset = sample();
        assert_eq!(dataset.rows(), 3);
        assert_eq!(dataset.column_names().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(dataset.column("y").unwrap(), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let error = sample().with_column("z", vec![1.0]).unwrap_err();
        assert_eq!(
            error,
            DatasetError::LengthMismatch {
                column: "z".to_string(),
                expected: 3,
                actual: 1,
            }
        );
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let error = sample().with_column("x", vec![0.0; 3]).unwrap_err();
        assert_eq!(error, DatasetError::DuplicateColumn("x".to_string()));
    }

    #[test]
    fn test_select_rows_repeats() {
        let resampled = sample().select_rows(&[2, 2, 0]).unwrap();
        assert_eq!(resampled.rows(), 3);
        assert_eq!(resampled.column("x").unwrap(), &[3.0, 3.0, 1.0]);
        assert_eq!(resampled.column("y").unwrap(), &[6.0, 6.0, 4.0]);
    }

    #[test]
    fn test_select_rows_out_of_bounds() {
        let error = sample().select_rows(&[0, 3]).unwrap_err();
        assert_eq!(error, DatasetError::RowOutOfBounds { index: 3, rows: 3 });
    }

    #[test]
    fn test_set_column_replaces_in_place() {
        let mut dataset = sample();
        dataset.set_column("x", vec![0.0, 0.0, 0.0]).unwrap();
        dataset.set_column("d", vec![1.0, 0.0, 1.0]).unwrap();
        assert_eq!(dataset.column("x").unwrap(), &[0.0, 0.0, 0.0]);
        assert_eq!(dataset.column_names().collect::<Vec<_>>(), vec!["x", "y", "d"]);
    }
}
