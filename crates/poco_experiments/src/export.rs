//! Tabular export of aggregated results.
//!
//! The table has one row per (combination, estimator): the grid dimensions,
//! the estimator name, then every [`AggregatedMetric`] field. Undefined
//! metrics are empty CSV cells and Parquet nulls. CSV output can be read back
//! with [`import_from_csv`] without loss.

use std::fs::File;
use std::path::Path;

use crate::metrics::AggregatedMetric;
use crate::results::SimulationResults;

#[path = "export/csv.rs"]
mod csv;
#[path = "export/json.rs"]
mod json;
#[path = "export/parquet.rs"]
mod parquet;
#[path = "export/writer_utils.rs"]
mod writer_utils;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no results to export")]
    Empty,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] ::csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[error("malformed results table: {0}")]
    Format(String),
}

/// Whether `name` is a column the exporters write after the grid dimensions.
/// Such names cannot be used as dimensions.
pub fn is_reserved_column(name: &str) -> bool {
    name == csv::ESTIMATOR_COLUMN || csv::METRIC_COLUMNS.contains(&name)
}

/// Table read back from a CSV export.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedTable {
    pub dimensions: Vec<String>,
    pub metrics: Vec<AggregatedMetric>,
}

/// Export the metric table to Parquet.
///
/// # Errors
///
/// Returns an error if there are no rows, or file creation or Parquet writing
/// fails.
pub fn export_to_parquet(
    results: &SimulationResults,
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    writer_utils::ensure_not_empty(results.metrics())?;
    let file = writer_utils::create_output_file(path)?;
    parquet::export_to_parquet_impl(
        results.metrics(),
        results.metadata().grid.dimensions(),
        file,
    )
}

/// Export the full results, metadata included, as pretty-printed JSON.
pub fn export_to_json(
    results: &SimulationResults,
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    let file = writer_utils::create_output_file(path)?;
    json::export_to_json_impl(results, file)
}

/// Read results written by [`export_to_json`].
pub fn import_from_json(path: impl AsRef<Path>) -> Result<SimulationResults, ExportError> {
    json::import_from_json_impl(File::open(path)?)
}

/// Export the metric table to CSV.
///
/// # Errors
///
/// Returns an error if there are no rows, a row lacks a grid dimension, or
/// file creation or CSV writing fails.
pub fn export_to_csv(
    results: &SimulationResults,
    path: impl AsRef<Path>,
) -> Result<(), ExportError> {
    writer_utils::ensure_not_empty(results.metrics())?;
    let file = writer_utils::create_output_file(path)?;
    csv::export_to_csv_impl(
        results.metrics(),
        results.metadata().grid.dimensions(),
        file,
    )
}

/// Read a table written by [`export_to_csv`].
///
/// The trailing columns must be `estimator` followed by the metric columns;
/// everything before them is taken as grid dimensions.
pub fn import_from_csv(path: impl AsRef<Path>) -> Result<ImportedTable, ExportError> {
    let (dimensions, metrics) = csv::import_from_csv_impl(File::open(path)?)?;
    Ok(ImportedTable {
        dimensions,
        metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterSpace;
    use crate::runner::{run_simulation, RunConfig};
    use poco_core::estimators::SampleMeanEstimator;
    use poco_core::generators::NormalMeanShifter;
    use poco_core::EstimatorSet;
    use tempfile::NamedTempFile;

    fn small_results() -> SimulationResults {
        let grid = ParameterSpace::grid()
            .dimension("n", vec![2.0, 30.0])
            .dimension("effect_size", vec![0.0, 0.3])
            .generate()
            .unwrap();
        let estimators = EstimatorSet::new()
            .with(SampleMeanEstimator::new("y"))
            .unwrap();
        run_simulation(
            &grid,
            &estimators,
            &NormalMeanShifter::default(),
            &RunConfig::default().with_replicates(8).with_seed(5),
        )
        .unwrap()
    }

    #[test]
    fn test_export_to_json() {
        let results = small_results();
        let file = NamedTempFile::new().unwrap();
        export_to_json(&results, file.path()).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert!(contents.contains("coverage_mcse"));

        let restored = import_from_json(file.path()).unwrap();
        assert_eq!(restored.metrics().len(), results.metrics().len());
        assert_eq!(restored.metadata().seed, 5);
    }

    #[test]
    fn test_export_to_csv_layout() {
        let results = small_results();
        let file = NamedTempFile::new().unwrap();
        export_to_csv(&results, file.path()).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let header = contents.lines().next().unwrap();
        assert!(header.starts_with("n,effect_size,estimator,combination_index,truth"));
        assert_eq!(contents.lines().count(), 5);
    }

    #[test]
    fn test_export_to_parquet() {
        let results = small_results();
        let file = NamedTempFile::new().unwrap();
        export_to_parquet(&results, file.path()).unwrap();
        assert!(std::fs::metadata(file.path()).unwrap().len() > 0);
    }

    #[test]
    fn test_import_reads_metric_columns_from_the_right() {
        let results = small_results();
        let file = NamedTempFile::new().unwrap();
        export_to_csv(&results, file.path()).unwrap();

        // A dimension that shadows the estimator column in a hand-edited table.
        let contents = std::fs::read_to_string(file.path()).unwrap();
        let renamed = contents.replacen("n,effect_size,", "estimator,effect_size,", 1);
        std::fs::write(file.path(), renamed).unwrap();

        let table = import_from_csv(file.path()).unwrap();
        assert_eq!(table.dimensions, vec!["estimator", "effect_size"]);
        assert_eq!(table.metrics.len(), 4);
        assert_eq!(table.metrics[0].estimator, "sample_mean");
        assert_eq!(table.metrics[0].parameters.get("estimator"), Some(2.0));
    }

    #[test]
    fn test_reserved_columns() {
        assert!(is_reserved_column("estimator"));
        assert!(is_reserved_column("power"));
        assert!(is_reserved_column("combination_index"));
        assert!(!is_reserved_column("n"));
    }

    #[test]
    fn test_import_rejects_foreign_table() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "a,b\n1,2\n").unwrap();
        assert!(matches!(
            import_from_csv(file.path()).unwrap_err(),
            ExportError::Format(_)
        ));
    }
}
