//! Turning a validated request into runnable components.

use std::path::{Path, PathBuf};

use poco_core::estimators::{SampleMeanEstimator, TwoWayFixedEffectsEstimator};
use poco_core::generators::{
    BootstrapConstantShifter, NormalMeanShifter, PanelBlockTreatment, PanelColumns,
    PanelDataGenerator,
};
use poco_core::{DataGenerator, Dataset, EstimatorSet};
use poco_sweep_core::contract::{EstimatorSpec, GeneratorSpec, NormalizedRequest};

use crate::errors::ConfigurationError;
use crate::parameters::ParameterGrid;
use crate::results::AggregationSettings;
use crate::runner::RunConfig;

/// Components of a run built from a request.
#[derive(Debug)]
pub struct PreparedRun {
    pub run_id: String,
    pub grid: ParameterGrid,
    pub generator: Box<dyn DataGenerator>,
    pub estimators: EstimatorSet,
    pub config: RunConfig,
}

/// Build the grid, generator, estimators and run settings for `request`.
///
/// Relative data paths are resolved against `base_dir`, normally the
/// directory holding the request file.
pub fn prepare_run(
    request: &NormalizedRequest,
    base_dir: &Path,
) -> Result<PreparedRun, ConfigurationError> {
    let grid = ParameterGrid::try_from(request.dimensions.as_slice())?;
    let generator = build_generator(&request.generator, base_dir)?;
    let estimators = build_estimators(&request.estimators)?;

    let config = RunConfig {
        replicates: request.replicates,
        seed: request.seed,
        threads: request.threads,
        batch_size: request.batch_size,
        settings: AggregationSettings {
            significance_level: request.significance_level,
            confidence_level: request.confidence_level,
            null_value: request.null_value,
            alternative: request.alternative,
        },
        show_progress: false,
        cancellation: None,
    };

    Ok(PreparedRun {
        run_id: request.run_id.clone(),
        grid,
        generator,
        estimators,
        config,
    })
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

pub fn build_generator(
    spec: &GeneratorSpec,
    base_dir: &Path,
) -> Result<Box<dyn DataGenerator>, ConfigurationError> {
    let generator: Box<dyn DataGenerator> = match spec {
        GeneratorSpec::NormalMeanShifter {
            n_samples,
            baseline_mean,
            std,
        } => Box::new(NormalMeanShifter::new(*n_samples, *baseline_mean, *std)),
        GeneratorSpec::PanelData {
            n_entities,
            n_periods,
            common_start_time,
            treated_share,
            serial_corr,
        } => Box::new(PanelDataGenerator {
            n_entities: *n_entities,
            n_periods: *n_periods,
            common_start_time: *common_start_time,
            treated_share: *treated_share,
            serial_corr: *serial_corr,
        }),
        GeneratorSpec::BootstrapConstantShifter { data_path, outcome } => {
            let base = load_dataset_csv(&resolve(base_dir, data_path))?;
            Box::new(
                BootstrapConstantShifter::new(base, outcome.clone())
                    .map_err(|error| ConfigurationError::InvalidGenerator(error.to_string()))?,
            )
        }
        GeneratorSpec::PanelBlockTreatment {
            data_path,
            entity,
            time,
            treatment,
            outcome,
            treatment_start,
            treated_portion,
            mode,
        } => {
            let base = load_dataset_csv(&resolve(base_dir, data_path))?;
            let columns = PanelColumns {
                entity: entity.clone(),
                time: time.clone(),
                treatment: treatment.clone(),
                outcome: outcome.clone(),
            };
            Box::new(
                PanelBlockTreatment::new(base, columns, *treatment_start, *treated_portion, *mode)
                    .map_err(|error| ConfigurationError::InvalidGenerator(error.to_string()))?,
            )
        }
    };
    Ok(generator)
}

pub fn build_estimators(specs: &[EstimatorSpec]) -> Result<EstimatorSet, ConfigurationError> {
    if specs.is_empty() {
        return Err(ConfigurationError::EmptyEstimatorSet);
    }

    let mut set = EstimatorSet::new();
    for spec in specs {
        let name = spec.resolved_name();
        match spec {
            EstimatorSpec::SampleMean { column, .. } => {
                set.register(SampleMeanEstimator::new(column.clone()).named(name))?;
            }
            EstimatorSpec::Twfe {
                outcome,
                treatment,
                entity,
                time,
                to_percentage,
                ..
            } => {
                set.register(
                    TwoWayFixedEffectsEstimator::new()
                        .named(name)
                        .columns(outcome.clone(), treatment.clone(), entity.clone(), time.clone())
                        .to_percentage(*to_percentage),
                )?;
            }
        }
    }
    Ok(set)
}

/// Load a numeric CSV file with a header row into a [`Dataset`].
///
/// Every cell must parse as a number; empty cells become NaN.
pub fn load_dataset_csv(path: &Path) -> Result<Dataset, ConfigurationError> {
    let data_error = |reason: String| ConfigurationError::DataFile {
        path: path.to_path_buf(),
        reason,
    };

    let mut rdr = csv::Reader::from_path(path).map_err(|error| data_error(error.to_string()))?;
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|error| data_error(error.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row, record) in rdr.records().enumerate() {
        let record = record.map_err(|error| data_error(error.to_string()))?;
        for (index, column) in columns.iter_mut().enumerate() {
            let raw = record.get(index).unwrap_or_default().trim();
            let value = if raw.is_empty() {
                f64::NAN
            } else {
                raw.parse::<f64>().map_err(|_| {
                    data_error(format!(
                        "row {}, column '{}': '{raw}' is not a number",
                        row + 1,
                        headers[index]
                    ))
                })?
            };
            column.push(value);
        }
    }

    Dataset::from_columns(headers.into_iter().zip(columns))
        .map_err(|error| data_error(error.to_string()))
}
