use poco_core::ParameterPoint;

use super::writer_utils::optional_cell;
use super::ExportError;
use crate::metrics::AggregatedMetric;

pub(crate) const ESTIMATOR_COLUMN: &str = "estimator";

/// Columns written after the grid dimensions and the estimator name.
pub(crate) const METRIC_COLUMNS: [&str; 15] = [
    "combination_index",
    "truth",
    "replicates",
    "successes",
    "failures",
    "failure_rate",
    "power",
    "power_mcse",
    "coverage",
    "coverage_mcse",
    "mean_estimate",
    "bias",
    "empirical_sd",
    "mean_standard_error",
    "se_bias",
];

pub(crate) fn export_to_csv_impl(
    metrics: &[AggregatedMetric],
    dimensions: &[String],
    file: std::fs::File,
) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(file);

    let header: Vec<&str> = dimensions
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(ESTIMATOR_COLUMN))
        .chain(METRIC_COLUMNS)
        .collect();
    wtr.write_record(&header)?;

    for metric in metrics {
        let mut record = Vec::with_capacity(header.len());
        for dimension in dimensions {
            let value = metric.parameters.get(dimension).ok_or_else(|| {
                ExportError::Format(format!(
                    "row for combination {} has no value for '{dimension}'",
                    metric.combination_index
                ))
            })?;
            record.push(value.to_string());
        }
        record.push(metric.estimator.clone());
        record.push(metric.combination_index.to_string());
        record.push(optional_cell(metric.truth));
        record.push(metric.replicates.to_string());
        record.push(metric.successes.to_string());
        record.push(metric.failures.to_string());
        record.push(optional_cell(metric.failure_rate));
        record.push(optional_cell(metric.power));
        record.push(optional_cell(metric.power_mcse));
        record.push(optional_cell(metric.coverage));
        record.push(optional_cell(metric.coverage_mcse));
        record.push(optional_cell(metric.mean_estimate));
        record.push(optional_cell(metric.bias));
        record.push(optional_cell(metric.empirical_sd));
        record.push(optional_cell(metric.mean_standard_error));
        record.push(optional_cell(metric.se_bias));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

fn parse_f64(column: &str, raw: &str) -> Result<f64, ExportError> {
    raw.parse::<f64>()
        .map_err(|error| ExportError::Format(format!("column '{column}': {error}")))
}

fn parse_optional(column: &str, raw: &str) -> Result<Option<f64>, ExportError> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_f64(column, raw).map(Some)
}

fn parse_count(column: &str, raw: &str) -> Result<usize, ExportError> {
    raw.parse::<usize>()
        .map_err(|error| ExportError::Format(format!("column '{column}': {error}")))
}

pub(crate) fn import_from_csv_impl(
    file: std::fs::File,
) -> Result<(Vec<String>, Vec<AggregatedMetric>), ExportError> {
    let mut rdr = csv::Reader::from_reader(file);
    let headers = rdr.headers()?.clone();

    let estimator_position = headers
        .len()
        .checked_sub(METRIC_COLUMNS.len() + 1)
        .filter(|position| headers.get(*position) == Some(ESTIMATOR_COLUMN))
        .ok_or_else(|| ExportError::Format("missing 'estimator' column".to_string()))?;
    let dimensions: Vec<String> = headers
        .iter()
        .take(estimator_position)
        .map(str::to_string)
        .collect();
    let trailing: Vec<&str> = headers.iter().skip(estimator_position + 1).collect();
    if trailing != METRIC_COLUMNS {
        return Err(ExportError::Format(
            "metric columns do not match the export layout".to_string(),
        ));
    }

    let mut metrics = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let cell = |index: usize| record.get(index).unwrap_or_default();

        let mut parameters = ParameterPoint::new();
        for (index, dimension) in dimensions.iter().enumerate() {
            parameters.set(dimension.clone(), parse_f64(dimension, cell(index))?);
        }

        let metric_cell = |offset: usize| cell(estimator_position + 1 + offset);
        let optional = |offset: usize| parse_optional(METRIC_COLUMNS[offset], metric_cell(offset));
        let count = |offset: usize| parse_count(METRIC_COLUMNS[offset], metric_cell(offset));

        metrics.push(AggregatedMetric {
            parameters,
            estimator: cell(estimator_position).to_string(),
            combination_index: count(0)?,
            truth: optional(1)?,
            replicates: count(2)?,
            successes: count(3)?,
            failures: count(4)?,
            failure_rate: optional(5)?,
            power: optional(6)?,
            power_mcse: optional(7)?,
            coverage: optional(8)?,
            coverage_mcse: optional(9)?,
            mean_estimate: optional(10)?,
            bias: optional(11)?,
            empirical_sd: optional(12)?,
            mean_standard_error: optional(13)?,
            se_bias: optional(14)?,
        });
    }

    Ok((dimensions, metrics))
}
