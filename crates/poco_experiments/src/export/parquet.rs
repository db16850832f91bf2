use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;

use super::ExportError;
use crate::metrics::AggregatedMetric;

pub(crate) fn export_to_parquet_impl(
    metrics: &[AggregatedMetric],
    dimensions: &[String],
    file: std::fs::File,
) -> Result<(), ExportError> {
    let batch = build_record_batch(metrics, dimensions)?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

fn build_record_batch(
    metrics: &[AggregatedMetric],
    dimensions: &[String],
) -> Result<RecordBatch, arrow::error::ArrowError> {
    let schema = Arc::new(parquet_schema(dimensions));
    let arrays = build_arrays(metrics, dimensions);

    RecordBatch::try_new(schema, arrays)
}

fn parquet_schema(dimensions: &[String]) -> Schema {
    let mut fields: Vec<Field> = dimensions
        .iter()
        .map(|name| Field::new(name.as_str(), DataType::Float64, true))
        .collect();
    fields.extend([
        Field::new("estimator", DataType::Utf8, false),
        Field::new("combination_index", DataType::UInt64, false),
        Field::new("truth", DataType::Float64, true),
        Field::new("replicates", DataType::UInt64, false),
        Field::new("successes", DataType::UInt64, false),
        Field::new("failures", DataType::UInt64, false),
        Field::new("failure_rate", DataType::Float64, true),
        Field::new("power", DataType::Float64, true),
        Field::new("power_mcse", DataType::Float64, true),
        Field::new("coverage", DataType::Float64, true),
        Field::new("coverage_mcse", DataType::Float64, true),
        Field::new("mean_estimate", DataType::Float64, true),
        Field::new("bias", DataType::Float64, true),
        Field::new("empirical_sd", DataType::Float64, true),
        Field::new("mean_standard_error", DataType::Float64, true),
        Field::new("se_bias", DataType::Float64, true),
    ]);
    Schema::new(fields)
}

fn optional_column<F>(metrics: &[AggregatedMetric], value: F) -> ArrayRef
where
    F: Fn(&AggregatedMetric) -> Option<f64>,
{
    Arc::new(Float64Array::from(
        metrics.iter().map(value).collect::<Vec<_>>(),
    ))
}

fn count_column<F>(metrics: &[AggregatedMetric], value: F) -> ArrayRef
where
    F: Fn(&AggregatedMetric) -> usize,
{
    Arc::new(UInt64Array::from(
        metrics
            .iter()
            .map(|m| value(m) as u64)
            .collect::<Vec<_>>(),
    ))
}

fn build_arrays(metrics: &[AggregatedMetric], dimensions: &[String]) -> Vec<ArrayRef> {
    let mut arrays: Vec<ArrayRef> = dimensions
        .iter()
        .map(|name| optional_column(metrics, |m| m.parameters.get(name)))
        .collect();

    arrays.push(Arc::new(StringArray::from(
        metrics
            .iter()
            .map(|m| m.estimator.as_str())
            .collect::<Vec<_>>(),
    )));
    arrays.push(count_column(metrics, |m| m.combination_index));
    arrays.push(optional_column(metrics, |m| m.truth));
    arrays.push(count_column(metrics, |m| m.replicates));
    arrays.push(count_column(metrics, |m| m.successes));
    arrays.push(count_column(metrics, |m| m.failures));
    arrays.push(optional_column(metrics, |m| m.failure_rate));
    arrays.push(optional_column(metrics, |m| m.power));
    arrays.push(optional_column(metrics, |m| m.power_mcse));
    arrays.push(optional_column(metrics, |m| m.coverage));
    arrays.push(optional_column(metrics, |m| m.coverage_mcse));
    arrays.push(optional_column(metrics, |m| m.mean_estimate));
    arrays.push(optional_column(metrics, |m| m.bias));
    arrays.push(optional_column(metrics, |m| m.empirical_sd));
    arrays.push(optional_column(metrics, |m| m.mean_standard_error));
    arrays.push(optional_column(metrics, |m| m.se_bias));
    arrays
}
