//! The `poco run` command: request file or preset in, metric table out.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use poco_experiments::config::prepare_run;
use poco_experiments::presets;
use poco_experiments::{
    export_to_csv, export_to_json, export_to_parquet, run_simulation, SimulationResults,
};
use poco_sweep_core::contract::{
    load_request, normalize_request, request_fingerprint, RequestOverrides, SimulationRequest,
};

/// Where a request comes from.
pub enum RequestSource {
    File(PathBuf),
    Preset(String),
}

pub struct RunOptions {
    pub source: RequestSource,
    pub overrides: RequestOverrides,
    pub output: PathBuf,
    pub json: Option<PathBuf>,
    pub parquet: Option<PathBuf>,
    pub show_progress: bool,
}

fn load(source: &RequestSource) -> Result<(SimulationRequest, PathBuf)> {
    match source {
        RequestSource::File(path) => {
            let request = load_request(path)?;
            let base_dir = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."));
            Ok((request, base_dir))
        }
        RequestSource::Preset(name) => match presets::preset(name) {
            Some(request) => Ok((request, PathBuf::from("."))),
            None => bail!(
                "unknown preset '{name}', expected one of: {}",
                presets::PRESET_NAMES.join(", ")
            ),
        },
    }
}

pub fn execute(options: RunOptions) -> Result<SimulationResults> {
    let (mut request, base_dir) = load(&options.source)?;
    request.apply_overrides(options.overrides);

    let normalized = normalize_request(request).context("invalid simulation request")?;
    let fingerprint = request_fingerprint(&normalized)?;
    tracing::info!(
        run_id = %normalized.run_id,
        fingerprint = %fingerprint,
        parameter_points = normalized.total_points,
        replicates = normalized.replicates,
        seed = normalized.seed,
        "loaded request"
    );

    let prepared = prepare_run(&normalized, &base_dir)?;
    let config = prepared.config.with_progress(options.show_progress);
    let results = run_simulation(
        &prepared.grid,
        &prepared.estimators,
        prepared.generator.as_ref(),
        &config,
    )?;

    for error in results.combination_errors() {
        tracing::warn!(combination = %error.point, error = %error.error, "combination skipped");
    }

    export_to_csv(&results, &options.output)
        .with_context(|| format!("failed to write {}", options.output.display()))?;
    tracing::info!(path = %options.output.display(), rows = results.metrics().len(), "wrote csv");

    if let Some(path) = &options.json {
        export_to_json(&results, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote json");
    }
    if let Some(path) = &options.parquet {
        export_to_parquet(&results, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote parquet");
    }

    Ok(results)
}

/// One line per estimator: cells with a defined power and mean failure rate.
pub fn summary_lines(results: &SimulationResults) -> Vec<String> {
    results
        .estimator_names()
        .iter()
        .map(|name| {
            let rows: Vec<_> = results.for_estimator(name).collect();
            let with_power = rows.iter().filter(|m| m.power.is_some()).count();
            let rates: Vec<f64> = rows.iter().filter_map(|m| m.failure_rate).collect();
            let failure = if rates.is_empty() {
                "n/a".to_string()
            } else {
                format!("{:.3}", rates.iter().sum::<f64>() / rates.len() as f64)
            };
            format!(
                "{name}: {} cells, {with_power} with power, mean failure rate {failure}",
                rows.len()
            )
        })
        .collect()
}
