use std::path::{Path, PathBuf};

use poco_core::generators::EffectMode;
use poco_core::Alternative;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const REQUEST_SCHEMA_VERSION: &str = "v1";
pub const MAX_DIMENSION_VALUES: usize = 10_000;
pub const MAX_TOTAL_PARAMETER_POINTS: usize = 200_000;
pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Values for one grid dimension: an explicit list or an evenly spaced range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DimensionValues {
    List(Vec<f64>),
    Linspace { start: f64, stop: f64, num: usize },
}

impl DimensionValues {
    /// Number of values without expanding a linspace.
    pub fn len(&self) -> usize {
        match self {
            Self::List(values) => values.len(),
            Self::Linspace { num, .. } => *num,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand to the concrete value list. `Linspace` includes both endpoints.
    pub fn expand(&self) -> Vec<f64> {
        match self {
            Self::List(values) => values.clone(),
            Self::Linspace { start, stop, num } => linspace(*start, *stop, *num),
        }
    }
}

/// `num` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| if i == num - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionSpec {
    pub name: String,
    pub values: DimensionValues,
}

fn default_n_samples() -> usize {
    100
}

fn default_std() -> f64 {
    1.0
}

fn default_n_entities() -> usize {
    100
}

fn default_n_periods() -> usize {
    10
}

fn default_common_start_time() -> usize {
    5
}

fn default_share() -> f64 {
    0.5
}

fn default_outcome() -> String {
    "y".to_string()
}

fn default_treatment() -> String {
    "d".to_string()
}

fn default_entity() -> String {
    "entity".to_string()
}

fn default_time() -> String {
    "time".to_string()
}

/// Data-generating process selected by a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratorSpec {
    NormalMeanShifter {
        #[serde(default = "default_n_samples")]
        n_samples: usize,
        #[serde(default)]
        baseline_mean: f64,
        #[serde(default = "default_std")]
        std: f64,
    },
    PanelData {
        #[serde(default = "default_n_entities")]
        n_entities: usize,
        #[serde(default = "default_n_periods")]
        n_periods: usize,
        #[serde(default = "default_common_start_time")]
        common_start_time: usize,
        #[serde(default = "default_share")]
        treated_share: f64,
        #[serde(default)]
        serial_corr: f64,
    },
    BootstrapConstantShifter {
        data_path: PathBuf,
        #[serde(default = "default_outcome")]
        outcome: String,
    },
    PanelBlockTreatment {
        data_path: PathBuf,
        #[serde(default = "default_entity")]
        entity: String,
        #[serde(default = "default_time")]
        time: String,
        #[serde(default = "default_treatment")]
        treatment: String,
        #[serde(default = "default_outcome")]
        outcome: String,
        treatment_start: f64,
        #[serde(default = "default_share")]
        treated_portion: f64,
        #[serde(default)]
        mode: EffectMode,
    },
}

impl GeneratorSpec {
    /// Data file referenced by empirical generators.
    pub fn data_path(&self) -> Option<&Path> {
        match self {
            Self::BootstrapConstantShifter { data_path, .. }
            | Self::PanelBlockTreatment { data_path, .. } => Some(data_path),
            _ => None,
        }
    }
}

/// Estimator selected by a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorSpec {
    SampleMean {
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "default_outcome")]
        column: String,
    },
    Twfe {
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "default_outcome")]
        outcome: String,
        #[serde(default = "default_treatment")]
        treatment: String,
        #[serde(default = "default_entity")]
        entity: String,
        #[serde(default = "default_time")]
        time: String,
        #[serde(default)]
        to_percentage: bool,
    },
}

impl EstimatorSpec {
    /// Name the estimator will be registered under.
    pub fn resolved_name(&self) -> String {
        match self {
            Self::SampleMean { name, .. } => name.clone().unwrap_or_else(|| "sample_mean".to_string()),
            Self::Twfe { name, .. } => name.clone().unwrap_or_else(|| "twfe".to_string()),
        }
    }
}

fn default_significance_level() -> f64 {
    DEFAULT_SIGNIFICANCE_LEVEL
}

fn default_confidence_level() -> f64 {
    DEFAULT_CONFIDENCE_LEVEL
}

fn default_seed() -> u64 {
    42
}

/// A simulation run as written in a configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationRequest {
    pub run_id: String,
    pub dimensions: Vec<DimensionSpec>,
    pub generator: GeneratorSpec,
    pub estimators: Vec<EstimatorSpec>,
    pub replicates: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default = "default_significance_level")]
    pub significance_level: f64,
    #[serde(default = "default_confidence_level")]
    pub confidence_level: f64,
    #[serde(default)]
    pub null_value: f64,
    #[serde(default)]
    pub alternative: Alternative,
}

/// Values that take precedence over the file (CLI flags, environment).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOverrides {
    pub seed: Option<u64>,
    pub replicates: Option<usize>,
    pub threads: Option<usize>,
}

impl SimulationRequest {
    pub fn apply_overrides(&mut self, overrides: RequestOverrides) {
        if let Some(seed) = overrides.seed {
            self.seed = seed;
        }
        if let Some(replicates) = overrides.replicates {
            self.replicates = replicates;
        }
        if let Some(threads) = overrides.threads {
            self.threads = Some(threads);
        }
    }
}

/// Request after validation, with every dimension expanded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedRequest {
    pub run_id: String,
    pub dimensions: Vec<(String, Vec<f64>)>,
    pub total_points: usize,
    pub generator: GeneratorSpec,
    pub estimators: Vec<EstimatorSpec>,
    pub replicates: usize,
    pub seed: u64,
    pub threads: Option<usize>,
    pub batch_size: Option<usize>,
    pub significance_level: f64,
    pub confidence_level: f64,
    pub null_value: f64,
    pub alternative: Alternative,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Parse a request from JSON, or TOML when `path` ends in `.toml`.
pub fn parse_request(path: &Path, contents: &str) -> Result<SimulationRequest, ValidationError> {
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if is_toml {
        toml::from_str(contents)
            .map_err(|error| ValidationError::new(format!("Invalid TOML request: {error}")))
    } else {
        serde_json::from_str(contents)
            .map_err(|error| ValidationError::new(format!("Invalid JSON request: {error}")))
    }
}

/// Read and parse a request file.
pub fn load_request(path: &Path) -> Result<SimulationRequest, ValidationError> {
    let contents = std::fs::read_to_string(path).map_err(|error| {
        ValidationError::new(format!("Failed to read {}: {error}", path.display()))
    })?;
    parse_request(path, &contents)
}

fn check_probability(name: &str, value: f64) -> Result<(), ValidationError> {
    if !(value > 0.0 && value < 1.0) {
        return Err(ValidationError::new(format!(
            "{name} must lie strictly between 0 and 1, got {value}"
        )));
    }
    Ok(())
}

pub fn normalize_request(payload: SimulationRequest) -> Result<NormalizedRequest, ValidationError> {
    let run_id = payload.run_id.trim().to_string();
    if run_id.is_empty() {
        return Err(ValidationError::new("run_id cannot be empty"));
    }

    if payload.dimensions.is_empty() {
        return Err(ValidationError::new("dimensions cannot be empty"));
    }

    let mut dimensions: Vec<(String, Vec<f64>)> = Vec::with_capacity(payload.dimensions.len());
    let mut total_points = 1usize;
    for spec in &payload.dimensions {
        let name = spec.name.trim();
        if name.is_empty() {
            return Err(ValidationError::new(
                "dimension names must be non-empty strings",
            ));
        }
        if dimensions.iter().any(|(existing, _)| existing == name) {
            return Err(ValidationError::new(format!(
                "Dimension '{name}' is declared more than once"
            )));
        }

        if spec.values.is_empty() {
            return Err(ValidationError::new(format!(
                "Dimension '{name}' must be a non-empty list"
            )));
        }
        if spec.values.len() > MAX_DIMENSION_VALUES {
            return Err(ValidationError::new(format!(
                "Dimension '{name}' exceeds MAX_DIMENSION_VALUES={MAX_DIMENSION_VALUES}"
            )));
        }
        let values = spec.values.expand();
        if values.iter().any(|value| !value.is_finite()) {
            return Err(ValidationError::new(format!(
                "Dimension '{name}' contains a non-finite value"
            )));
        }

        total_points = total_points.saturating_mul(values.len());
        if total_points > MAX_TOTAL_PARAMETER_POINTS {
            return Err(ValidationError::new(format!(
                "Parameter grid is too large (>{MAX_TOTAL_PARAMETER_POINTS} points)"
            )));
        }
        dimensions.push((name.to_string(), values));
    }

    if payload.estimators.is_empty() {
        return Err(ValidationError::new("estimators cannot be empty"));
    }
    let mut names: Vec<String> = payload.estimators.iter().map(EstimatorSpec::resolved_name).collect();
    names.sort_unstable();
    if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(ValidationError::new(format!(
            "Estimator name '{}' is used more than once",
            pair[0]
        )));
    }

    if payload.replicates == 0 {
        return Err(ValidationError::new(
            "replicates must be a positive integer",
        ));
    }

    if let Some(0) = payload.threads {
        return Err(ValidationError::new("threads must be a positive integer"));
    }

    if let Some(0) = payload.batch_size {
        return Err(ValidationError::new(
            "batch_size must be a positive integer",
        ));
    }

    check_probability("significance_level", payload.significance_level)?;
    check_probability("confidence_level", payload.confidence_level)?;
    if !payload.null_value.is_finite() {
        return Err(ValidationError::new("null_value must be finite"));
    }

    Ok(NormalizedRequest {
        run_id,
        dimensions,
        total_points,
        generator: payload.generator,
        estimators: payload.estimators,
        replicates: payload.replicates,
        seed: payload.seed,
        threads: payload.threads,
        batch_size: payload.batch_size,
        significance_level: payload.significance_level,
        confidence_level: payload.confidence_level,
        null_value: payload.null_value,
        alternative: payload.alternative,
    })
}

pub fn request_fingerprint(request: &NormalizedRequest) -> Result<String, serde_json::Error> {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(request)?);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn stable_contract_json(value: impl Serialize) -> Result<String, serde_json::Error> {
    serde_json::to_string(&value)
}
