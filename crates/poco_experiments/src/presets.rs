//! Pre-defined simulation requests.
//!
//! Each preset is a complete request that runs without input data, so it
//! can be selected by name from the command line.

use poco_core::Alternative;
use poco_sweep_core::contract::{
    DimensionSpec, DimensionValues, EstimatorSpec, GeneratorSpec, SimulationRequest,
};

pub const PRESET_NAMES: [&str; 3] = ["normal_mean", "sample_size_power", "panel_twfe"];

fn effect_sizes(start: f64, stop: f64, num: usize) -> DimensionSpec {
    DimensionSpec {
        name: "effect_size".to_string(),
        values: DimensionValues::Linspace { start, stop, num },
    }
}

fn sample_mean() -> EstimatorSpec {
    EstimatorSpec::SampleMean {
        name: None,
        column: "y".to_string(),
    }
}

fn base_request(run_id: &str, generator: GeneratorSpec, estimators: Vec<EstimatorSpec>) -> SimulationRequest {
    SimulationRequest {
        run_id: run_id.to_string(),
        dimensions: Vec::new(),
        generator,
        estimators,
        replicates: 500,
        seed: 24,
        threads: None,
        batch_size: None,
        significance_level: 0.05,
        confidence_level: 0.95,
        null_value: 0.0,
        alternative: Alternative::TwoSided,
    }
}

/// Power and coverage of the sample mean for a normal shift of 0 to 0.5.
pub fn normal_mean() -> SimulationRequest {
    let mut request = base_request(
        "normal_mean",
        GeneratorSpec::NormalMeanShifter {
            n_samples: 100,
            baseline_mean: 0.0,
            std: 1.0,
        },
        vec![sample_mean()],
    );
    request.dimensions = vec![effect_sizes(0.0, 0.5, 20)];
    request
}

/// Power curves of the sample mean for several sample sizes.
pub fn sample_size_power() -> SimulationRequest {
    let mut request = base_request(
        "sample_size_power",
        GeneratorSpec::NormalMeanShifter {
            n_samples: 100,
            baseline_mean: 0.0,
            std: 1.0,
        },
        vec![sample_mean()],
    );
    request.dimensions = vec![
        DimensionSpec {
            name: "n".to_string(),
            values: DimensionValues::List(vec![25.0, 50.0, 100.0, 200.0]),
        },
        effect_sizes(0.0, 0.5, 11),
    ];
    request.confidence_level = 0.90;
    request
}

/// Two-way fixed effects on a simulated panel with serially correlated errors.
pub fn panel_twfe() -> SimulationRequest {
    let mut request = base_request(
        "panel_twfe",
        GeneratorSpec::PanelData {
            n_entities: 100,
            n_periods: 10,
            common_start_time: 5,
            treated_share: 0.5,
            serial_corr: 0.8,
        },
        vec![EstimatorSpec::Twfe {
            name: None,
            outcome: "y".to_string(),
            treatment: "d".to_string(),
            entity: "entity".to_string(),
            time: "time".to_string(),
            to_percentage: false,
        }],
    );
    request.dimensions = vec![effect_sizes(-1.0, 1.0, 41)];
    request.replicates = 100;
    request
}

/// Look up a preset by name.
pub fn preset(name: &str) -> Option<SimulationRequest> {
    match name {
        "normal_mean" => Some(normal_mean()),
        "sample_size_power" => Some(sample_size_power()),
        "panel_twfe" => Some(panel_twfe()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poco_sweep_core::contract::normalize_request;

    #[test]
    fn test_every_preset_normalizes() {
        for name in PRESET_NAMES {
            let request = preset(name).unwrap();
            assert_eq!(request.run_id, name);
            normalize_request(request).unwrap();
        }
        assert!(preset("unknown").is_none());
    }

    #[test]
    fn test_sample_size_power_grid() {
        let normalized = normalize_request(sample_size_power()).unwrap();
        assert_eq!(normalized.total_points, 44);
    }
}
