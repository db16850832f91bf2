use poco_core::estimators::{SampleMeanEstimator, TwoWayFixedEffectsEstimator};
use poco_core::generators::{
    BootstrapConstantShifter, EffectMode, NormalMeanShifter, PanelBlockTreatment, PanelColumns,
    PanelDataGenerator,
};
use poco_core::seed::replicate_rng;
use poco_core::{DataGenerator, Dataset, Estimator, ParameterPoint};

#[test]
fn sample_mean_tracks_normal_shift_across_replicates() {
    let generator = NormalMeanShifter::new(200, 0.0, 1.0);
    let estimator = SampleMeanEstimator::new("y");
    let point = ParameterPoint::new().with("effect_size", 0.5);

    let estimates: Vec<f64> = (0..200)
        .map(|replicate| {
            let draw = generator
                .generate(&point, &mut replicate_rng(11, 0, replicate))
                .expect("draw");
            estimator.estimate(&draw.dataset, 0.95).expect("estimate").point
        })
        .collect();

    let average = estimates.iter().sum::<f64>() / estimates.len() as f64;
    assert!((average - 0.5).abs() < 0.02, "average estimate {average}");
}

#[test]
fn bootstrap_shift_moves_mean_by_effect() {
    let base = Dataset::new()
        .with_column("y", (0..50).map(|v| v as f64 / 10.0).collect())
        .expect("base");
    let generator = BootstrapConstantShifter::new(base, "y").expect("generator");
    let estimator = SampleMeanEstimator::new("y");

    let null_point = ParameterPoint::new().with("effect_size", 0.0);
    let shifted_point = ParameterPoint::new().with("effect_size", 2.0);

    let null_draw = generator
        .generate(&null_point, &mut replicate_rng(3, 0, 0))
        .expect("null draw");
    let shifted_draw = generator
        .generate(&shifted_point, &mut replicate_rng(3, 0, 0))
        .expect("shifted draw");

    let null_mean = estimator.estimate(&null_draw.dataset, 0.95).unwrap().point;
    let shifted_mean = estimator.estimate(&shifted_draw.dataset, 0.95).unwrap().point;
    // Same sub-seed resamples the same rows, so only the shift differs.
    assert!((shifted_mean - null_mean - 2.0).abs() < 1e-9);
}

#[test]
fn twfe_is_unbiased_on_parametric_panel() {
    let generator = PanelDataGenerator {
        n_entities: 40,
        n_periods: 6,
        common_start_time: 3,
        treated_share: 0.5,
        serial_corr: 0.0,
    };
    let estimator = TwoWayFixedEffectsEstimator::new();
    let point = ParameterPoint::new().with("effect_size", 1.0);

    let mut covered = 0;
    let mut total = 0.0;
    let replicates = 200;
    for replicate in 0..replicates {
        let draw = generator
            .generate(&point, &mut replicate_rng(21, 0, replicate))
            .expect("draw");
        let estimate = estimator.estimate(&draw.dataset, 0.95).expect("estimate");
        total += estimate.point;
        if estimate.interval.expect("interval").contains(1.0) {
            covered += 1;
        }
    }

    let average = total / replicates as f64;
    assert!((average - 1.0).abs() < 0.08, "average estimate {average}");
    assert!(covered >= 178, "covered {covered} of {replicates}");
}

#[test]
fn panel_block_treatment_feeds_twfe() {
    let mut entity = Vec::new();
    let mut time = Vec::new();
    let mut y = Vec::new();
    for e in 0..20 {
        for t in 0..5 {
            entity.push(e as f64);
            time.push(t as f64);
            y.push(5.0 + e as f64 * 0.1 + t as f64 * 0.3 + ((e * 7 + t * 3) % 5) as f64 * 0.01);
        }
    }
    let base = Dataset::from_columns([("entity", entity), ("time", time), ("y", y)]).unwrap();
    let generator =
        PanelBlockTreatment::new(base, PanelColumns::default(), 2.0, 0.5, EffectMode::Additive)
            .expect("generator");
    assert_eq!(generator.entity_count(), 20);

    let draw = generator
        .generate(
            &ParameterPoint::new().with("effect_size", 0.75),
            &mut replicate_rng(8, 1, 2),
        )
        .expect("draw");
    let estimate = TwoWayFixedEffectsEstimator::new()
        .estimate(&draw.dataset, 0.9)
        .expect("estimate");
    assert!((estimate.point - 0.75).abs() < 0.05, "estimate {}", estimate.point);
}
