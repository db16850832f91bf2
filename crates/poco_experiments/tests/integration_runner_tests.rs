use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use poco_core::estimators::{SampleMeanEstimator, TwoWayFixedEffectsEstimator};
use poco_core::generators::{NormalMeanShifter, PanelDataGenerator};
use poco_core::{
    Capabilities, Estimate, EstimationError, EstimatorSet, FnEstimator, GenerationError,
    ParameterPoint,
};
use poco_experiments::{
    run_simulation, run_simulation_with_raw, CancellationToken, CurveView, Metric, ParameterSpace,
    ReplicateFailure, RunConfig, RunError,
};

fn sample_mean_set() -> EstimatorSet {
    EstimatorSet::new()
        .with(SampleMeanEstimator::new("y"))
        .expect("register sample mean")
}

#[test]
fn results_do_not_depend_on_worker_count_or_batching() {
    let grid = ParameterSpace::grid()
        .dimension("n", vec![20.0, 60.0])
        .linspace("effect_size", 0.0, 0.4, 3)
        .generate()
        .expect("grid");
    let generator = NormalMeanShifter::default();
    let estimators = sample_mean_set();
    let base = RunConfig::default().with_replicates(40).with_seed(24);

    let single = run_simulation(
        &grid,
        &estimators,
        &generator,
        &base.clone().with_threads(Some(1)),
    )
    .expect("single-threaded run");
    let parallel = run_simulation(
        &grid,
        &estimators,
        &generator,
        &base.clone().with_threads(Some(4)).with_batch_size(7),
    )
    .expect("parallel run");

    assert_eq!(single, parallel);

    let other_seed = run_simulation(
        &grid,
        &estimators,
        &generator,
        &base.with_seed(25).with_threads(Some(4)),
    )
    .expect("other seed");
    assert_ne!(single.metrics(), other_seed.metrics());
}

#[test]
fn power_increases_with_sample_size() {
    let grid = ParameterSpace::grid()
        .dimension("n", vec![20.0, 50.0, 100.0, 200.0])
        .dimension("effect_size", vec![0.3])
        .generate()
        .expect("grid");
    let results = run_simulation(
        &grid,
        &sample_mean_set(),
        &NormalMeanShifter::default(),
        &RunConfig::default().with_replicates(400).with_seed(7),
    )
    .expect("run");

    let curve = CurveView::new(&results)
        .curve(
            "sample_mean",
            Metric::Power,
            "n",
            &ParameterPoint::new().with("effect_size", 0.3),
        )
        .expect("power curve");
    let powers: Vec<f64> = curve
        .points
        .iter()
        .map(|p| p.y.expect("power defined"))
        .collect();

    assert_eq!(curve.points.len(), 4);
    assert!(
        powers.windows(2).all(|w| w[0] < w[1]),
        "power not increasing: {powers:?}"
    );
    assert!(powers[3] > 0.95, "power at n=200 was {}", powers[3]);
}

#[test]
fn power_is_non_decreasing_in_sample_size_across_effects() {
    let sample_sizes = [20.0, 40.0, 80.0, 160.0];
    let effects = [0.1, 0.2, 0.3, 0.5];
    let grid = ParameterSpace::grid()
        .dimension("n", sample_sizes.to_vec())
        .dimension("effect_size", effects.to_vec())
        .generate()
        .expect("grid");
    let results = run_simulation(
        &grid,
        &sample_mean_set(),
        &NormalMeanShifter::default(),
        &RunConfig::default().with_replicates(1000).with_seed(1234),
    )
    .expect("run");

    let view = CurveView::new(&results);
    let mut checked = 0;
    let mut non_decreasing = 0;
    for effect in effects {
        let curve = view
            .curve(
                "sample_mean",
                Metric::Power,
                "n",
                &ParameterPoint::new().with("effect_size", effect),
            )
            .expect("power curve");
        let powers: Vec<f64> = curve
            .points
            .iter()
            .map(|p| p.y.expect("power defined"))
            .collect();
        for pair in powers.windows(2) {
            checked += 1;
            if pair[1] >= pair[0] {
                non_decreasing += 1;
            }
        }
    }

    assert_eq!(checked, 12);
    assert!(
        non_decreasing as f64 >= 0.9 * checked as f64,
        "power rose with n at only {non_decreasing} of {checked} grid points"
    );
}

#[test]
fn coverage_is_calibrated_for_correct_intervals() {
    let grid = ParameterSpace::grid()
        .dimension("effect_size", vec![0.2])
        .generate()
        .expect("grid");
    let results = run_simulation(
        &grid,
        &sample_mean_set(),
        &NormalMeanShifter::new(100, 0.0, 1.0),
        &RunConfig::default().with_replicates(5000).with_seed(2024),
    )
    .expect("run");

    let metric = &results.metrics()[0];
    let coverage = metric.coverage.expect("coverage defined");
    assert!(
        (0.93..=0.97).contains(&coverage),
        "coverage {coverage} outside [0.93, 0.97]"
    );
    assert!(metric.bias.expect("bias").abs() < 0.01);
    assert!(metric.se_bias.expect("se bias").abs() < 0.01);
    assert!(metric.coverage_mcse.expect("mcse") < 0.005);
}

#[test]
fn failing_estimator_does_not_affect_others() {
    let grid = ParameterSpace::grid()
        .dimension("effect_size", vec![0.0, 0.5])
        .generate()
        .expect("grid");
    let generator = NormalMeanShifter::new(30, 0.0, 1.0);
    let config = RunConfig::default().with_replicates(60).with_seed(3);

    let flaky = FnEstimator::new("flaky", Capabilities::POINT_ONLY, |dataset, _| {
        let first = dataset.column("y")?[0];
        if first > 0.0 {
            return Err(EstimationError::NonConvergence("positive first draw".to_string()));
        }
        Ok(Estimate::point(first))
    });
    let with_flaky = sample_mean_set().with(flaky).expect("register flaky");

    let alone = run_simulation(&grid, &sample_mean_set(), &generator, &config).expect("alone");
    let (together, raw) =
        run_simulation_with_raw(&grid, &with_flaky, &generator, &config).expect("together");

    for combination in 0..grid.len() {
        assert_eq!(
            alone.get(combination, "sample_mean"),
            together.get(combination, "sample_mean")
        );
        let flaky_metric = together.get(combination, "flaky").expect("flaky row");
        assert!(flaky_metric.failures > 0);
        assert!(flaky_metric.successes > 0);
        assert_eq!(flaky_metric.successes + flaky_metric.failures, 60);
        assert_eq!(flaky_metric.power, None);
    }

    let failures: Vec<_> = raw
        .estimates_for(0, 1)
        .iter()
        .filter_map(|r| r.outcome.as_ref().err())
        .collect();
    assert!(failures
        .iter()
        .all(|f| matches!(f, ReplicateFailure::Estimation(EstimationError::NonConvergence(_)))));
}

#[test]
fn always_failing_estimator_has_undefined_metrics() {
    let grid = ParameterSpace::grid()
        .dimension("effect_size", vec![0.0, 0.5])
        .generate()
        .expect("grid");
    let broken = FnEstimator::new("broken", Capabilities::FULL, |_, _| {
        Err(EstimationError::NonConvergence("never converges".to_string()))
    });
    let estimators = sample_mean_set().with(broken).expect("register broken");

    let results = run_simulation(
        &grid,
        &estimators,
        &NormalMeanShifter::new(40, 0.0, 1.0),
        &RunConfig::default().with_replicates(30).with_seed(8),
    )
    .expect("run");

    for combination in 0..grid.len() {
        let broken = results.get(combination, "broken").expect("broken row");
        assert_eq!(broken.failure_rate, Some(1.0));
        assert_eq!(broken.successes, 0);
        assert_eq!(broken.power, None);
        assert_eq!(broken.coverage, None);
        assert_eq!(broken.bias, None);
        assert_eq!(broken.se_bias, None);

        let working = results.get(combination, "sample_mean").expect("working row");
        assert_eq!(working.failure_rate, Some(0.0));
        assert!(working.power.is_some());
        assert!(working.coverage.is_some());
    }
}

#[test]
fn rejected_combination_is_reported_not_fatal() {
    let grid = ParameterSpace::grid()
        .dimension("n", vec![0.0, 25.0])
        .dimension("effect_size", vec![0.1])
        .generate()
        .expect("grid");
    let results = run_simulation(
        &grid,
        &sample_mean_set(),
        &NormalMeanShifter::default(),
        &RunConfig::default().with_replicates(10),
    )
    .expect("run");

    assert_eq!(results.combination_errors().len(), 1);
    let rejected = &results.combination_errors()[0];
    assert_eq!(rejected.combination_index, 0);
    assert!(matches!(
        rejected.error,
        GenerationError::InvalidParameter { ref name, .. } if name == "n"
    ));

    let bad = results.get(0, "sample_mean").expect("row for rejected combination");
    assert_eq!(bad.failure_rate, Some(1.0));
    assert_eq!(bad.power, None);
    let good = results.get(1, "sample_mean").expect("row for valid combination");
    assert_eq!(good.failure_rate, Some(0.0));
}

#[test]
fn oversized_sample_size_only_rejects_its_combination() {
    let grid = ParameterSpace::grid()
        .dimension("n", vec![1e20, 30.0])
        .generate()
        .expect("grid");
    let results = run_simulation(
        &grid,
        &sample_mean_set(),
        &NormalMeanShifter::default(),
        &RunConfig::default().with_replicates(20).with_threads(Some(2)),
    )
    .expect("run");

    assert_eq!(results.combination_errors().len(), 1);
    assert_eq!(results.combination_errors()[0].combination_index, 0);
    assert!(matches!(
        results.combination_errors()[0].error,
        GenerationError::InvalidParameter { ref name, .. } if name == "n"
    ));
    assert_eq!(
        results.get(0, "sample_mean").and_then(|m| m.failure_rate),
        Some(1.0)
    );
    let valid = results.get(1, "sample_mean").expect("row for n = 30");
    assert_eq!(valid.successes, 20);
}

#[test]
fn zero_replicates_leave_metrics_undefined() {
    let grid = ParameterSpace::grid()
        .dimension("effect_size", vec![0.0, 1.0])
        .generate()
        .expect("grid");
    let (results, raw) = run_simulation_with_raw(
        &grid,
        &sample_mean_set(),
        &NormalMeanShifter::default(),
        &RunConfig::default().with_replicates(0),
    )
    .expect("run");

    assert!(raw.is_empty());
    assert_eq!(results.metrics().len(), 2);
    for metric in results.metrics() {
        assert_eq!(metric.replicates, 0);
        assert_eq!(metric.failure_rate, None);
        assert_eq!(metric.power, None);
        assert_eq!(metric.coverage, None);
        assert_eq!(metric.bias, None);
        assert_eq!(metric.se_bias, None);
    }
}

#[test]
fn cancellation_between_batches_discards_partial_results() {
    let grid = ParameterSpace::grid()
        .dimension("effect_size", vec![0.0, 0.5])
        .generate()
        .expect("grid");
    let token = CancellationToken::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let trigger = {
        let token = token.clone();
        let calls = Arc::clone(&calls);
        FnEstimator::new("trigger", Capabilities::POINT_ONLY, move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            token.cancel();
            Ok(Estimate::point(0.0))
        })
    };
    let estimators = EstimatorSet::new().with(trigger).expect("register");

    let error = run_simulation(
        &grid,
        &estimators,
        &NormalMeanShifter::default(),
        &RunConfig::default()
            .with_replicates(50)
            .with_batch_size(10)
            .with_cancellation(token),
    )
    .expect_err("run should be cancelled");

    match error {
        RunError::Cancelled {
            completed_batches,
            total_batches,
        } => {
            assert_eq!(completed_batches, 1);
            assert_eq!(total_batches, 10);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 10);
}

#[test]
fn twfe_keeps_nominal_coverage_on_independent_panels() {
    let grid = ParameterSpace::grid()
        .dimension("effect_size", vec![0.0, 0.5])
        .generate()
        .expect("grid");
    let generator = PanelDataGenerator {
        n_entities: 30,
        n_periods: 6,
        common_start_time: 3,
        treated_share: 0.5,
        serial_corr: 0.0,
    };
    let estimators = EstimatorSet::new()
        .with(TwoWayFixedEffectsEstimator::new())
        .expect("register twfe");

    let results = run_simulation(
        &grid,
        &estimators,
        &generator,
        &RunConfig::default().with_replicates(300).with_seed(11),
    )
    .expect("run");

    let curve = CurveView::new(&results)
        .curve("twfe", Metric::Coverage, "effect_size", &ParameterPoint::new())
        .expect("coverage curve");
    for point in &curve.points {
        let coverage = point.y.expect("coverage defined");
        assert!((0.90..=0.99).contains(&coverage), "coverage {coverage}");
    }

    let null_power = results.get(0, "twfe").and_then(|m| m.power).expect("power");
    assert!(null_power < 0.10, "size was {null_power}");
}
