//! End-to-end tests for FLAME runs and the handover to DAME

use dame_flame::algorithm::matching::Phase;
use dame_flame::{
    Algorithm, CovariateSet, EarlyStop, Estimator, Matcher, MatchingConfig, StopReason,
};

use crate::utils::{fixed_weight_builder, no_early_stop, staggered_units, synthetic};

#[test]
fn test_flame_accumulates_drops() {
    let config = fixed_weight_builder(vec![3.0, 2.0, 1.0])
        .algorithm(Algorithm::Flame)
        .build();
    let result = Matcher::new(config)
        .perform_matching(&staggered_units(), None)
        .unwrap();

    let dropped: Vec<_> = result.trace.iter().map(|r| r.dropped.clone()).collect();
    assert_eq!(
        dropped,
        vec![
            CovariateSet::empty(),
            CovariateSet::new([2]),
            CovariateSet::new([1, 2]),
        ]
    );
    assert!(result.trace.iter().all(|r| r.phase == Phase::Flame));

    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.groups[1].treated, vec![2]);
    assert_eq!(result.groups[1].control, vec![3]);
    assert_eq!(result.groups[1].values, vec![Some(1), Some(1), None]);
    assert_eq!(result.unmatched_units(), vec![4, 5]);
    assert_eq!(result.stop_reason, StopReason::CovariatesExhausted);
}

#[test]
fn test_flame_hands_over_to_dame() {
    let config = fixed_weight_builder(vec![3.0, 2.0, 1.0])
        .algorithm(Algorithm::Flame)
        .pre_dame(1)
        .build();
    let result = Matcher::new(config)
        .perform_matching(&staggered_units(), None)
        .unwrap();

    let phases: Vec<_> = result.trace.iter().map(|r| r.phase).collect();
    assert_eq!(
        phases,
        vec![Phase::Flame, Phase::Flame, Phase::Dame, Phase::Dame]
    );

    // DAME keeps what FLAME dropped and explores the rest
    assert_eq!(result.trace[1].dropped, CovariateSet::new([2]));
    assert_eq!(result.trace[2].dropped, CovariateSet::new([1, 2]));
    assert_eq!(result.trace[3].dropped, CovariateSet::new([0, 2]));
    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.stop_reason, StopReason::CovariatesExhausted);
}

#[test]
fn test_zero_pre_dame_rounds_runs_dame() {
    let config = fixed_weight_builder(vec![3.0, 2.0, 1.0])
        .algorithm(Algorithm::Flame)
        .pre_dame(0)
        .build();
    let result = Matcher::new(config)
        .perform_matching(&staggered_units(), None)
        .unwrap();

    assert!(result.trace.iter().all(|r| r.phase == Phase::Dame));
}

#[test]
fn test_flame_model_mode_reports_balancing_factor() {
    let table = synthetic(100, 100, 31);
    let holdout = synthetic(500, 500, 32);
    let config = MatchingConfig::builder()
        .algorithm(Algorithm::Flame)
        .model(Estimator::Ridge { alpha: 0.1 }, None)
        .tradeoff(0.1)
        .early_stop(EarlyStop {
            iterations: Some(2),
            ..no_early_stop()
        })
        .parallel(false)
        .build();
    let result = Matcher::new(config)
        .perform_matching(&table, Some(&holdout))
        .unwrap();

    assert_eq!(result.trace.len(), 3);
    assert!(result.trace[0].balancing_factor.is_none());
    for record in &result.trace[1..] {
        let bf = record.balancing_factor.unwrap();
        assert!((0.0..=2.0).contains(&bf));
        assert!(record.predictive_error.is_some());
    }

    assert_eq!(result.trace[1].dropped, CovariateSet::singleton(3));
    assert_eq!(result.trace[2].dropped.len(), 2);
    assert!(result.trace[1].dropped.is_subset(&result.trace[2].dropped));
}
