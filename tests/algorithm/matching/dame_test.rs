//! End-to-end tests for DAME runs

use std::collections::HashSet;

use dame_flame::{
    CovariateSet, DropSelection, EarlyStop, Estimator, Matcher, MatchingConfig, StopReason,
    UnitTable,
};

use crate::utils::{fixed_weight_builder, four_units, no_early_stop, synthetic, table};

#[test]
fn test_four_units_with_one_drop() {
    let config = fixed_weight_builder(vec![0.75, 0.25])
        .early_stop(EarlyStop {
            iterations: Some(1),
            ..no_early_stop()
        })
        .build();
    let result = Matcher::new(config)
        .perform_matching(&four_units(), None)
        .unwrap();

    assert_eq!(
        result.matched_on_names(),
        vec![vec!["1".to_string(), "2".to_string()], vec!["1".to_string()]]
    );
    assert_eq!(result.groups.len(), 2);

    let first = &result.groups[0];
    assert_eq!(first.round, 0);
    assert_eq!(first.treated, vec![0]);
    assert_eq!(first.control, vec![1]);
    assert_eq!(first.values, vec![Some(0), Some(0)]);

    let second = &result.groups[1];
    assert_eq!(second.round, 1);
    assert_eq!(second.treated, vec![0]);
    assert_eq!(second.control, vec![1, 2]);
    assert_eq!(second.values, vec![Some(0), None]);
    assert_eq!(second.values_display(), "(0, *)");

    assert_eq!(result.weights, vec![2, 2, 1, 0]);
    assert_eq!(result.unmatched_units(), vec![3]);
    assert_eq!(result.stop_reason, StopReason::IterationLimit);
}

#[test]
fn test_four_units_until_covariates_run_out() {
    let config = fixed_weight_builder(vec![0.75, 0.25]).build();
    let result = Matcher::new(config)
        .perform_matching(&four_units(), None)
        .unwrap();

    // The last drop matches on "2" alone; every class there is either
    // already matched or single-armed.
    assert_eq!(result.trace.len(), 3);
    assert_eq!(result.trace[2].dropped, CovariateSet::singleton(0));
    assert_eq!(result.trace[2].groups_formed, 0);
    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.weights, vec![2, 2, 1, 0]);
    assert_eq!(result.stop_reason, StopReason::CovariatesExhausted);
}

#[test]
fn test_without_repeats_stops_once_treated_are_matched() {
    let config = fixed_weight_builder(vec![0.75, 0.25]).repeats(false).build();
    let result = Matcher::new(config)
        .perform_matching(&four_units(), None)
        .unwrap();

    assert_eq!(result.trace.len(), 1);
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.weights, vec![1, 1, 0, 0]);
    assert_eq!(result.stop_reason, StopReason::UnmatchedTreatedExhausted);
}

#[test]
fn test_zero_weight_covariates_are_dropped_first() {
    let table = synthetic(200, 200, 11);
    let config = fixed_weight_builder(vec![1.0, 1.0, 0.0, 1.0])
        .early_stop(EarlyStop {
            iterations: Some(1),
            ..no_early_stop()
        })
        .build();
    let result = Matcher::new(config).perform_matching(&table, None).unwrap();

    assert_eq!(result.trace[1].dropped, CovariateSet::singleton(2));
}

#[test]
fn test_model_mode_drops_least_important_covariate_first() {
    let table = synthetic(1000, 1000, 3);
    let holdout = synthetic(500, 500, 4);
    let config = MatchingConfig::builder()
        .model(Estimator::Ridge { alpha: 0.1 }, None)
        .early_stop(EarlyStop {
            iterations: Some(1),
            ..no_early_stop()
        })
        .parallel(false)
        .build();
    let result = Matcher::new(config)
        .perform_matching(&table, Some(&holdout))
        .unwrap();

    assert_eq!(result.trace.len(), 2);
    assert_eq!(result.trace[1].dropped, CovariateSet::singleton(3));
    let baseline = result.baseline_error.unwrap();
    assert_eq!(result.trace[0].predictive_error, Some(baseline));
    assert!(result.trace[1].predictive_error.unwrap() > baseline);
    assert!(result.trace[1].balancing_factor.is_none());
}

#[test]
fn test_predictive_error_limit_halts_before_costly_drop() {
    let table = synthetic(1000, 1000, 5);
    let holdout = synthetic(500, 500, 6);
    let config = MatchingConfig::builder()
        .model(Estimator::Ridge { alpha: 0.1 }, None)
        .parallel(false)
        .build();
    let result = Matcher::new(config)
        .perform_matching(&table, Some(&holdout))
        .unwrap();

    // Every covariate moves the outcome, so the first drop already costs
    // more than the default 5% tolerance.
    assert_eq!(result.stop_reason, StopReason::PredictiveErrorLimit);
    assert_eq!(result.trace.len(), 1);
}

#[test]
fn test_tree_estimator_with_cross_validation() {
    let table = synthetic(300, 300, 8);
    let holdout = synthetic(150, 150, 9);
    let config = MatchingConfig::builder()
        .model(Estimator::DecisionTree { max_depth: 4 }, Some(3))
        .early_stop(EarlyStop {
            iterations: Some(2),
            ..no_early_stop()
        })
        .parallel(false)
        .build();
    let result = Matcher::new(config)
        .perform_matching(&table, Some(&holdout))
        .unwrap();

    assert!(matches!(
        result.stop_reason,
        StopReason::IterationLimit | StopReason::AllUnitsMatched
    ));
    for record in &result.trace {
        assert!(record.predictive_error.is_some_and(f64::is_finite));
    }
}

#[test]
fn test_groups_follow_matching_invariants() {
    let table = synthetic(400, 400, 21);
    let config = fixed_weight_builder(vec![4.0, 3.0, 2.0, 1.0]).build();
    let result = Matcher::new(config).perform_matching(&table, None).unwrap();
    check_invariants(&table, &result);

    let dropped: HashSet<_> = result.trace.iter().map(|r| r.dropped.clone()).collect();
    assert_eq!(dropped.len(), result.trace.len());
}

#[test]
fn test_parallel_run_matches_sequential_run() {
    let table = synthetic(300, 300, 13);
    let holdout = synthetic(200, 200, 14);
    let run = |parallel: bool| {
        let config = MatchingConfig::builder()
            .model(Estimator::Ridge { alpha: 1.0 }, None)
            .early_stop(EarlyStop {
                iterations: Some(4),
                ..no_early_stop()
            })
            .parallel(parallel)
            .num_threads(4)
            .build();
        Matcher::new(config)
            .perform_matching(&table, Some(&holdout))
            .unwrap()
    };

    let sequential = run(false);
    let parallel = run(true);
    assert_eq!(sequential.trace, parallel.trace);
    assert_eq!(sequential.groups, parallel.groups);
    assert_eq!(sequential.weights, parallel.weights);
}

#[test]
fn test_treated_exhaustion_wins_over_iteration_limit() {
    // The lone treated unit only matches once covariate 1 is dropped
    let units = table(vec![
        (vec![0, 0], 1, 1.0),
        (vec![0, 1], 0, 0.0),
        (vec![1, 1], 0, 0.0),
        (vec![1, 0], 0, 0.0),
    ]);
    let run = |stop_unmatched_treated| {
        let config = fixed_weight_builder(vec![0.75, 0.25])
            .early_stop(EarlyStop {
                iterations: Some(1),
                stop_unmatched_treated,
                ..no_early_stop()
            })
            .build();
        Matcher::new(config).perform_matching(&units, None).unwrap()
    };

    let result = run(true);
    assert_eq!(result.trace.len(), 2);
    assert_eq!(result.trace[0].groups_formed, 0);
    assert_eq!(result.trace[1].dropped, CovariateSet::singleton(1));
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].treated, vec![0]);
    assert_eq!(result.groups[0].control, vec![1]);
    assert_eq!(result.stop_reason, StopReason::UnmatchedTreatedExhausted);

    let result = run(false);
    assert_eq!(result.trace.len(), 2);
    assert_eq!(result.stop_reason, StopReason::IterationLimit);
}

#[test]
fn test_fixed_weights_are_kept_in_config() {
    let config = fixed_weight_builder(vec![1.0, 2.0]).build();
    assert_eq!(
        config.drop_selection,
        DropSelection::FixedWeights(vec![1.0, 2.0])
    );
}

fn check_invariants(table: &UnitTable, result: &dame_flame::MatchingResult) {
    for group in &result.groups {
        assert!(!group.treated.is_empty(), "group {} has no treated", group.id);
        assert!(!group.control.is_empty(), "group {} has no control", group.id);

        for (c, value) in group.values.iter().enumerate() {
            assert_eq!(value.is_some(), group.covariates.contains(&c));
        }
        for unit in group.members() {
            let row = table.row_of(unit).unwrap();
            for &c in group.covariates.iter() {
                assert_eq!(Some(table.value(row, c)), group.values[c]);
            }
        }

        // Only classes with a newly matched member are reported
        assert!(
            group
                .members()
                .any(|unit| result.main_group_of(unit).map(|g| g.id) == Some(group.id))
        );
    }

    for (row, &unit) in result.unit_ids.iter().enumerate() {
        let containing: Vec<_> = result.groups.iter().filter(|g| g.contains(unit)).collect();
        assert_eq!(result.weights[row] as usize, containing.len());
        assert_eq!(
            result.main_groups[row],
            containing.first().map(|g| g.id)
        );
    }
}
