//! Tests for treatment-effect estimates over matched groups

use dame_flame::{EarlyStop, Matcher, ate, att, cate_of_group, cate_of_unit, groups_of, main_group};

use crate::utils::{fixed_weight_builder, four_units, no_early_stop, table};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

#[test]
fn test_effects_on_hand_computed_groups() {
    let table = table(vec![
        (vec![0], 1, 5.0),
        (vec![0], 0, 1.0),
        (vec![0], 0, 3.0),
        (vec![1], 1, 10.0),
        (vec![1], 0, 4.0),
        (vec![2], 1, 7.0),
    ]);
    let result = Matcher::new(fixed_weight_builder(vec![1.0]).build())
        .perform_matching(&table, None)
        .unwrap();
    assert_eq!(result.groups.len(), 2);

    // Group CATEs are 5 - 2 = 3 and 10 - 4 = 6
    assert!(close(cate_of_group(&table, &result.groups[0]).unwrap(), 3.0));
    assert!(close(cate_of_group(&table, &result.groups[1]).unwrap(), 6.0));
    assert!(close(cate_of_unit(&table, &result, 2).unwrap(), 3.0));
    assert_eq!(cate_of_unit(&table, &result, 5), None);

    // ATE weights by group size (3 and 2), ATT by treated count (1 and 1)
    assert!(close(ate(&table, &result).unwrap(), 4.2));
    assert!(close(att(&table, &result).unwrap(), 4.5));
}

#[test]
fn test_units_in_several_groups() {
    let table = four_units();
    let config = fixed_weight_builder(vec![0.75, 0.25])
        .early_stop(EarlyStop {
            iterations: Some(1),
            ..no_early_stop()
        })
        .build();
    let result = Matcher::new(config).perform_matching(&table, None).unwrap();

    let ids: Vec<_> = groups_of(&result, 0).iter().map(|g| g.id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(main_group(&result, 0).map(|g| g.id), Some(0));
    assert_eq!(main_group(&result, 2).map(|g| g.id), Some(1));
    assert!(main_group(&result, 3).is_none());
    assert!(groups_of(&result, 3).is_empty());
    assert!(main_group(&result, 42).is_none());

    assert!(close(cate_of_unit(&table, &result, 2).unwrap(), 1.0));
}

#[test]
fn test_no_groups_means_no_estimate() {
    let table = table(vec![(vec![0], 1, 1.0), (vec![1], 0, 0.0)]);
    let result = Matcher::new(fixed_weight_builder(vec![1.0]).build())
        .perform_matching(&table, None)
        .unwrap();

    assert!(result.groups.is_empty());
    assert_eq!(ate(&table, &result), None);
    assert_eq!(att(&table, &result), None);
}
