//! Tests for matching directly on Arrow record batches

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int32Array, Int64Array, Int8Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use dame_flame::data::raw_table_from_batch;
use dame_flame::{
    Matcher, MatchingConfig, MatchingError, MissingDataPolicy, RecordBatch, StopReason,
};

use crate::utils::fixed_weight_builder;

fn batch() -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("unit", DataType::Int64, false),
        Field::new("x", DataType::Int32, true),
        Field::new("y", DataType::Int32, true),
        Field::new("treated", DataType::Int8, false),
        Field::new("outcome", DataType::Float64, false),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
            Arc::new(Int32Array::from(vec![Some(0), Some(0), Some(0), Some(0)])),
            Arc::new(Int32Array::from(vec![Some(0), Some(0), None, Some(1)])),
            Arc::new(Int8Array::from(vec![1, 0, 1, 0])),
            Arc::new(Float64Array::from(vec![2.0, 1.0, 5.0, 0.0])),
        ],
    )
    .unwrap()
}

fn matcher(policy: MissingDataPolicy) -> Matcher {
    Matcher::new(
        fixed_weight_builder(vec![2.0, 1.0])
            .id_column("unit")
            .missing_data(policy)
            .build(),
    )
}

#[test]
fn test_never_match_cells_only_block_their_covariate() {
    let result = matcher(MissingDataPolicy::NeverMatch)
        .perform_matching_batch(&batch(), None)
        .unwrap();

    assert_eq!(result.covariate_names, vec!["x", "y"]);
    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.groups[0].treated, vec![1]);
    assert_eq!(result.groups[0].control, vec![2]);

    // Once "y" is dropped, unit 3 matches on "x"
    assert_eq!(result.groups[1].treated, vec![1, 3]);
    assert_eq!(result.groups[1].control, vec![2, 4]);
    assert_eq!(result.weight_of(1), Some(2));
    assert_eq!(result.weight_of(3), Some(1));
    assert_eq!(result.stop_reason, StopReason::AllUnitsMatched);
}

#[test]
fn test_drop_rows_removes_incomplete_units() {
    let result = matcher(MissingDataPolicy::DropRows)
        .perform_matching_batch(&batch(), None)
        .unwrap();

    assert_eq!(result.unit_ids, vec![1, 2, 4]);
    assert_eq!(result.weight_of(3), None);
}

#[test]
fn test_reject_fails_on_missing_cell() {
    let err = matcher(MissingDataPolicy::Reject)
        .perform_matching_batch(&batch(), None)
        .unwrap_err();
    assert!(matches!(err, MatchingError::MissingData { row: 2, .. }));
}

/// Batch with a single covariate `x` and the given treatment column
fn batch_with(x: ArrayRef, treated: ArrayRef) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("x", x.data_type().clone(), true),
        Field::new("treated", treated.data_type().clone(), false),
        Field::new("outcome", DataType::Float64, false),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![x, treated, Arc::new(Float64Array::from(vec![1.0, 0.0]))],
    )
    .unwrap()
}

#[test]
fn test_fractional_treatment_is_rejected() {
    let batch = batch_with(
        Arc::new(Int32Array::from(vec![0, 0])),
        Arc::new(Float64Array::from(vec![0.5, 1.9])),
    );
    let err = raw_table_from_batch(&batch, &MatchingConfig::default()).unwrap_err();
    assert!(matches!(err, MatchingError::InvalidTable(_)));
}

#[test]
fn test_fractional_covariate_is_rejected() {
    let batch = batch_with(
        Arc::new(Float64Array::from(vec![1.0, 1.7])),
        Arc::new(Int8Array::from(vec![1, 0])),
    );
    let config = MatchingConfig::builder()
        .missing_data(MissingDataPolicy::NeverMatch)
        .build();
    let err = Matcher::new(config)
        .perform_matching_batch(&batch, None)
        .unwrap_err();
    assert!(matches!(err, MatchingError::InvalidTable(_)));
}

#[test]
fn test_whole_number_floats_are_read_as_codes() {
    let batch = batch_with(
        Arc::new(Float64Array::from(vec![Some(3.0), None])),
        Arc::new(Float64Array::from(vec![1.0, 0.0])),
    );
    let raw = raw_table_from_batch(&batch, &MatchingConfig::default()).unwrap();
    assert_eq!(raw.columns, vec![vec![Some(3), None]]);
    assert_eq!(raw.treatment, vec![1, 0]);
}

#[test]
fn test_unparseable_string_covariate_is_an_error() {
    let batch = batch_with(
        Arc::new(StringArray::from(vec!["1", "abc"])),
        Arc::new(Int8Array::from(vec![1, 0])),
    );

    // A cell that cannot be cast must not turn into a missing cell
    let config = MatchingConfig::builder()
        .missing_data(MissingDataPolicy::DropRows)
        .build();
    let err = raw_table_from_batch(&batch, &config).unwrap_err();
    assert!(matches!(err, MatchingError::Arrow(_)));
}
