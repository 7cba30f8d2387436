//! Shared fixtures for the integration tests

use dame_flame::data::{UniformDataSpec, generate_uniform_given_importance};
use dame_flame::{EarlyStop, MatchingConfig, MatchingConfigBuilder, UnitTable};

/// Column names "1", "2", ... for `n` covariates
#[must_use]
pub fn numbered_names(n: usize) -> Vec<String> {
    (1..=n).map(|i| i.to_string()).collect()
}

/// Build a table from `(covariates, treatment, outcome)` rows; ids follow row order
#[must_use]
pub fn table(rows: Vec<(Vec<u32>, u8, f64)>) -> UnitTable {
    let width = rows.first().map_or(0, |(values, _, _)| values.len());
    UnitTable::from_rows(numbered_names(width), rows).unwrap()
}

/// Four units on two covariates:
///
/// | unit | "1" | "2" | treated |
/// |------|-----|-----|---------|
/// | 0    | 0   | 0   | yes     |
/// | 1    | 0   | 0   | no      |
/// | 2    | 0   | 1   | no      |
/// | 3    | 1   | 1   | no      |
#[must_use]
pub fn four_units() -> UnitTable {
    table(vec![
        (vec![0, 0], 1, 1.0),
        (vec![0, 0], 0, 0.0),
        (vec![0, 1], 0, 0.0),
        (vec![1, 1], 0, 0.0),
    ])
}

/// Three covariates where the first two rounds match different pairs and
/// one unmatchable unit per arm keeps the loop running
#[must_use]
pub fn staggered_units() -> UnitTable {
    table(vec![
        (vec![0, 0, 0], 1, 3.0),
        (vec![0, 0, 0], 0, 1.0),
        (vec![1, 1, 1], 1, 4.0),
        (vec![1, 1, 2], 0, 2.0),
        (vec![9, 9, 9], 1, 0.0),
        (vec![8, 8, 8], 0, 0.0),
    ])
}

/// Seeded synthetic table with covariate importance 4, 3, 2, 1
#[must_use]
pub fn synthetic(num_control: usize, num_treated: usize, seed: u64) -> UnitTable {
    generate_uniform_given_importance(&UniformDataSpec {
        num_control,
        num_treated,
        seed,
        ..UniformDataSpec::default()
    })
    .unwrap()
}

/// Sequential fixed-weight configuration with no early stopping
#[must_use]
pub fn fixed_weight_builder(weights: Vec<f64>) -> MatchingConfigBuilder {
    MatchingConfig::builder()
        .fixed_weights(weights)
        .early_stop(no_early_stop())
        .parallel(false)
}

/// Thresholds that never fire
#[must_use]
pub fn no_early_stop() -> EarlyStop {
    EarlyStop {
        pe_fraction: None,
        ..EarlyStop::default()
    }
}
