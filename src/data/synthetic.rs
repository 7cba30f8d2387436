//! Synthetic data for demos and tests
//!
//! Covariates are drawn uniformly from `min_value..=max_value`; the outcome is
//! a weighted sum of the covariates (weights = importance), plus a constant
//! treatment effect for treated units and uniform noise in [-0.5, 0.5).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::table::UnitTable;
use crate::error::{MatchingError, Result};

/// Parameters of the uniform data generator
#[derive(Debug, Clone)]
pub struct UniformDataSpec {
    /// Number of control units
    pub num_control: usize,
    /// Number of treated units
    pub num_treated: usize,
    /// Importance of each covariate in the outcome; its length sets the
    /// number of covariates
    pub importance: Vec<f64>,
    /// Smallest covariate code
    pub min_value: u32,
    /// Largest covariate code
    pub max_value: u32,
    /// Constant effect added to treated outcomes
    pub treatment_effect: f64,
    /// RNG seed
    pub seed: u64,
}

impl Default for UniformDataSpec {
    fn default() -> Self {
        Self {
            num_control: 1000,
            num_treated: 1000,
            importance: vec![4.0, 3.0, 2.0, 1.0],
            min_value: 0,
            max_value: 3,
            treatment_effect: 2.0,
            seed: 0,
        }
    }
}

/// Generate a table according to `spec`
///
/// Control units come first, then treated units; ids follow row order.
pub fn generate_uniform_given_importance(spec: &UniformDataSpec) -> Result<UnitTable> {
    if spec.min_value > spec.max_value {
        return Err(MatchingError::config(format!(
            "min_value {} exceeds max_value {}",
            spec.min_value, spec.max_value
        )));
    }
    if spec.importance.is_empty() {
        return Err(MatchingError::config("At least one covariate is required"));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let names = (0..spec.importance.len())
        .map(|i| format!("X{i}"))
        .collect();

    let total = spec.num_control + spec.num_treated;
    let mut rows = Vec::with_capacity(total);
    for i in 0..total {
        let treated = u8::from(i >= spec.num_control);
        let values: Vec<u32> = spec
            .importance
            .iter()
            .map(|_| rng.random_range(spec.min_value..=spec.max_value))
            .collect();
        let signal: f64 = values
            .iter()
            .zip(&spec.importance)
            .map(|(&v, &w)| f64::from(v) * w)
            .sum();
        let noise = rng.random::<f64>() - 0.5;
        let outcome = signal + f64::from(treated) * spec.treatment_effect + noise;
        rows.push((values, treated, outcome));
    }

    UnitTable::from_rows(names, rows)
}
