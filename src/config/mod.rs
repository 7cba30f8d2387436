//! Configuration for the matching engine.
//!
//! A [`MatchingConfig`] is an immutable value handed to the matcher and,
//! through it, to the stopping evaluator. It can be built in code with
//! [`MatchingConfigBuilder`] or loaded from a JSON file.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::algorithm::regression::Estimator;
use crate::data::MissingDataPolicy;
use crate::error::{MatchingError, Result};

/// Matching algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Dynamic almost-matching exactly: drops any set on the lattice frontier
    #[default]
    Dame,
    /// Fast large-scale almost-matching exactly: greedy backward elimination
    Flame,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dame => f.write_str("DAME"),
            Self::Flame => f.write_str("FLAME"),
        }
    }
}

/// Outcome model used to compute predictive error
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Regression estimator fitted per arm on the holdout
    pub estimator: Estimator,
    /// Number of contiguous folds for cross-validated error; in-sample if `None`
    pub cv_folds: Option<usize>,
}

/// How the next covariate set to drop is chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropSelection {
    /// One non-negative weight per covariate; the drop keeping the most
    /// weight wins
    FixedWeights(Vec<f64>),
    /// Predictive error of outcome models fitted on the holdout
    Model(ModelConfig),
}

impl Default for DropSelection {
    fn default() -> Self {
        Self::Model(ModelConfig::default())
    }
}

impl DropSelection {
    /// Whether a holdout table is needed
    #[must_use]
    pub const fn uses_model(&self) -> bool {
        matches!(self, Self::Model(_))
    }
}

/// Early-stopping thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarlyStop {
    /// Maximum number of drop rounds after the initial round
    pub iterations: Option<usize>,
    /// Stop once every treated unit is matched
    pub stop_unmatched_treated: bool,
    /// Stop once every control unit is matched
    pub stop_unmatched_control: bool,
    /// Stop when the share of unmatched treated units falls below this value
    pub unmatched_treated_fraction: Option<f64>,
    /// Stop when the share of unmatched control units falls below this value
    pub unmatched_control_fraction: Option<f64>,
    /// Stop when a drop would raise PE above `(1 + pe_fraction)` times the
    /// baseline PE
    pub pe_fraction: Option<f64>,
}

impl Default for EarlyStop {
    fn default() -> Self {
        Self {
            iterations: None,
            stop_unmatched_treated: false,
            stop_unmatched_control: false,
            unmatched_treated_fraction: None,
            unmatched_control_fraction: None,
            pe_fraction: Some(0.05),
        }
    }
}

/// Configuration for a matching run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Algorithm variant
    pub algorithm: Algorithm,
    /// Name of the treatment column in Arrow input
    pub treatment_column: String,
    /// Name of the outcome column in Arrow input
    pub outcome_column: String,
    /// Optional unit-id column in Arrow input
    pub id_column: Option<String>,
    /// Drop-selection strategy
    pub drop_selection: DropSelection,
    /// Whether matched units may join later groups
    pub repeats: bool,
    /// Early-stopping thresholds
    pub early_stop: EarlyStop,
    /// Weight of the balancing factor in FLAME's match quality
    pub tradeoff: f64,
    /// Switch FLAME to DAME after this many rounds
    pub pre_dame: Option<usize>,
    /// Missing-data policy for the matching table
    pub missing_data: MissingDataPolicy,
    /// Missing-data policy for the holdout table
    pub missing_holdout: MissingDataPolicy,
    /// Share of the input split off as holdout when none is supplied
    pub holdout_fraction: f64,
    /// Seed for the holdout split
    pub seed: u64,
    /// Score candidate drops in parallel
    pub parallel: bool,
    /// Worker threads for candidate scoring; defaults to the CPU count
    pub num_threads: Option<usize>,
    /// Show a progress spinner
    pub show_progress: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Dame,
            treatment_column: "treated".to_string(),
            outcome_column: "outcome".to_string(),
            id_column: None,
            drop_selection: DropSelection::default(),
            repeats: true,
            early_stop: EarlyStop::default(),
            tradeoff: 0.1,
            pre_dame: None,
            missing_data: MissingDataPolicy::Reject,
            missing_holdout: MissingDataPolicy::Reject,
            holdout_fraction: 0.1,
            seed: 0,
            parallel: true,
            num_threads: None,
            show_progress: false,
        }
    }
}

fn check_fraction(name: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(MatchingError::config(format!(
            "{name} must be in [0, 1], got {v}"
        ))),
        _ => Ok(()),
    }
}

impl MatchingConfig {
    /// Create a builder for the configuration
    #[must_use]
    pub fn builder() -> MatchingConfigBuilder {
        MatchingConfigBuilder::new()
    }

    /// Load a configuration from a JSON file
    ///
    /// Missing fields take their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Worker threads to use for candidate scoring
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }

    /// Check the configuration against a table with `num_covariates` covariates
    pub fn validate(&self, num_covariates: usize) -> Result<()> {
        if num_covariates == 0 {
            return Err(MatchingError::config("At least one covariate is required"));
        }

        match &self.drop_selection {
            DropSelection::FixedWeights(weights) => {
                if weights.len() != num_covariates {
                    return Err(MatchingError::config(format!(
                        "Expected {num_covariates} covariate weights, got {}",
                        weights.len()
                    )));
                }
                if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
                    return Err(MatchingError::config(format!(
                        "Covariate weights must be finite and non-negative, got {w}"
                    )));
                }
            }
            DropSelection::Model(model) => {
                match model.estimator {
                    Estimator::Ridge { alpha } if !(alpha.is_finite() && alpha >= 0.0) => {
                        return Err(MatchingError::config(format!(
                            "Ridge alpha must be finite and non-negative, got {alpha}"
                        )));
                    }
                    Estimator::DecisionTree { max_depth: 0 } => {
                        return Err(MatchingError::config("Tree max_depth must be at least 1"));
                    }
                    _ => {}
                }
                if model.cv_folds.is_some_and(|k| k < 2) {
                    return Err(MatchingError::config("cv_folds must be at least 2"));
                }
            }
        }

        if !(self.tradeoff.is_finite() && self.tradeoff >= 0.0) {
            return Err(MatchingError::config(format!(
                "Tradeoff must be finite and non-negative, got {}",
                self.tradeoff
            )));
        }
        check_fraction(
            "unmatched_treated_fraction",
            self.early_stop.unmatched_treated_fraction,
        )?;
        check_fraction(
            "unmatched_control_fraction",
            self.early_stop.unmatched_control_fraction,
        )?;
        if let Some(pe) = self.early_stop.pe_fraction {
            if !(pe.is_finite() && pe >= 0.0) {
                return Err(MatchingError::config(format!(
                    "pe_fraction must be finite and non-negative, got {pe}"
                )));
            }
        }
        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            return Err(MatchingError::config(format!(
                "Holdout fraction must be in (0, 1), got {}",
                self.holdout_fraction
            )));
        }
        if self.missing_holdout == MissingDataPolicy::NeverMatch {
            return Err(MatchingError::config(
                "The never-match policy cannot be used for the holdout table",
            ));
        }
        if self.num_threads == Some(0) {
            return Err(MatchingError::config("num_threads must be at least 1"));
        }
        Ok(())
    }
}

impl fmt::Display for MatchingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selection = match &self.drop_selection {
            DropSelection::FixedWeights(w) => format!("fixed weights {w:?}"),
            DropSelection::Model(m) => match m.cv_folds {
                Some(k) => format!("{:?} with {k}-fold CV", m.estimator),
                None => format!("{:?}", m.estimator),
            },
        };
        write!(
            f,
            "Matching Configuration:\n\
             - Algorithm: {}\n\
             - Drop selection: {}\n\
             - Repeats: {}\n\
             - Tradeoff: {}\n\
             - Pre-DAME rounds: {:?}\n\
             - Early stop: {:?}\n\
             - Parallel: {} ({} threads)",
            self.algorithm,
            selection,
            self.repeats,
            self.tradeoff,
            self.pre_dame,
            self.early_stop,
            self.parallel,
            self.thread_count()
        )
    }
}

/// Builder for constructing matching configuration
#[derive(Debug, Clone)]
pub struct MatchingConfigBuilder {
    config: MatchingConfig,
}

impl Default for MatchingConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingConfigBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: MatchingConfig::default(),
        }
    }

    /// Set the algorithm
    #[must_use]
    pub const fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    /// Set the Arrow column holding the treatment
    #[must_use]
    pub fn treatment_column(mut self, name: impl Into<String>) -> Self {
        self.config.treatment_column = name.into();
        self
    }

    /// Set the Arrow column holding the outcome
    #[must_use]
    pub fn outcome_column(mut self, name: impl Into<String>) -> Self {
        self.config.outcome_column = name.into();
        self
    }

    /// Set the Arrow column holding unit ids
    #[must_use]
    pub fn id_column(mut self, name: impl Into<String>) -> Self {
        self.config.id_column = Some(name.into());
        self
    }

    /// Use fixed covariate weights
    #[must_use]
    pub fn fixed_weights(mut self, weights: Vec<f64>) -> Self {
        self.config.drop_selection = DropSelection::FixedWeights(weights);
        self
    }

    /// Use outcome models
    #[must_use]
    pub fn model(mut self, estimator: Estimator, cv_folds: Option<usize>) -> Self {
        self.config.drop_selection = DropSelection::Model(ModelConfig {
            estimator,
            cv_folds,
        });
        self
    }

    /// Set whether matched units may be matched again
    #[must_use]
    pub const fn repeats(mut self, repeats: bool) -> Self {
        self.config.repeats = repeats;
        self
    }

    /// Set the early-stopping thresholds
    #[must_use]
    pub const fn early_stop(mut self, early_stop: EarlyStop) -> Self {
        self.config.early_stop = early_stop;
        self
    }

    /// Set FLAME's tradeoff between balancing factor and predictive error
    #[must_use]
    pub const fn tradeoff(mut self, tradeoff: f64) -> Self {
        self.config.tradeoff = tradeoff;
        self
    }

    /// Switch FLAME to DAME after `rounds` rounds
    #[must_use]
    pub const fn pre_dame(mut self, rounds: usize) -> Self {
        self.config.pre_dame = Some(rounds);
        self
    }

    /// Set the missing-data policy of the matching table
    #[must_use]
    pub const fn missing_data(mut self, policy: MissingDataPolicy) -> Self {
        self.config.missing_data = policy;
        self
    }

    /// Set the missing-data policy of the holdout table
    #[must_use]
    pub const fn missing_holdout(mut self, policy: MissingDataPolicy) -> Self {
        self.config.missing_holdout = policy;
        self
    }

    /// Set the holdout fraction used when no holdout table is given
    #[must_use]
    pub const fn holdout_fraction(mut self, fraction: f64) -> Self {
        self.config.holdout_fraction = fraction;
        self
    }

    /// Set the random seed
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Set whether to score candidates in parallel
    #[must_use]
    pub const fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Set the number of worker threads
    #[must_use]
    pub const fn num_threads(mut self, threads: usize) -> Self {
        self.config.num_threads = Some(threads);
        self
    }

    /// Set whether to show a progress spinner
    #[must_use]
    pub const fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> MatchingConfig {
        self.config
    }
}
