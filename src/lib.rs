//! A Rust library for almost-exact covariate-set matching (DAME and FLAME)
//! for causal inference on discrete covariates.

pub mod algorithm;
pub mod config;
pub mod data;
pub mod error;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::{
    Algorithm, DropSelection, EarlyStop, MatchingConfig, MatchingConfigBuilder, ModelConfig,
};
pub use error::{MatchingError, Result};

// Matching engine
pub use algorithm::matching::{
    CovariateSet, MatchGroup, Matcher, MatchingResult, MatchingSession, RoundRecord, Step,
    StopReason,
};
pub use algorithm::matching::{ate, att, cate_of_group, cate_of_unit, groups_of, main_group};
pub use algorithm::regression::Estimator;

// Data
pub use data::{MissingDataPolicy, RawTable, UnitId, UnitTable};

// Arrow types
pub use arrow::record_batch::RecordBatch;
