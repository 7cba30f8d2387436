//! Error handling for the matching engine.

use std::io;

use arrow::error::ArrowError;

/// Specialized error type for matching operations
///
/// Only configuration and input problems surface as errors. Degenerate
/// rounds, exhausted covariates and early stops end the loop normally and
/// are reported through the halt reason of the result instead.
#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    /// Malformed or inconsistent configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Matching and holdout tables disagree on their columns
    #[error("Schema error: {0}")]
    Schema(String),

    /// A unit table violates one of its invariants
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    /// A covariate cell is missing and the active policy does not allow it
    #[error("Missing data in column '{column}' at row {row}")]
    MissingData {
        /// Covariate column containing the missing cell
        column: String,
        /// Row index of the missing cell
        row: usize,
    },

    /// Failure converting Arrow input
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error reading a configuration file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error (de)serializing configuration or results
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The rayon pool for candidate scoring could not be built
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl MatchingError {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Shorthand for an invalid-table error
    pub fn table(msg: impl Into<String>) -> Self {
        Self::InvalidTable(msg.into())
    }
}

/// Result type for matching operations
pub type Result<T> = std::result::Result<T, MatchingError>;
