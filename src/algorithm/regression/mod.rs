//! Outcome regression models for the predictive-error oracle
//!
//! Two estimators are available: ridge regression solved in closed form and
//! a CART regression tree. Both are fitted on a dense row-major design
//! matrix built from covariate codes.

pub mod ridge;
pub mod tree;
pub mod validation;

use serde::{Deserialize, Serialize};

pub use ridge::RidgeModel;
pub use tree::RegressionTree;
pub use validation::{cross_validated_mse, mean_squared_error};

/// Dense row-major feature matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl DesignMatrix {
    /// Create a matrix from row-major data
    ///
    /// # Panics
    /// Panics if `data.len() != rows * cols`
    #[must_use]
    pub fn new(data: Vec<f64>, rows: usize, cols: usize) -> Self {
        assert_eq!(data.len(), rows * cols, "design matrix shape mismatch");
        Self { data, rows, cols }
    }

    /// Number of rows
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of feature columns
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// One row of features
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Single cell
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    /// New matrix holding the given rows in order
    #[must_use]
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let mut data = Vec::with_capacity(rows.len() * self.cols);
        for &r in rows {
            data.extend_from_slice(self.row(r));
        }
        Self {
            data,
            rows: rows.len(),
            cols: self.cols,
        }
    }
}

/// Anything that predicts an outcome from a feature row
pub trait Predictor {
    /// Predict the outcome of one feature row
    fn predict_row(&self, row: &[f64]) -> f64;

    /// Predict every row of `x`
    fn predict(&self, x: &DesignMatrix) -> Vec<f64> {
        (0..x.rows()).map(|i| self.predict_row(x.row(i))).collect()
    }
}

/// Regression estimator used to compute predictive error
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    /// Ridge regression with L2 penalty `alpha` (intercept not penalized)
    Ridge {
        /// Penalty strength
        alpha: f64,
    },
    /// CART regression tree
    DecisionTree {
        /// Maximum depth of the tree
        max_depth: usize,
    },
}

impl Default for Estimator {
    fn default() -> Self {
        Self::Ridge { alpha: 0.1 }
    }
}

impl Estimator {
    /// Fit the estimator to `(x, y)`
    #[must_use]
    pub fn fit(&self, x: &DesignMatrix, y: &[f64]) -> FittedModel {
        match *self {
            Self::Ridge { alpha } => FittedModel::Ridge(RidgeModel::fit(x, y, alpha)),
            Self::DecisionTree { max_depth } => {
                FittedModel::Tree(RegressionTree::fit(x, y, max_depth))
            }
        }
    }
}

/// A fitted estimator
#[derive(Debug, Clone)]
pub enum FittedModel {
    /// Fitted ridge regression
    Ridge(RidgeModel),
    /// Fitted regression tree
    Tree(RegressionTree),
}

impl Predictor for FittedModel {
    fn predict_row(&self, row: &[f64]) -> f64 {
        match self {
            Self::Ridge(model) => model.predict_row(row),
            Self::Tree(model) => model.predict_row(row),
        }
    }
}
