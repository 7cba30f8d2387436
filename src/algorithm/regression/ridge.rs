//! Ridge regression solved through the normal equations
//!
//! Features and outcome are centered first, so the intercept is recovered
//! from the means and is never penalized.

use super::{DesignMatrix, Predictor};

/// Numerical floor for Cholesky pivots
const EPSILON: f64 = 1e-10;

/// Fitted ridge regression model
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeModel {
    coefficients: Vec<f64>,
    intercept: f64,
}

impl RidgeModel {
    /// Fit `y ~ x` with L2 penalty `alpha`
    #[must_use]
    pub fn fit(x: &DesignMatrix, y: &[f64], alpha: f64) -> Self {
        let n = x.rows();
        let d = x.cols();

        if n == 0 {
            return Self {
                coefficients: vec![0.0; d],
                intercept: 0.0,
            };
        }

        let y_mean = y.iter().sum::<f64>() / n as f64;
        let mut x_mean = vec![0.0; d];
        for i in 0..n {
            for (j, mean) in x_mean.iter_mut().enumerate() {
                *mean += x.get(i, j);
            }
        }
        for mean in &mut x_mean {
            *mean /= n as f64;
        }

        // X^T X + alpha * I and X^T y on centered data
        let mut xtx = vec![0.0; d * d];
        let mut xty = vec![0.0; d];
        let mut centered = vec![0.0; d];
        for i in 0..n {
            for j in 0..d {
                centered[j] = x.get(i, j) - x_mean[j];
            }
            let yc = y[i] - y_mean;
            for j in 0..d {
                xty[j] += centered[j] * yc;
                for k in 0..=j {
                    xtx[j * d + k] += centered[j] * centered[k];
                }
            }
        }
        for j in 0..d {
            for k in 0..j {
                xtx[k * d + j] = xtx[j * d + k];
            }
            xtx[j * d + j] += alpha;
        }

        let coefficients = solve_cholesky(&xtx, &xty, d);
        let intercept = y_mean
            - coefficients
                .iter()
                .zip(&x_mean)
                .map(|(w, m)| w * m)
                .sum::<f64>();

        Self {
            coefficients,
            intercept,
        }
    }

    /// Fitted coefficients, one per feature
    #[must_use]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Fitted intercept
    #[must_use]
    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Predictor for RidgeModel {
    fn predict_row(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

/// Solve `A x = b` for symmetric positive semi-definite `A` (row-major, n x n)
fn solve_cholesky(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    // A = L * L^T
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                l[i * n + j] = sum.max(EPSILON).sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }

    // L * y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * n + j] * y[j];
        }
        y[i] = sum / l[i * n + i];
    }

    // L^T * x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j * n + i] * x[j];
        }
        x[i] = sum / l[i * n + i];
    }

    x
}
