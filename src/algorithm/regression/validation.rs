//! Error metrics and k-fold cross-validation

use super::{DesignMatrix, Estimator, Predictor};

/// Mean squared error between observed and predicted outcomes
///
/// Returns 0 for empty input.
#[must_use]
pub fn mean_squared_error(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }
    observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (o - p).powi(2))
        .sum::<f64>()
        / observed.len() as f64
}

/// Mean squared error of `estimator` under contiguous k-fold cross-validation
///
/// Rows are split into `folds` contiguous blocks in input order; the first
/// `n % folds` blocks get one extra row. The fold errors are averaged.
/// With fewer rows than folds, one fold per row is used; with fewer than two
/// rows, the in-sample error is returned.
#[must_use]
pub fn cross_validated_mse(
    estimator: &Estimator,
    x: &DesignMatrix,
    y: &[f64],
    folds: usize,
) -> f64 {
    let n = x.rows();
    if n < 2 || folds < 2 {
        let model = estimator.fit(x, y);
        return mean_squared_error(y, &model.predict(x));
    }

    let k = folds.min(n);
    let base = n / k;
    let extra = n % k;

    let mut total = 0.0;
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;

        let train: Vec<usize> = (0..start).chain(end..n).collect();
        let test: Vec<usize> = (start..end).collect();

        let x_train = x.select_rows(&train);
        let y_train: Vec<f64> = train.iter().map(|&r| y[r]).collect();
        let x_test = x.select_rows(&test);
        let y_test: Vec<f64> = test.iter().map(|&r| y[r]).collect();

        let model = estimator.fit(&x_train, &y_train);
        total += mean_squared_error(&y_test, &model.predict(&x_test));
        start = end;
    }

    total / k as f64
}
