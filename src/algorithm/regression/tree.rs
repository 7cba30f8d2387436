//! CART regression tree
//!
//! Splits minimise the summed squared error of the two children. Thresholds
//! are midpoints between consecutive distinct feature values, and the first
//! best split (lowest feature, then lowest threshold) wins ties.

use super::{DesignMatrix, Predictor};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Fitted regression tree
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    root: Node,
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    /// Fit a tree of at most `max_depth` levels
    #[must_use]
    pub fn fit(x: &DesignMatrix, y: &[f64], max_depth: usize) -> Self {
        let rows: Vec<usize> = (0..x.rows()).collect();
        Self {
            root: build(x, y, rows, max_depth),
        }
    }

    /// Depth of the fitted tree; a single leaf has depth 0
    #[must_use]
    pub fn depth(&self) -> usize {
        fn depth_of(node: &Node) -> usize {
            match node {
                Node::Leaf(_) => 0,
                Node::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }
}

impl Predictor for RegressionTree {
    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

fn mean_of(y: &[f64], rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&r| y[r]).sum::<f64>() / rows.len() as f64
}

fn sse_of(y: &[f64], rows: &[usize]) -> f64 {
    let mean = mean_of(y, rows);
    rows.iter().map(|&r| (y[r] - mean).powi(2)).sum()
}

fn build(x: &DesignMatrix, y: &[f64], rows: Vec<usize>, depth_left: usize) -> Node {
    let leaf = Node::Leaf(mean_of(y, &rows));
    if depth_left == 0 || rows.len() < 2 {
        return leaf;
    }

    let parent_sse = sse_of(y, &rows);
    let Some(best) = best_split(x, y, &rows) else {
        return leaf;
    };
    if best.sse >= parent_sse {
        return leaf;
    }

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .into_iter()
        .partition(|&r| x.get(r, best.feature) <= best.threshold);

    Node::Split {
        feature: best.feature,
        threshold: best.threshold,
        left: Box::new(build(x, y, left_rows, depth_left - 1)),
        right: Box::new(build(x, y, right_rows, depth_left - 1)),
    }
}

fn best_split(x: &DesignMatrix, y: &[f64], rows: &[usize]) -> Option<BestSplit> {
    let n = rows.len();
    let total_sum: f64 = rows.iter().map(|&r| y[r]).sum();
    let total_sq: f64 = rows.iter().map(|&r| y[r] * y[r]).sum();

    let mut best: Option<BestSplit> = None;
    let mut order = rows.to_vec();

    for feature in 0..x.cols() {
        order.sort_by(|&a, &b| x.get(a, feature).total_cmp(&x.get(b, feature)));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..n - 1 {
            let value = y[order[k]];
            left_sum += value;
            left_sq += value * value;

            let here = x.get(order[k], feature);
            let next = x.get(order[k + 1], feature);
            if here == next {
                continue;
            }

            let left_n = (k + 1) as f64;
            let right_n = (n - k - 1) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n)
                + (right_sq - right_sum * right_sum / right_n);

            if best.is_none_or(|b| sse < b.sse) {
                best = Some(BestSplit {
                    feature,
                    threshold: (here + next) / 2.0,
                    sse,
                });
            }
        }
    }

    best
}
