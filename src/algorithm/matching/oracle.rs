//! Drop-selection oracle
//!
//! Every candidate is scored independently (map, optionally on a rayon
//! pool) and the scores are then reduced sequentially in candidate order,
//! so the first best candidate wins no matter how the map was scheduled.
//!
//! * Fixed weights: the score is the total weight of the covariates kept.
//! * Model, DAME: the score is `-PE`.
//! * Model, FLAME: the score is the match quality `C * BF - PE`.

use log::debug;
use rayon::ThreadPool;
use rayon::prelude::*;

use super::covariate_set::CovariateSet;
use super::frontier::{Candidate, Phase};
use super::grouping::{GroupingBackend, Grouping};
use crate::algorithm::regression::{
    DesignMatrix, Predictor, cross_validated_mse, mean_squared_error,
};
use crate::config::{DropSelection, ModelConfig};
use crate::data::UnitTable;

/// Predictive error of matching without the covariates in `dropped`
///
/// One model is fitted on the treated and one on the control rows of the
/// holdout, using the remaining covariates as features. The PE is the sum of
/// the two mean squared errors.
///
/// # Returns
/// `None` when either arm of the holdout is empty or no feature is left
#[must_use]
pub fn predictive_error(
    holdout: &UnitTable,
    dropped: &CovariateSet,
    model: &ModelConfig,
) -> Option<f64> {
    let features: Vec<usize> = (0..holdout.num_covariates())
        .filter(|c| !dropped.contains(c))
        .collect();
    if features.is_empty() {
        return None;
    }

    let treated = holdout.treated_rows();
    let control = holdout.control_rows();
    if treated.is_empty() || control.is_empty() {
        return None;
    }

    Some(
        arm_error(holdout, &treated, &features, model)
            + arm_error(holdout, &control, &features, model),
    )
}

fn arm_error(table: &UnitTable, rows: &[usize], features: &[usize], model: &ModelConfig) -> f64 {
    let mut data = Vec::with_capacity(rows.len() * features.len());
    for &row in rows {
        data.extend(features.iter().map(|&c| f64::from(table.value(row, c))));
    }
    let x = DesignMatrix::new(data, rows.len(), features.len());
    let y: Vec<f64> = rows.iter().map(|&row| table.outcome(row)).collect();

    match model.cv_folds {
        Some(folds) => cross_validated_mse(&model.estimator, &x, &y, folds),
        None => {
            let fitted = model.estimator.fit(&x, &y);
            mean_squared_error(&y, &fitted.predict(&x))
        }
    }
}

/// Balancing factor of a grouping
///
/// Share of the unmatched treated units it matches plus share of the
/// unmatched control units it matches. An arm without unmatched units
/// contributes 0.
#[must_use]
pub fn balancing_factor(
    grouping: &Grouping,
    table: &UnitTable,
    unmatched_treated: usize,
    unmatched_control: usize,
) -> f64 {
    let (treated, control) = grouping.newly_matched_counts(table);
    let share = |part: usize, whole: usize| {
        if whole == 0 {
            0.0
        } else {
            part as f64 / whole as f64
        }
    };
    share(treated, unmatched_treated) + share(control, unmatched_control)
}

/// Total weight of the covariates kept when `dropped` is removed
#[must_use]
pub fn retained_weight(weights: &[f64], dropped: &CovariateSet) -> f64 {
    weights
        .iter()
        .enumerate()
        .filter(|(c, _)| !dropped.contains(c))
        .map(|(_, w)| w)
        .sum()
}

/// The drop chosen for a round
#[derive(Debug, Clone)]
pub struct Selection {
    /// Winning candidate
    pub candidate: Candidate,
    /// PE of the winning drop (model mode)
    pub predictive_error: Option<f64>,
    /// BF of the winning drop (FLAME in model mode)
    pub balancing_factor: Option<f64>,
    /// Grouping computed while scoring, reused by the loop
    pub grouping: Option<Grouping>,
}

/// Result of asking the oracle for a drop
#[derive(Debug, Clone)]
pub enum Decision {
    /// Drop this candidate
    Drop(Selection),
    /// Some candidate could not be scored
    NoValidDrop,
}

struct Scored {
    score: f64,
    predictive_error: Option<f64>,
    balancing_factor: Option<f64>,
    grouping: Option<Grouping>,
}

/// Scores candidate drops for one matching run
#[derive(Debug)]
pub struct DropOracle<'a> {
    /// Matching table
    pub table: &'a UnitTable,
    /// Holdout table used to fit outcome models
    pub holdout: &'a UnitTable,
    /// Selection strategy
    pub selection: &'a DropSelection,
    /// FLAME tradeoff `C`
    pub tradeoff: f64,
    /// Backend used to compute BF groupings
    pub backend: &'a dyn GroupingBackend,
    /// Pool for parallel scoring, if enabled
    pub pool: Option<&'a ThreadPool>,
}

impl DropOracle<'_> {
    /// PE with nothing dropped, if model mode applies
    #[must_use]
    pub fn baseline_error(&self) -> Option<f64> {
        match self.selection {
            DropSelection::Model(model) => {
                predictive_error(self.holdout, &CovariateSet::empty(), model)
            }
            DropSelection::FixedWeights(_) => None,
        }
    }

    /// Pick the best candidate
    ///
    /// # Arguments
    /// * `candidates` - Eligible candidates in scan order
    /// * `phase` - Variant in charge this round
    /// * `pool_rows` - Rows the grouper may use this round
    /// * `unmatched` - Per table row, whether the row is still unmatched
    pub fn choose(
        &self,
        candidates: &[Candidate],
        phase: Phase,
        pool_rows: &[usize],
        unmatched: &[bool],
    ) -> Decision {
        let score = |candidate: &Candidate| self.score(candidate, phase, pool_rows, unmatched);

        let scores: Vec<Option<Scored>> = match self.pool {
            Some(pool) if candidates.len() > 1 => {
                pool.install(|| candidates.par_iter().map(score).collect())
            }
            _ => candidates.iter().map(score).collect(),
        };

        let mut best: Option<(usize, Scored)> = None;
        for (idx, scored) in scores.into_iter().enumerate() {
            let Some(scored) = scored else {
                debug!("Candidate {} could not be scored", candidates[idx].drop);
                return Decision::NoValidDrop;
            };
            debug!(
                "Candidate {} scored {:.6} (PE {:?}, BF {:?})",
                candidates[idx].drop, scored.score, scored.predictive_error, scored.balancing_factor
            );
            if best.as_ref().is_none_or(|(_, b)| scored.score > b.score) {
                best = Some((idx, scored));
            }
        }

        match best {
            Some((idx, scored)) => Decision::Drop(Selection {
                candidate: candidates[idx].clone(),
                predictive_error: scored.predictive_error,
                balancing_factor: scored.balancing_factor,
                grouping: scored.grouping,
            }),
            None => Decision::NoValidDrop,
        }
    }

    fn score(
        &self,
        candidate: &Candidate,
        phase: Phase,
        pool_rows: &[usize],
        unmatched: &[bool],
    ) -> Option<Scored> {
        match self.selection {
            DropSelection::FixedWeights(weights) => Some(Scored {
                score: retained_weight(weights, &candidate.drop),
                predictive_error: None,
                balancing_factor: None,
                grouping: None,
            }),
            DropSelection::Model(model) => {
                let pe = predictive_error(self.holdout, &candidate.drop, model)?;
                if phase == Phase::Dame {
                    return Some(Scored {
                        score: -pe,
                        predictive_error: Some(pe),
                        balancing_factor: None,
                        grouping: None,
                    });
                }

                let kept =
                    CovariateSet::all(self.table.num_covariates()).difference(&candidate.drop);
                let grouping = self.backend.group(self.table, pool_rows, unmatched, &kept);
                let (unmatched_treated, unmatched_control) = unmatched
                    .iter()
                    .enumerate()
                    .filter(|&(_, &u)| u)
                    .fold((0, 0), |(t, c), (row, _)| {
                        if self.table.is_treated(row) {
                            (t + 1, c)
                        } else {
                            (t, c + 1)
                        }
                    });
                let bf =
                    balancing_factor(&grouping, self.table, unmatched_treated, unmatched_control);
                Some(Scored {
                    score: self.tradeoff * bf - pe,
                    predictive_error: Some(pe),
                    balancing_factor: Some(bf),
                    grouping: Some(grouping),
                })
            }
        }
    }
}
