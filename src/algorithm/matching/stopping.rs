//! Stopping criteria of the matching loop
//!
//! [`evaluate`] is a pure function of the loop state and the early-stop
//! configuration. Predicates are checked in a fixed order and the first one
//! that holds decides the halt reason.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EarlyStop;

/// Snapshot of the loop state seen by the evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopState {
    /// Treated units not yet in any group
    pub unmatched_treated: usize,
    /// Control units not yet in any group
    pub unmatched_control: usize,
    /// Treated units in the matching table
    pub total_treated: usize,
    /// Control units in the matching table
    pub total_control: usize,
    /// Drop rounds completed so far (the initial full-covariate round is not counted)
    pub rounds_completed: usize,
    /// Candidate drops still eligible
    pub eligible_candidates: usize,
    /// Whether matched units stay in the pool
    pub repeats: bool,
}

/// Predictive error of the chosen drop against the baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeCheck {
    /// PE after the chosen drop
    pub candidate: f64,
    /// PE with every covariate kept
    pub baseline: f64,
}

/// Why the loop halted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every treated unit is matched
    UnmatchedTreatedExhausted,
    /// Every control unit is matched
    UnmatchedControlExhausted,
    /// Every unit is matched
    AllUnitsMatched,
    /// The configured number of drop rounds was reached
    IterationLimit,
    /// Share of unmatched treated units fell below the threshold
    TreatedFractionReached,
    /// Share of unmatched control units fell below the threshold
    ControlFractionReached,
    /// The next drop would raise the predictive error too far
    PredictiveErrorLimit,
    /// No covariate set is left to drop
    CovariatesExhausted,
    /// The oracle could not score a candidate
    NoValidDrop,
}

/// Coarse class of a [`StopReason`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    /// Nothing left to match or to drop
    Exhausted,
    /// A configured threshold was reached
    EarlyStop,
    /// The round could not be carried out
    Degenerate,
}

impl StopReason {
    /// Classify the reason
    #[must_use]
    pub const fn kind(self) -> StopKind {
        match self {
            Self::UnmatchedTreatedExhausted
            | Self::UnmatchedControlExhausted
            | Self::AllUnitsMatched
            | Self::CovariatesExhausted => StopKind::Exhausted,
            Self::IterationLimit
            | Self::TreatedFractionReached
            | Self::ControlFractionReached
            | Self::PredictiveErrorLimit => StopKind::EarlyStop,
            Self::NoValidDrop => StopKind::Degenerate,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnmatchedTreatedExhausted => "no unmatched treated units left",
            Self::UnmatchedControlExhausted => "no unmatched control units left",
            Self::AllUnitsMatched => "all units matched",
            Self::IterationLimit => "iteration limit reached",
            Self::TreatedFractionReached => "unmatched treated fraction below threshold",
            Self::ControlFractionReached => "unmatched control fraction below threshold",
            Self::PredictiveErrorLimit => "predictive error exceeds tolerance",
            Self::CovariatesExhausted => "no covariate sets left to drop",
            Self::NoValidDrop => "no valid drop could be scored",
        };
        f.write_str(text)
    }
}

fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Decide whether the loop must halt
///
/// # Arguments
/// * `state` - Current loop state
/// * `early_stop` - Configured thresholds
/// * `pe` - PE of the chosen drop, once the oracle has picked one
///
/// # Returns
/// The first predicate that holds, or `None` to keep going
#[must_use]
pub fn evaluate(
    state: &LoopState,
    early_stop: &EarlyStop,
    pe: Option<PeCheck>,
) -> Option<StopReason> {
    if state.unmatched_treated == 0 && (early_stop.stop_unmatched_treated || !state.repeats) {
        return Some(StopReason::UnmatchedTreatedExhausted);
    }
    if state.unmatched_control == 0 && (early_stop.stop_unmatched_control || !state.repeats) {
        return Some(StopReason::UnmatchedControlExhausted);
    }
    if state.unmatched_treated + state.unmatched_control == 0 {
        return Some(StopReason::AllUnitsMatched);
    }
    if early_stop
        .iterations
        .is_some_and(|cap| state.rounds_completed >= cap)
    {
        return Some(StopReason::IterationLimit);
    }
    if early_stop
        .unmatched_treated_fraction
        .is_some_and(|t| fraction(state.unmatched_treated, state.total_treated) < t)
    {
        return Some(StopReason::TreatedFractionReached);
    }
    if early_stop
        .unmatched_control_fraction
        .is_some_and(|t| fraction(state.unmatched_control, state.total_control) < t)
    {
        return Some(StopReason::ControlFractionReached);
    }
    if let (Some(check), Some(epsilon)) = (pe, early_stop.pe_fraction) {
        if check.candidate > (1.0 + epsilon) * check.baseline {
            return Some(StopReason::PredictiveErrorLimit);
        }
    }
    if state.eligible_candidates == 0 {
        return Some(StopReason::CovariatesExhausted);
    }
    None
}
