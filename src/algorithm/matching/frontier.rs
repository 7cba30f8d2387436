//! Candidate drops for the next round
//!
//! DAME considers every set in the lattice frontier, while FLAME greedily
//! removes one more covariate per round on top of everything it removed
//! before. FLAME can hand over to DAME after a fixed number of rounds: the
//! covariates FLAME removed stay removed, and the lattice starts from the
//! singletons of the remaining covariates.

use log::info;
use serde::{Deserialize, Serialize};

use super::covariate_set::CovariateSet;
use super::lattice::Lattice;
use crate::config::Algorithm;

/// One candidate drop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Set the frontier tracks (a lattice node for DAME, one covariate for FLAME)
    pub token: CovariateSet,
    /// Every covariate left out if this candidate is chosen
    pub drop: CovariateSet,
}

/// Variant currently driving the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Lattice-based drops
    Dame,
    /// Greedy backward elimination
    Flame,
}

/// Frontier of candidate drops
#[derive(Debug, Clone)]
pub enum Frontier {
    /// FLAME state
    Flame {
        /// Covariates still used for matching, ascending
        remaining: Vec<usize>,
        /// Covariates removed so far
        dropped: CovariateSet,
        /// Rounds completed in this phase
        rounds: usize,
        /// Switch to DAME after this many rounds
        switch_after: Option<usize>,
    },
    /// DAME state
    Dame {
        /// Active and processed sets
        lattice: Lattice,
        /// Covariates removed before the lattice started
        base: CovariateSet,
    },
}

impl Frontier {
    /// Initial frontier over `num_covariates` covariates
    #[must_use]
    pub fn new(algorithm: Algorithm, num_covariates: usize, pre_dame: Option<usize>) -> Self {
        match (algorithm, pre_dame) {
            (Algorithm::Dame, _) | (Algorithm::Flame, Some(0)) => Self::Dame {
                lattice: Lattice::from_singletons(0..num_covariates),
                base: CovariateSet::empty(),
            },
            (Algorithm::Flame, switch_after) => Self::Flame {
                remaining: (0..num_covariates).collect(),
                dropped: CovariateSet::empty(),
                rounds: 0,
                switch_after,
            },
        }
    }

    /// Variant currently in charge
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::Flame { .. } => Phase::Flame,
            Self::Dame { .. } => Phase::Dame,
        }
    }

    /// Eligible candidates in scan order
    ///
    /// A candidate that would drop all `num_covariates` covariates is never
    /// eligible.
    #[must_use]
    pub fn candidates(&self, num_covariates: usize) -> Vec<Candidate> {
        let all: Vec<Candidate> = match self {
            Self::Flame {
                remaining, dropped, ..
            } => remaining
                .iter()
                .map(|&c| Candidate {
                    token: CovariateSet::singleton(c),
                    drop: dropped.with(c),
                })
                .collect(),
            Self::Dame { lattice, base } => lattice
                .active()
                .iter()
                .map(|set| Candidate {
                    token: set.clone(),
                    drop: base.union(set),
                })
                .collect(),
        };
        all.into_iter()
            .filter(|candidate| candidate.drop.len() < num_covariates)
            .collect()
    }

    /// Record that `chosen` was dropped this round
    pub fn retire(&mut self, chosen: &Candidate) {
        let handover = match self {
            Self::Dame { lattice, .. } => {
                lattice.mark_processed(&chosen.token);
                None
            }
            Self::Flame {
                remaining,
                dropped,
                rounds,
                switch_after,
            } => {
                remaining.retain(|c| !chosen.token.contains(c));
                *dropped = dropped.union(&chosen.token);
                *rounds += 1;

                switch_after.filter(|&n| *rounds >= n).map(|_| {
                    info!(
                        "Switching from FLAME to DAME after {} rounds with {} covariates left",
                        rounds,
                        remaining.len()
                    );
                    Self::Dame {
                        lattice: Lattice::from_singletons(remaining.iter().copied()),
                        base: dropped.clone(),
                    }
                })
            }
        };

        if let Some(dame) = handover {
            *self = dame;
        }
    }
}
