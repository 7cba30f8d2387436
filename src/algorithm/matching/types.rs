//! Type definitions for the matching algorithm
//!
//! This module contains the outputs of a matching run: the groups, the
//! per-round trace and the overall result.

use std::fmt;
use std::time::Duration;

use rustc_hash::FxHashMap;
use serde::Serialize;

use super::covariate_set::CovariateSet;
use super::frontier::Phase;
use super::stopping::StopReason;
use crate::config::Algorithm;
use crate::data::UnitId;

/// A group of units matched exactly on a covariate set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchGroup {
    /// Position of the group in the result
    pub id: usize,
    /// Round the group was formed in (0 is the initial round)
    pub round: usize,
    /// Covariates the members agree on
    pub covariates: CovariateSet,
    /// Shared value per covariate; `None` for covariates not matched on
    pub values: Vec<Option<u32>>,
    /// Treated members
    pub treated: Vec<UnitId>,
    /// Control members
    pub control: Vec<UnitId>,
}

impl MatchGroup {
    /// Number of members
    #[must_use]
    pub fn len(&self) -> usize {
        self.treated.len() + self.control.len()
    }

    /// Groups always have members; provided for symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `unit` belongs to the group
    #[must_use]
    pub fn contains(&self, unit: UnitId) -> bool {
        self.treated.contains(&unit) || self.control.contains(&unit)
    }

    /// All members, treated first
    pub fn members(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.treated.iter().chain(&self.control).copied()
    }

    /// Render the value tuple, with `*` for covariates not matched on
    #[must_use]
    pub fn values_display(&self) -> String {
        let values: Vec<String> = self
            .values
            .iter()
            .map(|v| v.map_or_else(|| "*".to_string(), |v| v.to_string()))
            .collect();
        format!("({})", values.join(", "))
    }
}

/// What happened in one round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundRecord {
    /// Round number (0 is the initial round on every covariate)
    pub round: usize,
    /// Variant in charge of the round
    pub phase: Phase,
    /// Covariates left out this round
    pub dropped: CovariateSet,
    /// Covariates matched on this round
    pub matched_on: CovariateSet,
    /// PE of the chosen drop (model mode)
    pub predictive_error: Option<f64>,
    /// BF of the chosen drop (FLAME in model mode)
    pub balancing_factor: Option<f64>,
    /// New groups formed
    pub groups_formed: usize,
    /// Units matched for the first time
    pub units_matched: usize,
}

/// Result of the matching process
#[derive(Debug, Clone, Serialize)]
pub struct MatchingResult {
    /// Algorithm the run started with
    pub algorithm: Algorithm,
    /// Covariate names of the matching table
    pub covariate_names: Vec<String>,
    /// Groups in creation order
    pub groups: Vec<MatchGroup>,
    /// Unit ids of the matching table, in row order
    pub unit_ids: Vec<UnitId>,
    /// Number of groups each unit belongs to, aligned with `unit_ids`
    pub weights: Vec<u32>,
    /// Group each unit was first matched in, aligned with `unit_ids`
    pub main_groups: Vec<Option<usize>>,
    /// One record per round
    pub trace: Vec<RoundRecord>,
    /// Why matching stopped
    pub stop_reason: StopReason,
    /// PE with every covariate kept (model mode)
    pub baseline_error: Option<f64>,
    /// Time taken for matching
    pub matching_time: Duration,
    #[serde(skip)]
    pub(crate) index: FxHashMap<UnitId, usize>,
}

impl MatchingResult {
    /// Row of `unit` in the matching table
    #[must_use]
    pub fn position(&self, unit: UnitId) -> Option<usize> {
        self.index.get(&unit).copied()
    }

    /// Number of groups `unit` belongs to
    #[must_use]
    pub fn weight_of(&self, unit: UnitId) -> Option<u32> {
        self.position(unit).map(|row| self.weights[row])
    }

    /// Group `unit` was first matched in
    #[must_use]
    pub fn main_group_of(&self, unit: UnitId) -> Option<&MatchGroup> {
        let row = self.position(unit)?;
        self.main_groups[row].map(|id| &self.groups[id])
    }

    /// Number of units in at least one group
    #[must_use]
    pub fn matched_count(&self) -> usize {
        self.main_groups.iter().filter(|g| g.is_some()).count()
    }

    /// Ids of units never matched
    #[must_use]
    pub fn unmatched_units(&self) -> Vec<UnitId> {
        self.unit_ids
            .iter()
            .zip(&self.main_groups)
            .filter(|(_, g)| g.is_none())
            .map(|(&id, _)| id)
            .collect()
    }

    /// Covariates matched on per round, by name
    #[must_use]
    pub fn matched_on_names(&self) -> Vec<Vec<String>> {
        self.trace
            .iter()
            .map(|record| {
                record
                    .matched_on
                    .iter()
                    .map(|&c| self.covariate_names[c].clone())
                    .collect()
            })
            .collect()
    }
}

impl fmt::Display for MatchingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} matched {} of {} units into {} groups over {} rounds in {:.2?} ({})",
            self.algorithm,
            self.matched_count(),
            self.unit_ids.len(),
            self.groups.len(),
            self.trace.len(),
            self.matching_time,
            self.stop_reason
        )?;
        for record in &self.trace {
            writeln!(
                f,
                "  round {:>3} [{:?}] matched on {}: {} groups, {} new units",
                record.round,
                record.phase,
                record.matched_on.display_with(&self.covariate_names),
                record.groups_formed,
                record.units_matched
            )?;
        }
        Ok(())
    }
}
