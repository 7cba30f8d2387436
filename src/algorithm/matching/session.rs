//! Stepping state machine of the matching loop
//!
//! A session starts in INIT, where every unit is matched exactly on all
//! covariates. Each further [`MatchingSession::step`] evaluates the stopping
//! criteria, asks the oracle for a drop, matches on the remaining covariates
//! and updates the frontier. Once halted, stepping again returns the same
//! reason and changes nothing.

use std::time::Instant;

use indicatif::ProgressBar;
use log::{debug, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use rustc_hash::FxHashMap;

use super::covariate_set::CovariateSet;
use super::frontier::{Frontier, Phase};
use super::grouping::{Grouping, GroupingBackend};
use super::oracle::{Decision, DropOracle};
use super::stopping::{LoopState, PeCheck, StopReason, evaluate};
use super::types::{MatchGroup, MatchingResult, RoundRecord};
use crate::config::MatchingConfig;
use crate::data::UnitTable;
use crate::error::Result;
use crate::utils::logging::progress;

/// Outcome of one transition
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A round was carried out
    Matched(RoundRecord),
    /// The loop is halted
    Halted(StopReason),
}

/// One matching run over a matching table and a holdout table
#[derive(Debug)]
pub struct MatchingSession<'a> {
    config: &'a MatchingConfig,
    table: &'a UnitTable,
    holdout: &'a UnitTable,
    backend: &'a dyn GroupingBackend,
    pool: Option<ThreadPool>,
    frontier: Frontier,
    unmatched: Vec<bool>,
    unmatched_treated: usize,
    unmatched_control: usize,
    weights: Vec<u32>,
    main_groups: Vec<Option<usize>>,
    groups: Vec<MatchGroup>,
    trace: Vec<RoundRecord>,
    baseline_error: Option<f64>,
    rounds_completed: usize,
    initialized: bool,
    halted: Option<StopReason>,
    progress: Option<ProgressBar>,
    started: Instant,
}

impl<'a> MatchingSession<'a> {
    /// Prepare a session
    ///
    /// Inputs are assumed to be validated already; the matcher does that.
    /// In model mode the baseline PE is computed here.
    pub fn new(
        config: &'a MatchingConfig,
        table: &'a UnitTable,
        holdout: &'a UnitTable,
        backend: &'a dyn GroupingBackend,
    ) -> Result<Self> {
        let pool = if config.parallel {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(config.thread_count())
                    .build()?,
            )
        } else {
            None
        };

        let n = table.num_units();
        let mut session = Self {
            config,
            table,
            holdout,
            backend,
            pool,
            frontier: Frontier::new(config.algorithm, table.num_covariates(), config.pre_dame),
            unmatched: vec![true; n],
            unmatched_treated: table.treated_count(),
            unmatched_control: table.control_count(),
            weights: vec![0; n],
            main_groups: vec![None; n],
            groups: Vec::new(),
            trace: Vec::new(),
            baseline_error: None,
            rounds_completed: 0,
            initialized: false,
            halted: None,
            progress: config
                .show_progress
                .then(|| progress::create_spinner(Some("Matching on all covariates"))),
            started: Instant::now(),
        };
        session.baseline_error = session.oracle().baseline_error();
        if let Some(pe) = session.baseline_error {
            debug!("Baseline predictive error: {pe:.6}");
        }
        Ok(session)
    }

    fn oracle(&self) -> DropOracle<'_> {
        DropOracle {
            table: self.table,
            holdout: self.holdout,
            selection: &self.config.drop_selection,
            tradeoff: self.config.tradeoff,
            backend: self.backend,
            pool: self.pool.as_ref(),
        }
    }

    /// Halt reason, if the loop has stopped
    #[must_use]
    pub const fn stop_reason(&self) -> Option<StopReason> {
        self.halted
    }

    /// Groups formed so far
    #[must_use]
    pub fn groups(&self) -> &[MatchGroup] {
        &self.groups
    }

    /// Per-row weights so far
    #[must_use]
    pub fn weights(&self) -> &[u32] {
        &self.weights
    }

    /// Rounds carried out so far, including the initial round
    #[must_use]
    pub fn trace(&self) -> &[RoundRecord] {
        &self.trace
    }

    /// Drop candidates still open for later rounds
    #[must_use]
    pub const fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Perform one transition
    pub fn step(&mut self) -> Step {
        if let Some(reason) = self.halted {
            return Step::Halted(reason);
        }

        if !self.initialized {
            self.initialized = true;
            let all = CovariateSet::all(self.table.num_covariates());
            let rows: Vec<usize> = (0..self.table.num_units()).collect();
            let grouping = self.backend.group(self.table, &rows, &self.unmatched, &all);
            let phase = self.frontier.phase();
            let record = self.record_round(
                phase,
                grouping,
                CovariateSet::empty(),
                all,
                self.baseline_error,
                None,
            );
            return Step::Matched(record);
        }

        let n = self.table.num_covariates();
        let candidates = self.frontier.candidates(n);
        let state = self.loop_state(candidates.len());
        if let Some(reason) = evaluate(&state, &self.config.early_stop, None) {
            return self.halt(reason);
        }

        let phase = self.frontier.phase();
        let pool_rows = self.pool_rows();
        let decision = self
            .oracle()
            .choose(&candidates, phase, &pool_rows, &self.unmatched);
        let selection = match decision {
            Decision::Drop(selection) => selection,
            Decision::NoValidDrop => {
                warn!("No valid drop after {} rounds", self.rounds_completed);
                return self.halt(StopReason::NoValidDrop);
            }
        };

        if let (Some(candidate), Some(baseline)) =
            (selection.predictive_error, self.baseline_error)
        {
            let check = PeCheck {
                candidate,
                baseline,
            };
            if let Some(reason) = evaluate(&state, &self.config.early_stop, Some(check)) {
                return self.halt(reason);
            }
        }

        let matched_on = CovariateSet::all(n).difference(&selection.candidate.drop);
        let grouping = match selection.grouping {
            Some(grouping) => grouping,
            None => self
                .backend
                .group(self.table, &pool_rows, &self.unmatched, &matched_on),
        };

        self.frontier.retire(&selection.candidate);
        self.rounds_completed += 1;
        let record = self.record_round(
            phase,
            grouping,
            selection.candidate.drop,
            matched_on,
            selection.predictive_error,
            selection.balancing_factor,
        );
        Step::Matched(record)
    }

    /// Step until halted
    pub fn run(&mut self) -> StopReason {
        loop {
            if let Step::Halted(reason) = self.step() {
                return reason;
            }
        }
    }

    /// Run to completion and collect the result
    #[must_use]
    pub fn into_result(mut self) -> MatchingResult {
        let stop_reason = self.run();
        let index: FxHashMap<_, _> = self
            .table
            .ids()
            .iter()
            .enumerate()
            .map(|(row, &id)| (id, row))
            .collect();

        MatchingResult {
            algorithm: self.config.algorithm,
            covariate_names: self.table.covariate_names().to_vec(),
            groups: self.groups,
            unit_ids: self.table.ids().to_vec(),
            weights: self.weights,
            main_groups: self.main_groups,
            trace: self.trace,
            stop_reason,
            baseline_error: self.baseline_error,
            matching_time: self.started.elapsed(),
            index,
        }
    }

    fn loop_state(&self, eligible_candidates: usize) -> LoopState {
        LoopState {
            unmatched_treated: self.unmatched_treated,
            unmatched_control: self.unmatched_control,
            total_treated: self.table.treated_count(),
            total_control: self.table.control_count(),
            rounds_completed: self.rounds_completed,
            eligible_candidates,
            repeats: self.config.repeats,
        }
    }

    fn pool_rows(&self) -> Vec<usize> {
        (0..self.table.num_units())
            .filter(|&row| self.config.repeats || self.unmatched[row])
            .collect()
    }

    fn halt(&mut self, reason: StopReason) -> Step {
        info!(
            "Matching halted after {} rounds: {reason}",
            self.rounds_completed
        );
        if let Some(pb) = self.progress.take() {
            progress::finish_progress_bar(&pb, Some(&format!("Halted: {reason}")));
        }
        self.halted = Some(reason);
        Step::Halted(reason)
    }

    fn record_round(
        &mut self,
        phase: Phase,
        grouping: Grouping,
        dropped: CovariateSet,
        matched_on: CovariateSet,
        predictive_error: Option<f64>,
        balancing_factor: Option<f64>,
    ) -> RoundRecord {
        let round = self.trace.len();
        let width = self.table.num_covariates();
        let groups_formed = grouping.groups.len();

        for group in grouping.groups {
            let id = self.groups.len();
            let mut values = vec![None; width];
            for (&c, v) in matched_on.iter().zip(group.values) {
                values[c] = Some(v);
            }

            let mut treated = Vec::new();
            let mut control = Vec::new();
            for &row in &group.rows {
                self.weights[row] += 1;
                if self.unmatched[row] {
                    self.main_groups[row] = Some(id);
                }
                if self.table.is_treated(row) {
                    treated.push(self.table.id(row));
                } else {
                    control.push(self.table.id(row));
                }
            }

            self.groups.push(MatchGroup {
                id,
                round,
                covariates: matched_on.clone(),
                values,
                treated,
                control,
            });
        }

        let mut units_matched = 0;
        for (row, newly) in grouping.newly_matched.iter().enumerate() {
            if *newly && self.unmatched[row] {
                self.unmatched[row] = false;
                units_matched += 1;
                if self.table.is_treated(row) {
                    self.unmatched_treated -= 1;
                } else {
                    self.unmatched_control -= 1;
                }
            }
        }

        let record = RoundRecord {
            round,
            phase,
            dropped,
            matched_on,
            predictive_error,
            balancing_factor,
            groups_formed,
            units_matched,
        };

        info!(
            "Round {} matched on {}: {} groups, {} new units ({} treated, {} control left)",
            round,
            record.matched_on.display_with(self.table.covariate_names()),
            groups_formed,
            units_matched,
            self.unmatched_treated,
            self.unmatched_control
        );
        if let Some(pb) = &self.progress {
            pb.set_message(format!(
                "Round {round}: {} groups, {} treated unmatched",
                self.groups.len(),
                self.unmatched_treated
            ));
        }

        self.trace.push(record.clone());
        record
    }
}
