//! Tests for stepping a matching session by hand

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dame_flame::algorithm::matching::{Grouping, GroupingBackend, HashGrouper, MatchingSession};
use dame_flame::{CovariateSet, Matcher, Step, StopReason, UnitTable};

use crate::utils::{fixed_weight_builder, four_units, synthetic};

#[test]
fn test_first_step_matches_on_every_covariate() {
    let table = four_units();
    let matcher = Matcher::new(fixed_weight_builder(vec![0.75, 0.25]).build());
    let mut session = matcher.session(&table, &table).unwrap();

    let Step::Matched(record) = session.step() else {
        panic!("expected the initial round");
    };
    assert_eq!(record.round, 0);
    assert!(record.dropped.is_empty());
    assert_eq!(record.matched_on, CovariateSet::all(2));
    assert_eq!(record.groups_formed, 1);
    assert_eq!(record.units_matched, 2);
    assert_eq!(session.weights(), &[1, 1, 0, 0]);
}

#[test]
fn test_halted_session_is_idempotent() {
    let table = four_units();
    let matcher = Matcher::new(fixed_weight_builder(vec![0.75, 0.25]).build());
    let mut session = matcher.session(&table, &table).unwrap();

    let reason = session.run();
    assert_eq!(reason, StopReason::CovariatesExhausted);
    let groups = session.groups().to_vec();
    let weights = session.weights().to_vec();
    let rounds = session.trace().len();

    for _ in 0..3 {
        assert_eq!(session.step(), Step::Halted(reason));
    }
    assert_eq!(session.stop_reason(), Some(reason));
    assert_eq!(session.groups(), groups.as_slice());
    assert_eq!(session.weights(), weights.as_slice());
    assert_eq!(session.trace().len(), rounds);
}

#[test]
fn test_weights_never_decrease_and_groups_only_grow() {
    let table = synthetic(300, 300, 17);
    let matcher = Matcher::new(fixed_weight_builder(vec![4.0, 3.0, 2.0, 1.0]).build());
    let mut session = matcher.session(&table, &table).unwrap();

    let mut weights = session.weights().to_vec();
    let mut groups = 0;
    let mut matched = 0;
    while let Step::Matched(record) = session.step() {
        assert_eq!(record.round + 1, session.trace().len());
        assert_eq!(session.groups().len(), groups + record.groups_formed);
        for (before, after) in weights.iter().zip(session.weights()) {
            assert!(after >= before);
        }
        matched += record.units_matched;
        groups = session.groups().len();
        weights = session.weights().to_vec();
    }

    let result = matcher.session(&table, &table).unwrap().into_result();
    assert_eq!(result.matched_count(), matched);
    assert_eq!(result.groups.len(), groups);
}

/// Drop sets the session would still consider
fn open_drops(session: &MatchingSession<'_>, num_covariates: usize) -> BTreeSet<CovariateSet> {
    session
        .frontier()
        .candidates(num_covariates)
        .into_iter()
        .map(|candidate| candidate.drop)
        .collect()
}

/// Step to the end, checking that each round retires exactly its own drop
///
/// Returns how many rounds formed no group.
fn step_and_track_frontier(session: &mut MatchingSession<'_>, num_covariates: usize) -> usize {
    let mut empty_rounds = 0;
    loop {
        let before = open_drops(session, num_covariates);
        let step = session.step();
        let after = open_drops(session, num_covariates);
        match step {
            Step::Matched(record) if record.round == 0 => assert_eq!(before, after),
            Step::Matched(record) => {
                let retired: Vec<_> = before.difference(&after).cloned().collect();
                assert_eq!(retired, vec![record.dropped.clone()]);
                assert!(!after.contains(&record.dropped));
                if record.groups_formed == 0 {
                    empty_rounds += 1;
                }
            }
            Step::Halted(_) => {
                assert_eq!(before, after);
                return empty_rounds;
            }
        }
    }
}

#[test]
fn test_rounds_without_groups_still_retire_their_drop() {
    let table = four_units();
    let matcher = Matcher::new(fixed_weight_builder(vec![0.75, 0.25]).build());
    let mut session = matcher.session(&table, &table).unwrap();

    let empty_rounds = step_and_track_frontier(&mut session, 2);
    assert_eq!(empty_rounds, 1);
    assert_eq!(session.trace().len(), 3);
    assert!(open_drops(&session, 2).is_empty());
    assert_eq!(session.stop_reason(), Some(StopReason::CovariatesExhausted));
}

#[test]
fn test_every_round_retires_its_drop_from_the_lattice() {
    let table = synthetic(300, 300, 19);
    let matcher = Matcher::new(fixed_weight_builder(vec![4.0, 3.0, 2.0, 1.0]).build());
    let mut session = matcher.session(&table, &table).unwrap();

    step_and_track_frontier(&mut session, 4);
    assert!(session.stop_reason().is_some());
}

/// Delegates to the hash grouper and counts calls
#[derive(Debug, Default)]
struct CountingGrouper {
    calls: Arc<AtomicUsize>,
}

impl GroupingBackend for CountingGrouper {
    fn group(
        &self,
        table: &UnitTable,
        pool: &[usize],
        unmatched: &[bool],
        covariates: &CovariateSet,
    ) -> Grouping {
        self.calls.fetch_add(1, Ordering::Relaxed);
        HashGrouper.group(table, pool, unmatched, covariates)
    }
}

#[test]
fn test_custom_backend_is_used_for_every_round() {
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = CountingGrouper {
        calls: Arc::clone(&calls),
    };
    let matcher =
        Matcher::new(fixed_weight_builder(vec![0.75, 0.25]).build()).with_backend(backend);
    let result = matcher.perform_matching(&four_units(), None).unwrap();

    // Fixed weights never group while scoring, so one call per round
    assert_eq!(calls.load(Ordering::Relaxed), result.trace.len());
    assert_eq!(result.groups.len(), 2);
}
