//! Covariate-set lattice tracking for DAME
//!
//! Keeps the frontier of covariate sets that are eligible to be dropped and
//! grows it with the support-closure rule each time a set is processed.

use std::collections::BTreeSet;
use std::hash::Hash;

use rustc_hash::{FxHashMap, FxHashSet};

use super::covariate_set::CovariateSet;

/// Compute the covariate sets that become eligible after dropping `dropped`
///
/// A superset `dropped ∪ {alpha}` is activated only when every one of its
/// subsets of size `|dropped|` has already been processed. The result is
/// derived from `processed` alone; no other state is carried between calls.
///
/// # Arguments
/// * `dropped` - The covariate set that was just dropped (size k)
/// * `processed` - Every covariate set dropped so far
///
/// # Returns
/// The newly eligible sets, each of size k + 1
pub fn generate_new_active_sets<'a, T, I>(
    dropped: &'a CovariateSet<T>,
    processed: I,
) -> BTreeSet<CovariateSet<T>>
where
    T: Ord + Clone + Hash + 'a,
    I: IntoIterator<Item = &'a CovariateSet<T>>,
{
    let k = dropped.len();

    let mut same_size: FxHashSet<&CovariateSet<T>> = processed
        .into_iter()
        .filter(|set| set.len() == k)
        .collect();
    same_size.insert(dropped);

    // Support of each covariate among the size-k sets
    let mut support: FxHashMap<&T, usize> = FxHashMap::default();
    for set in &same_size {
        for covariate in set.iter() {
            *support.entry(covariate).or_insert(0) += 1;
        }
    }

    if dropped
        .iter()
        .any(|covariate| support.get(covariate).copied().unwrap_or(0) < k)
    {
        return BTreeSet::new();
    }

    let mut omega: Vec<&T> = support
        .iter()
        .filter(|&(covariate, &count)| count >= k && !dropped.contains(*covariate))
        .map(|(covariate, _)| *covariate)
        .collect();
    omega.sort_unstable();

    omega
        .into_iter()
        .map(|alpha| dropped.with(alpha.clone()))
        .filter(|candidate| {
            candidate
                .iter()
                .all(|covariate| same_size.contains(&candidate.without(covariate)))
        })
        .collect()
}

/// Active and processed covariate sets of a DAME run
#[derive(Debug, Clone)]
pub struct Lattice<T = usize> {
    active: BTreeSet<CovariateSet<T>>,
    processed: BTreeSet<CovariateSet<T>>,
}

impl<T: Ord + Clone + Hash> Lattice<T> {
    /// Start a lattice whose frontier is the singletons of `covariates`
    pub fn from_singletons(covariates: impl IntoIterator<Item = T>) -> Self {
        Self {
            active: covariates.into_iter().map(CovariateSet::singleton).collect(),
            processed: BTreeSet::new(),
        }
    }

    /// Sets currently eligible to be dropped, in scan order
    #[must_use]
    pub fn active(&self) -> &BTreeSet<CovariateSet<T>> {
        &self.active
    }

    /// Sets dropped in earlier rounds
    #[must_use]
    pub fn processed(&self) -> &BTreeSet<CovariateSet<T>> {
        &self.processed
    }

    /// Move `dropped` from the frontier to the processed sets and extend the
    /// frontier with whatever the closure rule activates
    ///
    /// Returns the number of sets added to the frontier.
    pub fn mark_processed(&mut self, dropped: &CovariateSet<T>) -> usize {
        self.active.remove(dropped);
        self.processed.insert(dropped.clone());

        let mut added = 0;
        for set in generate_new_active_sets(dropped, &self.processed) {
            if !self.processed.contains(&set) && self.active.insert(set) {
                added += 1;
            }
        }
        added
    }
}
