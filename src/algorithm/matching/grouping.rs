//! Exact matching on a covariate subset
//!
//! Rows are keyed by a mixed-radix encoding of their covariate values,
//! `key = Σ value_i · base_i` with `base_i = Π_{j<i} (max_j + 1)`, and a
//! second key folds in the treatment. A row belongs to a class with both
//! arms exactly when the counts of its two keys differ.

use std::fmt;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::covariate_set::CovariateSet;
use crate::data::UnitTable;

/// Rows that share one value tuple and contain both arms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowGroup {
    /// Covariate values shared by the rows, in subset order
    pub values: Vec<u32>,
    /// Member rows in first-appearance order
    pub rows: Vec<usize>,
}

/// Outcome of grouping a pool on one covariate subset
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    /// New groups, each containing at least one previously unmatched row
    pub groups: Vec<RowGroup>,
    /// Per table row: was unmatched before and is in a group now
    pub newly_matched: Vec<bool>,
}

impl Grouping {
    /// Number of newly matched `(treated, control)` rows
    #[must_use]
    pub fn newly_matched_counts(&self, table: &UnitTable) -> (usize, usize) {
        self.newly_matched
            .iter()
            .enumerate()
            .filter(|&(_, &matched)| matched)
            .fold((0, 0), |(t, c), (row, _)| {
                if table.is_treated(row) {
                    (t + 1, c)
                } else {
                    (t, c + 1)
                }
            })
    }

    /// Total number of newly matched rows
    #[must_use]
    pub fn newly_matched_total(&self) -> usize {
        self.newly_matched.iter().filter(|&&m| m).count()
    }
}

/// Strategy used to form exact-match groups
///
/// The matching loop only talks to this trait, so a different backend (a
/// relational one, for instance) can replace the in-memory hash grouper.
pub trait GroupingBackend: Send + Sync + fmt::Debug {
    /// Group `pool` on `covariates`
    ///
    /// # Arguments
    /// * `table` - Matching table
    /// * `pool` - Rows eligible to be grouped this round
    /// * `unmatched` - Per table row, whether the row is still unmatched
    /// * `covariates` - Covariates the rows must agree on
    fn group(
        &self,
        table: &UnitTable,
        pool: &[usize],
        unmatched: &[bool],
        covariates: &CovariateSet,
    ) -> Grouping;
}

/// In-memory grouper based on hashed mixed-radix keys
#[derive(Debug, Clone, Copy, Default)]
pub struct HashGrouper;

impl GroupingBackend for HashGrouper {
    fn group(
        &self,
        table: &UnitTable,
        pool: &[usize],
        unmatched: &[bool],
        covariates: &CovariateSet,
    ) -> Grouping {
        let (keys, product) = covariate_keys(table, pool, covariates);
        let flags = matched_flags(table, pool, &keys, product);

        let mut class_of: FxHashMap<u128, usize> = FxHashMap::default();
        let mut classes: Vec<RowGroup> = Vec::new();
        let mut has_unmatched: Vec<bool> = Vec::new();

        for ((&row, &key), &matched) in pool.iter().zip(&keys).zip(&flags) {
            if !matched {
                continue;
            }
            let idx = *class_of.entry(key).or_insert_with(|| {
                classes.push(RowGroup {
                    values: covariates.iter().map(|&c| table.value(row, c)).collect(),
                    rows: Vec::new(),
                });
                has_unmatched.push(false);
                classes.len() - 1
            });
            classes[idx].rows.push(row);
            has_unmatched[idx] |= unmatched[row];
        }

        let mut newly_matched = vec![false; table.num_units()];
        let groups = classes
            .into_iter()
            .zip(has_unmatched)
            .filter(|(_, any)| *any)
            .map(|(group, _)| {
                for &row in &group.rows {
                    newly_matched[row] = unmatched[row];
                }
                group
            })
            .collect();

        Grouping {
            groups,
            newly_matched,
        }
    }
}

/// Whether each pool row has an exact match in the other arm on `covariates`
///
/// The result is aligned with `pool`.
#[must_use]
pub fn exact_match_flags(
    table: &UnitTable,
    pool: &[usize],
    covariates: &CovariateSet,
) -> Vec<bool> {
    let (keys, product) = covariate_keys(table, pool, covariates);
    matched_flags(table, pool, &keys, product)
}

fn matched_flags(table: &UnitTable, pool: &[usize], keys: &[u128], product: u128) -> Vec<bool> {
    let folded = |row: usize, key: u128| key + u128::from(table.is_treated(row)) * product;

    let mut covariate_counts: FxHashMap<u128, usize> = FxHashMap::default();
    let mut treatment_counts: FxHashMap<u128, usize> = FxHashMap::default();
    for (&row, &key) in pool.iter().zip(keys) {
        *covariate_counts.entry(key).or_insert(0) += 1;
        *treatment_counts.entry(folded(row, key)).or_insert(0) += 1;
    }

    pool.iter()
        .zip(keys)
        .map(|(&row, &key)| covariate_counts[&key] != treatment_counts[&folded(row, key)])
        .collect()
}

/// Mixed-radix key of every pool row, plus the radix product
///
/// Falls back to interning value tuples to dense codes when twice the
/// product does not fit in 128 bits.
fn covariate_keys(
    table: &UnitTable,
    pool: &[usize],
    covariates: &CovariateSet,
) -> (Vec<u128>, u128) {
    if let Some((bases, product)) = radix_bases(table, covariates) {
        let keys = pool
            .iter()
            .map(|&row| {
                covariates
                    .iter()
                    .zip(&bases)
                    .map(|(&c, &base)| u128::from(table.value(row, c)) * base)
                    .sum::<u128>()
            })
            .collect();
        return (keys, product);
    }

    let mut codes: FxHashMap<SmallVec<[u32; 8]>, u128> = FxHashMap::default();
    let keys = pool
        .iter()
        .map(|&row| {
            let tuple: SmallVec<[u32; 8]> =
                covariates.iter().map(|&c| table.value(row, c)).collect();
            let next = codes.len() as u128;
            *codes.entry(tuple).or_insert(next)
        })
        .collect();
    (keys, codes.len() as u128)
}

fn radix_bases(table: &UnitTable, covariates: &CovariateSet) -> Option<(Vec<u128>, u128)> {
    let maxima = table.maxima();
    let mut bases = Vec::with_capacity(covariates.len());
    let mut product: u128 = 1;
    for &c in covariates {
        bases.push(product);
        product = product.checked_mul(u128::from(maxima[c]) + 1)?;
    }
    // Room for the treatment digit
    product.checked_mul(2)?;
    Some((bases, product))
}
