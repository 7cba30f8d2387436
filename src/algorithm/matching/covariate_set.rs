//! Immutable, hashable covariate sets
//!
//! A covariate set is stored as a sorted, deduplicated small vector so that
//! value equality, hashing and ordering do not depend on insertion order.
//! The element type is opaque: anything `Ord + Clone` works, which lets the
//! lattice operate on column indices and on covariate names alike.

use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use serde::Serialize;
use smallvec::SmallVec;

/// A set of covariate tokens with value semantics
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CovariateSet<T = usize> {
    items: SmallVec<[T; 8]>,
}

impl<T: Ord> CovariateSet<T> {
    /// Create a set from any collection of tokens
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        let mut items: SmallVec<[T; 8]> = items.into_iter().collect();
        items.sort_unstable();
        items.dedup();
        Self { items }
    }

    /// The empty set
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: SmallVec::new(),
        }
    }

    /// A set holding a single token
    #[must_use]
    pub fn singleton(item: T) -> Self {
        let mut items = SmallVec::new();
        items.push(item);
        Self { items }
    }

    /// Number of covariates in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the set is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Check whether `item` is a member
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.items.binary_search(item).is_ok()
    }

    /// Iterate over the members in ascending order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Members as a sorted slice
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Check whether every member of `self` is also in `other`
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.items.iter().all(|item| other.contains(item))
    }
}

impl<T: Ord + Clone> CovariateSet<T> {
    /// The set with `item` added
    #[must_use]
    pub fn with(&self, item: T) -> Self {
        match self.items.binary_search(&item) {
            Ok(_) => self.clone(),
            Err(pos) => {
                let mut items = self.items.clone();
                items.insert(pos, item);
                Self { items }
            }
        }
    }

    /// The set with `item` removed
    #[must_use]
    pub fn without(&self, item: &T) -> Self {
        let items = self
            .items
            .iter()
            .filter(|member| *member != item)
            .cloned()
            .collect();
        Self { items }
    }

    /// Union of two sets
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let items = self
            .items
            .iter()
            .merge(other.items.iter())
            .dedup()
            .cloned()
            .collect();
        Self { items }
    }

    /// Members of `self` that are not in `other`
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let items = self
            .items
            .iter()
            .filter(|item| !other.contains(item))
            .cloned()
            .collect();
        Self { items }
    }
}

impl CovariateSet<usize> {
    /// The set `{0, 1, .., n - 1}` of all covariate indices
    #[must_use]
    pub fn all(n: usize) -> Self {
        Self {
            items: (0..n).collect(),
        }
    }

    /// Render the set with covariate names instead of indices
    #[must_use]
    pub fn display_with(&self, names: &[String]) -> String {
        let rendered = self
            .items
            .iter()
            .map(|&idx| names.get(idx).map_or("?", String::as_str))
            .join(", ");
        format!("{{{rendered}}}")
    }
}

impl<T: Ord> FromIterator<T> for CovariateSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a, T> IntoIterator for &'a CovariateSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// Smaller sets first, then lexicographic; this is the scan order of the
// active frontier and therefore the tie-break order of the oracle.
impl<T: Ord> Ord for CovariateSet<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.items
            .len()
            .cmp(&other.items.len())
            .then_with(|| self.items.as_slice().cmp(other.items.as_slice()))
    }
}

impl<T: Ord> PartialOrd for CovariateSet<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: fmt::Display> fmt::Display for CovariateSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.items.iter().join(", "))
    }
}
