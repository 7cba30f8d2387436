//! Treatment-effect estimates from a matching result
//!
//! These queries only read the groups of a finished run and the outcomes of
//! the matching table.

use super::types::{MatchGroup, MatchingResult};
use crate::data::{UnitId, UnitTable};

/// Group in which `unit` was first matched
#[must_use]
pub fn main_group(result: &MatchingResult, unit: UnitId) -> Option<&MatchGroup> {
    result.main_group_of(unit)
}

/// Every group containing `unit`, in creation order
#[must_use]
pub fn groups_of(result: &MatchingResult, unit: UnitId) -> Vec<&MatchGroup> {
    result.groups.iter().filter(|g| g.contains(unit)).collect()
}

fn mean_outcome(table: &UnitTable, units: &[UnitId]) -> Option<f64> {
    if units.is_empty() {
        return None;
    }
    let mut total = 0.0;
    for &unit in units {
        total += table.outcome(table.row_of(unit)?);
    }
    Some(total / units.len() as f64)
}

/// Conditional average treatment effect of a group
///
/// Mean treated outcome minus mean control outcome.
#[must_use]
pub fn cate_of_group(table: &UnitTable, group: &MatchGroup) -> Option<f64> {
    Some(mean_outcome(table, &group.treated)? - mean_outcome(table, &group.control)?)
}

/// CATE of the group `unit` was first matched in
#[must_use]
pub fn cate_of_unit(table: &UnitTable, result: &MatchingResult, unit: UnitId) -> Option<f64> {
    cate_of_group(table, main_group(result, unit)?)
}

fn weighted_effect(
    table: &UnitTable,
    result: &MatchingResult,
    weight: impl Fn(&MatchGroup) -> usize,
) -> Option<f64> {
    let mut numerator = 0.0;
    let mut denominator = 0usize;
    for group in &result.groups {
        let w = weight(group);
        numerator += w as f64 * cate_of_group(table, group)?;
        denominator += w;
    }
    (denominator > 0).then(|| numerator / denominator as f64)
}

/// Average treatment effect: group CATEs weighted by group size
#[must_use]
pub fn ate(table: &UnitTable, result: &MatchingResult) -> Option<f64> {
    weighted_effect(table, result, MatchGroup::len)
}

/// Average treatment effect on the treated: group CATEs weighted by the
/// number of treated members
#[must_use]
pub fn att(table: &UnitTable, result: &MatchingResult) -> Option<f64> {
    weighted_effect(table, result, |g| g.treated.len())
}
