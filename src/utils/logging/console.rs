//! Console output utilities
//!
//! This module provides utilities for formatted console output.

use crate::algorithm::matching::MatchingResult;

/// Print summary information about a matching result
pub fn print_result_summary(result: &MatchingResult) {
    print!("{result}");
    println!(
        "Unmatched units: {}",
        result.unit_ids.len() - result.matched_count()
    );
}

/// Print the first `num_groups` groups with their value tuples
pub fn print_groups(result: &MatchingResult, num_groups: usize) {
    println!("First {num_groups} groups:");
    for group in result.groups.iter().take(num_groups) {
        println!(
            "Group {} (round {}): values {} treated {:?} control {:?}",
            group.id,
            group.round,
            group.values_display(),
            group.treated,
            group.control
        );
    }
}
