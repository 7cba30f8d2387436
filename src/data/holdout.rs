//! Holdout provisioning
//!
//! The holdout table is only used to fit the outcome models behind the
//! predictive error. When no holdout is supplied, a seeded random fraction
//! of the input is split off and the rest is matched.

use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::table::UnitTable;
use crate::error::{MatchingError, Result};

/// Split `table` into `(matching, holdout)` tables
///
/// # Arguments
/// * `table` - Input units
/// * `fraction` - Share of units placed in the holdout, in (0, 1)
/// * `seed` - Seed of the shuffle, so the split is reproducible
///
/// # Returns
/// Disjoint matching and holdout tables; both keep the original unit ids
pub fn split_holdout(
    table: &UnitTable,
    fraction: f64,
    seed: u64,
) -> Result<(UnitTable, UnitTable)> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(MatchingError::config(format!(
            "Holdout fraction must be in (0, 1), got {fraction}"
        )));
    }

    let n = table.num_units();
    let holdout_size = ((n as f64) * fraction).round() as usize;
    if holdout_size == 0 || holdout_size >= n {
        return Err(MatchingError::config(format!(
            "Holdout fraction {fraction} of {n} units leaves an empty matching or holdout table"
        )));
    }

    let mut rows: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    rows.shuffle(&mut rng);

    let (holdout_rows, matching_rows) = rows.split_at(holdout_size);
    let mut holdout_rows = holdout_rows.to_vec();
    let mut matching_rows = matching_rows.to_vec();
    // Keep input order inside each part
    holdout_rows.sort_unstable();
    matching_rows.sort_unstable();

    info!(
        "Split {n} units into {} for matching and {} for holdout",
        matching_rows.len(),
        holdout_rows.len()
    );

    Ok((
        table.select_rows(&matching_rows)?,
        table.select_rows(&holdout_rows)?,
    ))
}
