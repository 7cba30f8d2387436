//! Missing-data handling for covariate cells
//!
//! Input adapters produce a [`RawTable`] whose covariate cells may be
//! missing. A [`MissingDataPolicy`] turns it into a [`UnitTable`] in which
//! every cell holds a code.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::table::{UnitId, UnitTable};
use crate::error::{MatchingError, Result};

/// What to do with missing covariate cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDataPolicy {
    /// Fail on the first missing cell
    #[default]
    Reject,
    /// Drop every row with at least one missing cell
    DropRows,
    /// Give every missing cell a fresh code above the column maximum, so the
    /// unit can never match on that covariate
    NeverMatch,
}

/// Unit data whose covariate cells may be missing
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Unit identifiers
    pub ids: Vec<UnitId>,
    /// Covariate names in column order
    pub covariate_names: Vec<String>,
    /// Covariate cells, one vector per covariate; `None` marks a missing cell
    pub columns: Vec<Vec<Option<u32>>>,
    /// Treatment indicator per row
    pub treatment: Vec<u8>,
    /// Outcome per row
    pub outcomes: Vec<f64>,
}

impl RawTable {
    /// Number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.ids.len()
    }

    /// Number of missing covariate cells
    #[must_use]
    pub fn missing_cells(&self) -> usize {
        self.columns
            .iter()
            .map(|column| column.iter().filter(|cell| cell.is_none()).count())
            .sum()
    }

    /// Resolve missing cells with `policy` and validate the result
    pub fn into_unit_table(self, policy: MissingDataPolicy) -> Result<UnitTable> {
        let missing = self.missing_cells();
        if missing > 0 {
            info!("Resolving {missing} missing covariate cells with policy {policy:?}");
        }

        match policy {
            MissingDataPolicy::Reject => self.reject_missing(),
            MissingDataPolicy::DropRows => self.drop_missing_rows(),
            MissingDataPolicy::NeverMatch => self.replace_with_unique_codes(),
        }
    }

    fn reject_missing(self) -> Result<UnitTable> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for (name, column) in self.covariate_names.iter().zip(self.columns) {
            let mut codes = Vec::with_capacity(column.len());
            for (row, cell) in column.into_iter().enumerate() {
                codes.push(cell.ok_or_else(|| MatchingError::MissingData {
                    column: name.clone(),
                    row,
                })?);
            }
            columns.push(codes);
        }
        UnitTable::new(
            self.ids,
            self.covariate_names,
            columns,
            self.treatment,
            self.outcomes,
        )
    }

    fn drop_missing_rows(self) -> Result<UnitTable> {
        let n = self.num_rows();
        let keep: Vec<usize> = (0..n)
            .filter(|&row| {
                self.columns
                    .iter()
                    .all(|column| column.get(row).is_some_and(Option::is_some))
            })
            .collect();

        if keep.len() < n {
            warn!("Dropping {} of {n} rows with missing covariates", n - keep.len());
        }

        let ids = keep.iter().map(|&r| self.ids[r]).collect();
        let columns = self
            .columns
            .iter()
            .map(|column| keep.iter().filter_map(|&r| column[r]).collect())
            .collect();
        let treatment = keep.iter().filter_map(|&r| self.treatment.get(r).copied()).collect();
        let outcomes = keep.iter().filter_map(|&r| self.outcomes.get(r).copied()).collect();

        UnitTable::new(ids, self.covariate_names, columns, treatment, outcomes)
    }

    fn replace_with_unique_codes(self) -> Result<UnitTable> {
        let mut columns = Vec::with_capacity(self.columns.len());
        for (name, column) in self.covariate_names.iter().zip(self.columns) {
            let max = column.iter().flatten().copied().max().unwrap_or(0);
            let mut next = max;
            let mut codes = Vec::with_capacity(column.len());
            for cell in column {
                match cell {
                    Some(code) => codes.push(code),
                    None => {
                        next = next.checked_add(1).ok_or_else(|| {
                            MatchingError::table(format!(
                                "Too many missing cells in '{name}' to assign unique codes"
                            ))
                        })?;
                        codes.push(next);
                    }
                }
            }
            columns.push(codes);
        }
        UnitTable::new(
            self.ids,
            self.covariate_names,
            columns,
            self.treatment,
            self.outcomes,
        )
    }
}
