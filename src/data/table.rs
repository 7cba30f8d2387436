//! Unit table used by the matching engine
//!
//! Covariates are stored column-major (one contiguous `Vec<u32>` per
//! covariate) so that the grouper can walk a subset of columns without
//! touching the others.

use rustc_hash::FxHashMap;

use crate::error::{MatchingError, Result};

/// Identifier of a unit (row) in the input data
pub type UnitId = u64;

/// Validated table of units with discrete covariates
#[derive(Debug, Clone)]
pub struct UnitTable {
    ids: Vec<UnitId>,
    covariate_names: Vec<String>,
    columns: Vec<Vec<u32>>,
    maxima: Vec<u32>,
    treated: Vec<bool>,
    outcomes: Vec<f64>,
    index: FxHashMap<UnitId, usize>,
}

impl UnitTable {
    /// Create a new unit table from column data
    ///
    /// # Arguments
    /// * `ids` - Unique unit identifiers, one per row
    /// * `covariate_names` - Names of the covariate columns
    /// * `columns` - Covariate codes, one vector per covariate
    /// * `treatment` - Treatment indicator per row (0 or 1)
    /// * `outcomes` - Real-valued outcome per row
    ///
    /// # Returns
    /// The table, or an error if lengths disagree, ids repeat, a treatment
    /// value is not binary or an outcome is not finite
    pub fn new(
        ids: Vec<UnitId>,
        covariate_names: Vec<String>,
        columns: Vec<Vec<u32>>,
        treatment: Vec<u8>,
        outcomes: Vec<f64>,
    ) -> Result<Self> {
        let n = ids.len();

        if covariate_names.len() != columns.len() {
            return Err(MatchingError::table(format!(
                "{} covariate names given for {} covariate columns",
                covariate_names.len(),
                columns.len()
            )));
        }
        if treatment.len() != n || outcomes.len() != n {
            return Err(MatchingError::table(format!(
                "Column lengths differ: {n} ids, {} treatment values, {} outcomes",
                treatment.len(),
                outcomes.len()
            )));
        }
        for (name, column) in covariate_names.iter().zip(&columns) {
            if column.len() != n {
                return Err(MatchingError::table(format!(
                    "Covariate '{name}' has {} values, expected {n}",
                    column.len()
                )));
            }
        }

        let mut seen = FxHashMap::default();
        seen.reserve(n);
        for (row, &id) in ids.iter().enumerate() {
            if seen.insert(id, row).is_some() {
                return Err(MatchingError::table(format!("Duplicate unit id {id}")));
            }
        }

        let mut treated = Vec::with_capacity(n);
        for (row, &t) in treatment.iter().enumerate() {
            match t {
                0 => treated.push(false),
                1 => treated.push(true),
                other => {
                    return Err(MatchingError::table(format!(
                        "Treatment value {other} at row {row} is not 0 or 1"
                    )));
                }
            }
        }

        if let Some(row) = outcomes.iter().position(|y| !y.is_finite()) {
            return Err(MatchingError::table(format!(
                "Outcome at row {row} is not finite"
            )));
        }

        let maxima = columns
            .iter()
            .map(|column| column.iter().copied().max().unwrap_or(0))
            .collect();

        Ok(Self {
            ids,
            covariate_names,
            columns,
            maxima,
            treated,
            outcomes,
            index: seen,
        })
    }

    /// Build a table from rows of `(covariates, treatment, outcome)`
    ///
    /// Unit ids are assigned from the row position, starting at 0.
    pub fn from_rows<I>(covariate_names: Vec<String>, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Vec<u32>, u8, f64)>,
    {
        let width = covariate_names.len();
        let mut columns = vec![Vec::new(); width];
        let mut treatment = Vec::new();
        let mut outcomes = Vec::new();

        for (row, (values, t, y)) in rows.into_iter().enumerate() {
            if values.len() != width {
                return Err(MatchingError::table(format!(
                    "Row {row} has {} covariates, expected {width}",
                    values.len()
                )));
            }
            for (column, value) in columns.iter_mut().zip(values) {
                column.push(value);
            }
            treatment.push(t);
            outcomes.push(y);
        }

        let ids = (0..treatment.len() as UnitId).collect();
        Self::new(ids, covariate_names, columns, treatment, outcomes)
    }

    /// Number of units
    #[must_use]
    pub fn num_units(&self) -> usize {
        self.ids.len()
    }

    /// Check if the table has no units
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Number of covariate columns
    #[must_use]
    pub fn num_covariates(&self) -> usize {
        self.columns.len()
    }

    /// Covariate names in column order
    #[must_use]
    pub fn covariate_names(&self) -> &[String] {
        &self.covariate_names
    }

    /// Position of a covariate by name
    #[must_use]
    pub fn covariate_index(&self, name: &str) -> Option<usize> {
        self.covariate_names.iter().position(|n| n == name)
    }

    /// Unit ids in row order
    #[must_use]
    pub fn ids(&self) -> &[UnitId] {
        &self.ids
    }

    /// Unit id of a row
    #[must_use]
    pub fn id(&self, row: usize) -> UnitId {
        self.ids[row]
    }

    /// Row holding the unit with the given id
    #[must_use]
    pub fn row_of(&self, id: UnitId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    /// All codes of one covariate
    #[must_use]
    pub fn column(&self, covariate: usize) -> &[u32] {
        &self.columns[covariate]
    }

    /// Covariate code of a single cell
    #[must_use]
    pub fn value(&self, row: usize, covariate: usize) -> u32 {
        self.columns[covariate][row]
    }

    /// Largest code of each covariate
    #[must_use]
    pub fn maxima(&self) -> &[u32] {
        &self.maxima
    }

    /// Whether the unit in `row` is treated
    #[must_use]
    pub fn is_treated(&self, row: usize) -> bool {
        self.treated[row]
    }

    /// Outcome of the unit in `row`
    #[must_use]
    pub fn outcome(&self, row: usize) -> f64 {
        self.outcomes[row]
    }

    /// Number of treated units
    #[must_use]
    pub fn treated_count(&self) -> usize {
        self.treated.iter().filter(|&&t| t).count()
    }

    /// Number of control units
    #[must_use]
    pub fn control_count(&self) -> usize {
        self.num_units() - self.treated_count()
    }

    /// Rows of treated units
    #[must_use]
    pub fn treated_rows(&self) -> Vec<usize> {
        (0..self.num_units()).filter(|&r| self.treated[r]).collect()
    }

    /// Rows of control units
    #[must_use]
    pub fn control_rows(&self) -> Vec<usize> {
        (0..self.num_units()).filter(|&r| !self.treated[r]).collect()
    }

    /// New table containing only the given rows, in the given order
    ///
    /// Unit ids are preserved. Covariate maxima are recomputed from the
    /// retained rows.
    pub fn select_rows(&self, rows: &[usize]) -> Result<Self> {
        let ids = rows.iter().map(|&r| self.ids[r]).collect();
        let columns = self
            .columns
            .iter()
            .map(|column| rows.iter().map(|&r| column[r]).collect())
            .collect();
        let treatment = rows.iter().map(|&r| u8::from(self.treated[r])).collect();
        let outcomes = rows.iter().map(|&r| self.outcomes[r]).collect();
        Self::new(
            ids,
            self.covariate_names.clone(),
            columns,
            treatment,
            outcomes,
        )
    }
}
