//! Conversion from Arrow record batches
//!
//! Every column other than the treatment, outcome and (optional) id column
//! is read as a covariate. Columns are cast with Arrow's cast kernel in
//! strict mode, so values that cannot be represented fail instead of turning
//! into nulls, and float columns must hold whole numbers to be read as codes.
//! Nulls in covariate columns become missing cells.

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::{CastOptions, cast_with_options};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;
use log::debug;

use super::missing::{MissingDataPolicy, RawTable};
use super::table::{UnitId, UnitTable};
use crate::config::MatchingConfig;
use crate::error::{MatchingError, Result};

/// Read a record batch into a [`RawTable`]
///
/// # Arguments
/// * `batch` - Input batch
/// * `config` - Supplies the treatment, outcome and id column names
///
/// # Returns
/// The raw table, or an error if a required column is absent or a value is
/// out of range
pub fn raw_table_from_batch(batch: &RecordBatch, config: &MatchingConfig) -> Result<RawTable> {
    let schema = batch.schema();

    let treatment_idx = schema.index_of(&config.treatment_column).map_err(|_| {
        MatchingError::Schema(format!(
            "Treatment column '{}' not found",
            config.treatment_column
        ))
    })?;
    let outcome_idx = schema.index_of(&config.outcome_column).map_err(|_| {
        MatchingError::Schema(format!(
            "Outcome column '{}' not found",
            config.outcome_column
        ))
    })?;
    let id_idx = match &config.id_column {
        Some(name) => Some(schema.index_of(name).map_err(|_| {
            MatchingError::Schema(format!("Id column '{name}' not found"))
        })?),
        None => None,
    };

    let covariate_indices: Vec<usize> = (0..schema.fields().len())
        .filter(|&i| i != treatment_idx && i != outcome_idx && Some(i) != id_idx)
        .collect();
    let covariate_names = covariate_indices
        .iter()
        .map(|&i| schema.field(i).name().clone())
        .collect();

    debug!(
        "Reading {} rows with {} covariates from record batch",
        batch.num_rows(),
        covariate_indices.len()
    );

    let treatment = read_treatment(batch, treatment_idx, &config.treatment_column)?;
    let outcomes = read_outcomes(batch, outcome_idx, &config.outcome_column)?;
    let ids = match id_idx {
        Some(idx) => read_ids(batch, idx)?,
        None => (0..batch.num_rows() as UnitId).collect(),
    };

    let mut columns = Vec::with_capacity(covariate_indices.len());
    for &idx in &covariate_indices {
        columns.push(read_covariate(batch, idx)?);
    }

    Ok(RawTable {
        ids,
        covariate_names,
        columns,
        treatment,
        outcomes,
    })
}

/// Read a record batch into a [`UnitTable`], resolving missing cells with
/// `policy`
pub fn unit_table_from_batch(
    batch: &RecordBatch,
    config: &MatchingConfig,
    policy: MissingDataPolicy,
) -> Result<UnitTable> {
    raw_table_from_batch(batch, config)?.into_unit_table(policy)
}

fn column_name(batch: &RecordBatch, idx: usize) -> String {
    batch.schema().field(idx).name().clone()
}

fn strict_cast(array: &ArrayRef, to: &DataType) -> Result<ArrayRef> {
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    Ok(cast_with_options(array, to, &options)?)
}

/// Cast a column holding integer codes to `Int64`
///
/// Float columns are accepted only when every value is a whole number.
fn integer_column(batch: &RecordBatch, idx: usize) -> Result<ArrayRef> {
    let column = batch.column(idx);
    if column.data_type().is_floating() {
        let floats = strict_cast(column, &DataType::Float64)?;
        let floats = floats.as_primitive::<Float64Type>();
        let fractional = |row: usize| floats.is_valid(row) && floats.value(row).fract() != 0.0;
        if let Some(row) = (0..floats.len()).find(|&row| fractional(row)) {
            return Err(MatchingError::table(format!(
                "Column '{}' has non-integer value {} at row {row}",
                column_name(batch, idx),
                floats.value(row)
            )));
        }
    }
    strict_cast(column, &DataType::Int64)
}

fn read_covariate(batch: &RecordBatch, idx: usize) -> Result<Vec<Option<u32>>> {
    let casted = integer_column(batch, idx)?;
    let values = casted.as_primitive::<Int64Type>();

    (0..values.len())
        .map(|row| {
            if values.is_null(row) {
                return Ok(None);
            }
            let value = values.value(row);
            u32::try_from(value).map(Some).map_err(|_| {
                MatchingError::table(format!(
                    "Covariate '{}' has value {value} at row {row}; codes must be non-negative 32-bit integers",
                    column_name(batch, idx)
                ))
            })
        })
        .collect()
}

fn read_treatment(batch: &RecordBatch, idx: usize, name: &str) -> Result<Vec<u8>> {
    let casted = integer_column(batch, idx)?;
    let values = casted.as_primitive::<Int64Type>();

    (0..values.len())
        .map(|row| {
            if values.is_null(row) {
                return Err(MatchingError::table(format!(
                    "Treatment column '{name}' is null at row {row}"
                )));
            }
            match values.value(row) {
                0 => Ok(0),
                1 => Ok(1),
                other => Err(MatchingError::table(format!(
                    "Treatment value {other} at row {row} is not 0 or 1"
                ))),
            }
        })
        .collect()
}

fn read_outcomes(batch: &RecordBatch, idx: usize, name: &str) -> Result<Vec<f64>> {
    let casted = strict_cast(batch.column(idx), &DataType::Float64)?;
    let values = casted.as_primitive::<Float64Type>();

    (0..values.len())
        .map(|row| {
            if values.is_null(row) {
                Err(MatchingError::table(format!(
                    "Outcome column '{name}' is null at row {row}"
                )))
            } else {
                Ok(values.value(row))
            }
        })
        .collect()
}

fn read_ids(batch: &RecordBatch, idx: usize) -> Result<Vec<UnitId>> {
    let casted = integer_column(batch, idx)?;
    let values = casted.as_primitive::<Int64Type>();

    (0..values.len())
        .map(|row| {
            if values.is_null(row) {
                return Err(MatchingError::table(format!("Unit id is null at row {row}")));
            }
            UnitId::try_from(values.value(row)).map_err(|_| {
                MatchingError::table(format!(
                    "Unit id {} at row {row} is negative",
                    values.value(row)
                ))
            })
        })
        .collect()
}
