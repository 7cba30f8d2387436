//! Unit tables and the adapters that build them
//!
//! This module contains the validated [`UnitTable`] consumed by the matching
//! engine, plus the input-side helpers around it: missing-data resolution,
//! Arrow conversion, holdout splitting and synthetic data.

pub mod batch;
pub mod holdout;
pub mod missing;
pub mod synthetic;
pub mod table;

pub use batch::{raw_table_from_batch, unit_table_from_batch};
pub use holdout::split_holdout;
pub use missing::{MissingDataPolicy, RawTable};
pub use synthetic::{UniformDataSpec, generate_uniform_given_importance};
pub use table::{UnitId, UnitTable};
