//! Core matching algorithm implementation
//!
//! This module implements the Matcher struct which validates inputs,
//! provisions the holdout table and drives a [`MatchingSession`] to the end.

use arrow::record_batch::RecordBatch;
use log::info;

use crate::algorithm::matching::grouping::{GroupingBackend, HashGrouper};
use crate::algorithm::matching::session::MatchingSession;
use crate::algorithm::matching::types::MatchingResult;
use crate::config::MatchingConfig;
use crate::data::{RawTable, UnitTable, raw_table_from_batch, split_holdout};
use crate::error::{MatchingError, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Matcher running DAME or FLAME over unit tables
#[derive(Debug)]
pub struct Matcher {
    /// Matching configuration
    config: MatchingConfig,
    /// Grouping backend
    backend: Box<dyn GroupingBackend>,
}

impl Matcher {
    /// Create a new matcher with the given configuration
    #[must_use]
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            config,
            backend: Box::new(HashGrouper),
        }
    }

    /// Replace the grouping backend
    #[must_use]
    pub fn with_backend(mut self, backend: impl GroupingBackend + 'static) -> Self {
        self.backend = Box::new(backend);
        self
    }

    /// The configuration in use
    #[must_use]
    pub const fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Check the configuration and both tables before matching
    ///
    /// # Arguments
    /// * `table` - Matching table
    /// * `holdout` - Table used to fit outcome models
    pub fn validate_inputs(&self, table: &UnitTable, holdout: &UnitTable) -> Result<()> {
        self.config.validate(table.num_covariates())?;

        if table.treated_count() == 0 || table.control_count() == 0 {
            return Err(MatchingError::table(format!(
                "Matching table needs treated and control units, got {} treated and {} control",
                table.treated_count(),
                table.control_count()
            )));
        }
        if holdout.covariate_names() != table.covariate_names() {
            return Err(MatchingError::Schema(format!(
                "Holdout covariates {:?} differ from matching covariates {:?}",
                holdout.covariate_names(),
                table.covariate_names()
            )));
        }
        if self.config.drop_selection.uses_model()
            && (holdout.treated_count() == 0 || holdout.control_count() == 0)
        {
            return Err(MatchingError::table(
                "Holdout table needs treated and control units to fit outcome models",
            ));
        }
        Ok(())
    }

    /// Start a stepping session over validated inputs
    pub fn session<'a>(
        &'a self,
        table: &'a UnitTable,
        holdout: &'a UnitTable,
    ) -> Result<MatchingSession<'a>> {
        self.validate_inputs(table, holdout)?;
        MatchingSession::new(&self.config, table, holdout, self.backend.as_ref())
    }

    /// Perform matching on `table`
    ///
    /// # Arguments
    ///
    /// * `table` - Units to match
    /// * `holdout` - Units used to fit outcome models. When `None` and the
    ///   drop selection needs a model, a seeded fraction of `table` is split
    ///   off as holdout and only the rest is matched.
    ///
    /// # Returns
    ///
    /// Groups, weights, trace and halt reason of the run
    pub fn perform_matching(
        &self,
        table: &UnitTable,
        holdout: Option<&UnitTable>,
    ) -> Result<MatchingResult> {
        match holdout {
            Some(holdout) => self.run(table, holdout),
            None if self.config.drop_selection.uses_model() => {
                log_warning(
                    "No holdout table given, splitting off a fraction of the matching table",
                    Some(&self.config.holdout_fraction),
                );
                let (matching, holdout) =
                    split_holdout(table, self.config.holdout_fraction, self.config.seed)?;
                self.run(&matching, &holdout)
            }
            None => self.run(table, table),
        }
    }

    /// Perform matching on tables whose covariate cells may be missing
    ///
    /// The matching table is resolved with `missing_data` and the holdout
    /// with `missing_holdout`. Without a holdout, the split happens after
    /// resolving with `missing_data`.
    pub fn perform_matching_raw(
        &self,
        table: RawTable,
        holdout: Option<RawTable>,
    ) -> Result<MatchingResult> {
        let matching = table.into_unit_table(self.config.missing_data)?;
        match holdout {
            Some(raw) => {
                let holdout = raw.into_unit_table(self.config.missing_holdout)?;
                self.perform_matching(&matching, Some(&holdout))
            }
            None => self.perform_matching(&matching, None),
        }
    }

    /// Perform matching on Arrow record batches
    ///
    /// Column roles are taken from the configuration.
    pub fn perform_matching_batch(
        &self,
        batch: &RecordBatch,
        holdout: Option<&RecordBatch>,
    ) -> Result<MatchingResult> {
        let table = raw_table_from_batch(batch, &self.config)?;
        let holdout = holdout
            .map(|b| raw_table_from_batch(b, &self.config))
            .transpose()?;
        self.perform_matching_raw(table, holdout)
    }

    fn run(&self, table: &UnitTable, holdout: &UnitTable) -> Result<MatchingResult> {
        let subject = format!(
            "{} units ({} treated) on {} covariates",
            table.num_units(),
            table.treated_count(),
            table.num_covariates()
        );
        log_operation_start(&format!("{} matching", self.config.algorithm), &subject);
        info!("{}", self.config);

        let result = self.session(table, holdout)?.into_result();

        log_operation_complete(
            "matched",
            &subject,
            result.matched_count(),
            Some(result.matching_time),
        );
        info!(
            "Matching complete: {} groups, stopped because {}",
            result.groups.len(),
            result.stop_reason
        );
        Ok(result)
    }
}
