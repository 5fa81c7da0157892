//! Processing strategy module for ledger reconciliation
//!
//! This module defines the Strategy pattern for complete reconciliation
//! pipelines, encompassing statement reading, normalization, the engine and
//! the export. This allows different implementations (synchronous,
//! asynchronous) to be selected at runtime. Both produce byte-identical output
//! for the same inputs.

use crate::cli::StrategyType;
use crate::core::{Reconciliation, ReconcileConfig};
use crate::io::{write_records_csv, ReaderConfig};
use crate::types::{ReconcileError, RunDiagnostics};
use std::io::Write;
use std::path::PathBuf;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete reconciliation pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Reconcile every input statement and write the export to `output`
    ///
    /// Statements are independent ledgers. Their records appear in the
    /// export in input order, under a single header.
    ///
    /// # Returns
    ///
    /// The combined diagnostics of all statements. Dropped rows, unmatched
    /// legs and unattributed fees are reported there and never fail the run.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement cannot be opened or read, lacks a
    /// required column, or if the output cannot be written. Nothing is
    /// written to `output` in that case.
    fn process(
        &self,
        inputs: &[PathBuf],
        output: &mut dyn Write,
    ) -> Result<RunDiagnostics, ReconcileError>;
}

/// Create a processing strategy based on the specified strategy type
///
/// `batch_config` is ignored by the synchronous strategy.
pub fn create_strategy(
    strategy_type: StrategyType,
    reconcile_config: ReconcileConfig,
    reader_config: ReaderConfig,
    batch_config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(reconcile_config, reader_config)),
        StrategyType::Async => Box::new(AsyncProcessingStrategy::new(
            reconcile_config,
            reader_config,
            batch_config.unwrap_or_default(),
        )),
    }
}

/// Render the export in memory, then write it in one go
pub(crate) fn write_output(
    reconciliation: Reconciliation,
    output: &mut dyn Write,
) -> Result<RunDiagnostics, ReconcileError> {
    let mut rendered = Vec::new();
    write_records_csv(&reconciliation.records, &mut rendered)?;

    output.write_all(&rendered).map_err(ReconcileError::output)?;
    output.flush().map_err(ReconcileError::output)?;

    let diagnostics = reconciliation.diagnostics;
    tracing::info!(
        records = reconciliation.records.len(),
        invalid_timestamps = diagnostics.invalid_timestamps,
        invalid_quantities = diagnostics.invalid_quantities,
        unrecognized = diagnostics.unrecognized.len(),
        unmatched_executions = diagnostics.unmatched_executions.len(),
        unattributed_fees = diagnostics.unattributed_fees,
        shared_fee_attributions = diagnostics.shared_fee_attributions,
        "Reconciliation complete"
    );

    Ok(diagnostics)
}
