//! Synchronous processing strategy
//!
//! This module provides a synchronous, single-threaded implementation of the
//! ProcessingStrategy trait. It reads the statements one after the other.
//!
//! # Design
//!
//! The SyncProcessingStrategy focuses on orchestration, delegating:
//! - CSV parsing to `SyncReader` (header search, then iterator interface)
//! - Row parsing and ordering to `LedgerNormalizer`
//! - Pairing and assembly to `ReconciliationEngine`
//! - CSV output to `csv_format::write_records_csv`

use crate::core::{Reconciliation, ReconcileConfig, ReconciliationEngine};
use crate::io::{LedgerNormalizer, ReaderConfig, SyncReader};
use crate::strategy::{write_output, ProcessingStrategy};
use crate::types::{ReconcileError, RunDiagnostics};
use std::io::Write;
use std::path::PathBuf;

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use ledger_reconciler::core::ReconcileConfig;
/// use ledger_reconciler::io::ReaderConfig;
/// use ledger_reconciler::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::PathBuf;
///
/// let strategy = SyncProcessingStrategy::new(ReconcileConfig::default(), ReaderConfig::default());
/// let mut output = std::io::stdout();
///
/// strategy
///     .process(&[PathBuf::from("statement.csv")], &mut output)
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SyncProcessingStrategy {
    engine: ReconciliationEngine,
    reader_config: ReaderConfig,
}

impl SyncProcessingStrategy {
    pub fn new(reconcile_config: ReconcileConfig, reader_config: ReaderConfig) -> Self {
        Self {
            engine: ReconciliationEngine::new(reconcile_config),
            reader_config,
        }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(
        &self,
        inputs: &[PathBuf],
        output: &mut dyn Write,
    ) -> Result<RunDiagnostics, ReconcileError> {
        let normalizer = LedgerNormalizer::new(self.reader_config.date_format.clone());
        let mut combined = Reconciliation::default();

        for path in inputs {
            let statement = SyncReader::open(path, &self.reader_config)?.read_statement()?;
            let ledger = normalizer.normalize(statement);

            tracing::info!(
                path = %path.display(),
                entries = ledger.entries.len(),
                operations = ledger.operations.len(),
                "Ledger read"
            );

            combined.merge(Reconciliation {
                records: Vec::new(),
                diagnostics: ledger.diagnostics,
            });
            combined.merge(self.engine.reconcile(ledger.entries));
            combined.merge(self.engine.reconcile_settled(ledger.operations));
        }

        write_output(combined, output)
    }
}
