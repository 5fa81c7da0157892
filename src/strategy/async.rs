//! Asynchronous processing strategy
//!
//! This module provides an asynchronous, multi-threaded implementation of the
//! ProcessingStrategy trait. Statements are read and reconciled concurrently.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent)
//!     ├── AsyncReader (one read task per statement)
//!     ├── LedgerNormalizer
//!     └── LedgerBatchProcessor (one reconcile task per ledger)
//!         └── Arc<ReconciliationEngine>
//! ```
//!
//! # Concurrency
//!
//! Inputs are processed in chunks of `max_concurrent` statements: all reads of
//! a chunk run concurrently, then the chunk is reconciled concurrently. Results
//! are keyed by input position, so output order never depends on scheduling.

use crate::core::{
    LedgerBatchProcessor, LedgerJob, ReconcileConfig, Reconciliation, ReconciliationEngine,
};
use crate::io::{AsyncReader, LedgerNormalizer, ReaderConfig};
use crate::strategy::{write_output, ProcessingStrategy};
use crate::types::{ReconcileError, RunDiagnostics};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for concurrent processing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Rows pulled from a statement per read
    pub batch_size: usize,
    /// Maximum number of statements in flight, also the worker thread count
    pub max_concurrent: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig with custom values
    ///
    /// Zero values fall back to the defaults with a warning.
    pub fn new(batch_size: usize, max_concurrent: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            tracing::warn!(
                "Invalid batch_size ({}), using default ({})",
                batch_size,
                default.batch_size
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent = if max_concurrent == 0 {
            tracing::warn!(
                "Invalid max_concurrent ({}), using default ({})",
                max_concurrent,
                default.max_concurrent
            );
            default.max_concurrent
        } else {
            max_concurrent
        };

        Self {
            batch_size,
            max_concurrent,
        }
    }
}

/// Asynchronous processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    engine: Arc<ReconciliationEngine>,
    reader_config: Arc<ReaderConfig>,
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(
        reconcile_config: ReconcileConfig,
        reader_config: ReaderConfig,
        config: BatchConfig,
    ) -> Self {
        Self {
            engine: Arc::new(ReconciliationEngine::new(reconcile_config)),
            reader_config: Arc::new(reader_config),
            config,
        }
    }

    async fn reconcile_all(
        &self,
        inputs: &[PathBuf],
    ) -> Result<Reconciliation, ReconcileError> {
        let processor = LedgerBatchProcessor::new(Arc::clone(&self.engine));

        for (chunk_index, chunk) in inputs.chunks(self.config.max_concurrent).enumerate() {
            let offset = chunk_index * self.config.max_concurrent;

            let mut reads = Vec::with_capacity(chunk.len());
            for (i, path) in chunk.iter().enumerate() {
                let path = path.clone();
                let reader_config = Arc::clone(&self.reader_config);
                let batch_size = self.config.batch_size;
                reads.push(tokio::spawn(async move {
                    read_ledger(offset + i, &path, &reader_config, batch_size).await
                }));
            }

            // Awaited in input order: the first failing statement is reported.
            let mut jobs = Vec::with_capacity(reads.len());
            for read in reads {
                let job = read.await.map_err(ReconcileError::task_failed)??;
                jobs.push(job);
            }

            processor.process_batch(jobs).await?;
        }

        Ok(processor.drain_in_order(inputs.len()))
    }
}

async fn read_ledger(
    position: usize,
    path: &Path,
    config: &ReaderConfig,
    batch_size: usize,
) -> Result<LedgerJob, ReconcileError> {
    let statement = AsyncReader::open(path, config)
        .await?
        .read_statement(batch_size)
        .await?;
    let ledger = LedgerNormalizer::new(config.date_format.clone()).normalize(statement);

    tracing::info!(
        path = %path.display(),
        entries = ledger.entries.len(),
        operations = ledger.operations.len(),
        "Ledger read"
    );

    Ok(LedgerJob {
        position,
        entries: ledger.entries,
        operations: ledger.operations,
        diagnostics: ledger.diagnostics,
    })
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(
        &self,
        inputs: &[PathBuf],
        output: &mut dyn Write,
    ) -> Result<RunDiagnostics, ReconcileError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent)
            .build()?;

        let combined = runtime.block_on(self.reconcile_all(inputs))?;

        write_output(combined, output)
    }
}
