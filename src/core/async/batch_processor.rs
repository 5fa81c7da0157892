//! Concurrent reconciliation of independent ledgers
//!
//! This module provides the `LedgerBatchProcessor`, which reconciles a batch
//! of ledgers concurrently, one tokio task per ledger.
//!
//! # Design
//!
//! Ledgers share nothing, so they need no partitioning and no ordering
//! between tasks. Every task runs the shared engine over its own ledger and
//! stores the result in a `DashMap` keyed by the ledger's input position.
//! Results are drained in position order, which makes the combined output
//! independent of task scheduling.
//!
//! # Architecture
//!
//! ```text
//! LedgerBatchProcessor
//!     ├── Arc<ReconciliationEngine>             (shared, immutable)
//!     └── Arc<DashMap<usize, Reconciliation>>  (results by input position)
//! ```

use std::sync::Arc;

use dashmap::DashMap;

use crate::core::engine::{Reconciliation, ReconciliationEngine};
use crate::types::{LedgerEntry, ReconcileError, RunDiagnostics, SettledOperation};

/// One normalized ledger waiting to be reconciled
#[derive(Debug, Clone, Default)]
pub struct LedgerJob {
    /// Position of the ledger in the input list
    pub position: usize,
    /// Normalized entries
    pub entries: Vec<LedgerEntry>,
    /// Settled operations, for statements in the settlement layout
    pub operations: Vec<SettledOperation>,
    /// Rows dropped while reading the ledger
    pub diagnostics: RunDiagnostics,
}

/// Batch processor reconciling ledgers concurrently
///
/// Cloning is cheap; clones share the engine and the result store.
#[derive(Debug, Clone)]
pub struct LedgerBatchProcessor {
    engine: Arc<ReconciliationEngine>,
    results: Arc<DashMap<usize, Reconciliation>>,
}

impl LedgerBatchProcessor {
    /// Create a processor around a shared engine
    pub fn new(engine: Arc<ReconciliationEngine>) -> Self {
        Self {
            engine,
            results: Arc::new(DashMap::new()),
        }
    }

    /// Reconcile one ledger and store the result under its position
    ///
    /// Read diagnostics come first in the stored result, followed by the
    /// diagnostics of the reconciliation itself.
    pub fn reconcile_job(&self, job: LedgerJob) {
        let mut reconciliation = Reconciliation {
            records: Vec::new(),
            diagnostics: job.diagnostics,
        };
        reconciliation.merge(self.engine.reconcile(job.entries));
        reconciliation.merge(self.engine.reconcile_settled(job.operations));

        if self.results.insert(job.position, reconciliation).is_some() {
            tracing::warn!(
                position = job.position,
                "Ledger reconciled twice, keeping the latest result"
            );
        }
    }

    /// Reconcile a batch of ledgers, one task per ledger
    ///
    /// Waits for every task. A panicked task fails the batch.
    pub async fn process_batch(&self, batch: Vec<LedgerJob>) -> Result<(), ReconcileError> {
        let mut tasks = Vec::with_capacity(batch.len());
        for job in batch {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move { processor.reconcile_job(job) }));
        }

        for task in tasks {
            task.await.map_err(|e| {
                tracing::error!("Ledger task failed: {}", e);
                ReconcileError::task_failed(e)
            })?;
        }

        Ok(())
    }

    /// Drain the results for positions `0..count`, in position order
    ///
    /// Positions without a result are skipped.
    pub fn drain_in_order(&self, count: usize) -> Reconciliation {
        let mut combined = Reconciliation::default();
        for position in 0..count {
            if let Some((_, reconciliation)) = self.results.remove(&position) {
                combined.merge(reconciliation);
            }
        }
        combined
    }
}
