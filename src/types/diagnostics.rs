//! Run diagnostics
//!
//! Informational side channel of a reconciliation run. Nothing in here is
//! fatal; it tells the operator what was dropped and why.

use crate::types::{LedgerEntry, ReconcileError};

/// Entry that was read but never considered for output
#[derive(Debug, Clone, PartialEq)]
pub struct UnrecognizedEntry {
    /// Source line of the entry
    pub line: u64,
    /// Raw category label
    pub label: String,
    /// Asset of the entry
    pub asset: String,
}

/// Counters and listings collected during one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunDiagnostics {
    /// Entries dropped because their timestamp could not be parsed
    pub invalid_timestamps: usize,

    /// Entries dropped because their quantity could not be parsed
    pub invalid_quantities: usize,

    /// Entries whose category is not handled
    pub unrecognized: Vec<UnrecognizedEntry>,

    /// Executions left without a counterpart leg
    pub unmatched_executions: Vec<LedgerEntry>,

    /// Fee keys that no withdrawal claimed
    pub unattributed_fees: usize,

    /// Extra attributions of a fee key already claimed by an earlier withdrawal
    pub shared_fee_attributions: usize,
}

impl RunDiagnostics {
    /// Count an entry-level error raised while normalizing
    ///
    /// Fatal errors are not diagnostics and are ignored here.
    pub fn record_entry_error(&mut self, error: &ReconcileError) {
        match error {
            ReconcileError::UnparseableTimestamp { .. } => self.invalid_timestamps += 1,
            ReconcileError::InvalidQuantity { .. } => self.invalid_quantities += 1,
            _ => {}
        }
    }

    /// Whether anything was dropped or shared during the run
    pub fn has_warnings(&self) -> bool {
        self.invalid_timestamps > 0
            || self.invalid_quantities > 0
            || !self.unrecognized.is_empty()
            || !self.unmatched_executions.is_empty()
            || self.unattributed_fees > 0
            || self.shared_fee_attributions > 0
    }

    /// Fold the diagnostics of another run into this one
    pub fn merge(&mut self, other: RunDiagnostics) {
        self.invalid_timestamps += other.invalid_timestamps;
        self.invalid_quantities += other.invalid_quantities;
        self.unrecognized.extend(other.unrecognized);
        self.unmatched_executions.extend(other.unmatched_executions);
        self.unattributed_fees += other.unattributed_fees;
        self.shared_fee_attributions += other.shared_fee_attributions;
    }
}
