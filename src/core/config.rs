//! Engine configuration
//!
//! Tuning knobs of the reconciliation engine. The defaults reproduce the
//! behaviour of the statement converter the engine replaces: 2 second
//! windows, shared fee attribution and per-category output blocks.

use crate::types::{Provenance, TransactionRecord};
use chrono::TimeDelta;

/// Default window, in milliseconds, for both pairing and fee attribution
pub const DEFAULT_WINDOW_MS: i64 = 2_000;

/// Default source name appended to record descriptions
pub const DEFAULT_SOURCE_NAME: &str = "Mercado Bitcoin";

/// How fee entries are handed out to withdrawals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeeAttributionPolicy {
    /// Every withdrawal scans the whole fee index
    ///
    /// A single fee entry can end up attributed to several withdrawals.
    /// Extra attributions are counted in the run diagnostics.
    #[default]
    Shared,

    /// A fee entry is claimed by the first withdrawal that matches it
    Exclusive,
}

/// Order of the assembled output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputOrdering {
    /// Deposits, then withdrawals, then trades, each block in time order
    #[default]
    Blocks,

    /// All records in time order; ties keep block order
    Chronological,
}

impl OutputOrdering {
    /// Put records into this order
    ///
    /// Both orders are stable sorts, so records that tie keep their
    /// relative position.
    pub fn apply(self, records: &mut [TransactionRecord]) {
        match self {
            OutputOrdering::Blocks => records.sort_by_key(|record| block_rank(record.provenance)),
            OutputOrdering::Chronological => records.sort_by_key(|record| record.timestamp),
        }
    }
}

fn block_rank(provenance: Provenance) -> u8 {
    match provenance {
        Provenance::Deposit => 0,
        Provenance::Withdrawal => 1,
        Provenance::Trade => 2,
    }
}

/// Configuration for a reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Two execution legs closer than this are the same trade
    pub pairing_window: TimeDelta,

    /// A fee entry closer than this to a withdrawal belongs to it
    pub fee_window: TimeDelta,

    /// Fee attribution policy
    pub fee_policy: FeeAttributionPolicy,

    /// Output ordering
    pub ordering: OutputOrdering,

    /// Exchange name used in record descriptions
    pub source_name: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            pairing_window: TimeDelta::milliseconds(DEFAULT_WINDOW_MS),
            fee_window: TimeDelta::milliseconds(DEFAULT_WINDOW_MS),
            fee_policy: FeeAttributionPolicy::default(),
            ordering: OutputOrdering::default(),
            source_name: DEFAULT_SOURCE_NAME.to_string(),
        }
    }
}

impl ReconcileConfig {
    /// Create a ReconcileConfig with custom windows
    ///
    /// Windows are given in milliseconds. A zero or negative window could
    /// never match anything, so it falls back to the default with a warning.
    pub fn new(
        pairing_window_ms: i64,
        fee_window_ms: i64,
        fee_policy: FeeAttributionPolicy,
        ordering: OutputOrdering,
        source_name: impl Into<String>,
    ) -> Self {
        Self {
            pairing_window: window_or_default("pairing_window", pairing_window_ms),
            fee_window: window_or_default("fee_window", fee_window_ms),
            fee_policy,
            ordering,
            source_name: source_name.into(),
        }
    }
}

fn window_or_default(name: &str, millis: i64) -> TimeDelta {
    if millis <= 0 {
        tracing::warn!(
            "Invalid {} ({} ms), using default ({} ms)",
            name,
            millis,
            DEFAULT_WINDOW_MS
        );
        TimeDelta::milliseconds(DEFAULT_WINDOW_MS)
    } else {
        TimeDelta::milliseconds(millis)
    }
}
