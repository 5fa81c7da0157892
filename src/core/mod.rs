//! Core business logic module
//!
//! This module contains the reconciliation components:
//! - `router` - Splits the ledger into per-category streams
//! - `fee_index` - Fee entries keyed by `(timestamp, asset)` with window lookup
//! - `pairer` - Greedy pairing of order-execution legs into trades
//! - `assembler` - Fee attribution and final record ordering
//! - `settlement` - Records straight from settled operations
//! - `engine` - Orchestration of one reconciliation run
//! - `config` - Engine configuration
//! - `async` - Concurrent reconciliation of independent ledgers

pub mod assembler;
pub mod r#async;
pub mod config;
pub mod engine;
pub mod fee_index;
pub mod pairer;
pub mod router;
pub mod settlement;

pub use assembler::{Assembly, TransactionAssembler};
pub use config::{FeeAttributionPolicy, OutputOrdering, ReconcileConfig};
pub use engine::{Reconciliation, ReconciliationEngine};
pub use fee_index::{FeeIndex, FeeKey};
pub use pairer::{ExecutionPairer, PairingOutcome};
pub use r#async::{LedgerBatchProcessor, LedgerJob};
pub use router::{route, RoutedEntries};
pub use settlement::{Settlement, SettlementAssembler};
