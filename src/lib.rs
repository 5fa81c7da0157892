//! Ledger Reconciler Library
//! # Overview
//!
//! This library reconciles exchange ledger statements into a sent/received
//! transaction export, with a sync and an async processing strategy.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (LedgerEntry, TransactionRecord, errors, diagnostics)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::router`] - Category routing
//!   - [`core::fee_index`] - Withdrawal fee lookup by time window
//!   - [`core::pairer`] - Greedy pairing of order-execution legs
//!   - [`core::assembler`] - Fee attribution and output ordering
//!   - [`core::settlement`] - Records straight from settlement statements
//!   - [`core::engine`] - Reconciliation orchestration
//! - [`io`] - Statement reading, normalization and Koinly export
//! - [`strategy`] - Pluggable sync/async pipelines
//!
//! # Categories
//!
//! - **Deposit**: becomes a received-only record
//! - **Withdrawal**: becomes a sent-only record, carrying its fee when one is found
//! - **Withdrawal fee**: never a record of its own, attributed to a withdrawal
//! - **Order execution**: one leg of a trade; two legs of opposite sign close in
//!   time become one sent/received record
//! - **Anything else**: skipped and listed in the run diagnostics
//!
//! Settlement statements (an `Ativo` / `Operação Tipo` header) already carry
//! both sides of each operation and skip the pairing above.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use crate::core::{ReconcileConfig, Reconciliation, ReconciliationEngine};
pub use crate::io::write_records_csv;
pub use crate::types::{
    AssetAmount, EntryCategory, LedgerEntry, OperationKind, Provenance, ReconcileError,
    RunDiagnostics, SettledOperation, TransactionRecord,
};
