//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `entry`: normalized ledger rows (input of the engine)
//! - `operation`: settled operations of the newer statement layout
//! - `record`: reconciled transaction records (output of the engine)
//! - `diagnostics`: per-run counters of dropped and shared entries
//! - `error`: Error types for the reconciler

pub mod diagnostics;
pub mod entry;
pub mod error;
pub mod operation;
pub mod record;

pub use diagnostics::{RunDiagnostics, UnrecognizedEntry};
pub use entry::{EntryCategory, LedgerEntry};
pub use error::ReconcileError;
pub use operation::{OperationKind, SettledOperation, QUOTE_CURRENCY};
pub use record::{tag_with_source, AssetAmount, Provenance, TransactionRecord};
