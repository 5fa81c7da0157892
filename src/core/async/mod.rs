//! Asynchronous reconciliation
//!
//! This module provides the concurrent counterpart of the synchronous
//! pipeline. The engine itself is pure and shared as-is; what is added here
//! is task fan-out over independent ledgers and a concurrent result store.
//!
//! # Thread Safety
//!
//! - The engine is `Send + Sync` and holds only immutable configuration
//! - Each task owns the ledger it reconciles
//! - Results land in a `DashMap` keyed by input position, with no global lock

pub mod batch_processor;

pub use batch_processor::{LedgerBatchProcessor, LedgerJob};
