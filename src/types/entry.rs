//! Ledger entry types for the reconciler
//!
//! This module defines the normalized input rows consumed by the core engine:
//! one row per side of an economic event, already parsed and typed.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Category of a ledger row
///
/// The exchange statement tags every row with a free-text category. The
/// adapter maps the labels it knows onto this fixed set; everything else
/// is kept as `Unrecognized` with its raw label so it can be reported.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryCategory {
    /// Funds credited to the account from outside
    Deposit,

    /// Funds sent out of the account
    ///
    /// The quantity is used by magnitude only.
    Withdrawal,

    /// Fee charged for a withdrawal, logged as its own row
    FeeOnWithdrawal,

    /// One leg (buy or sell side) of an order execution
    ///
    /// The sign of the quantity encodes the direction of the leg.
    OrderExecution,

    /// Any category label the reconciler does not handle
    Unrecognized(String),
}

impl EntryCategory {
    /// Map a statement category label onto a category
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Both the Portuguese labels of the Mercado Bitcoin statement (with or
    /// without accents) and plain English labels are accepted.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "depósito" | "deposito" | "deposit" => EntryCategory::Deposit,
            "saque/retirada" | "saque" | "retirada" | "withdrawal" => EntryCategory::Withdrawal,
            "taxa de saque" | "taxa de retirada" | "withdrawal fee" => {
                EntryCategory::FeeOnWithdrawal
            }
            "execução de ordem" | "execucao de ordem" | "order execution" => {
                EntryCategory::OrderExecution
            }
            _ => EntryCategory::Unrecognized(label.trim().to_string()),
        }
    }
}

/// A single normalized ledger row
///
/// Entries are immutable once normalized and are consumed exactly once by
/// the category router.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// When the row was booked (interpreted as UTC, sub-second precision kept)
    pub timestamp: NaiveDateTime,

    /// Category of the row
    pub category: EntryCategory,

    /// Asset ticker, e.g. `BTC` or `BRL`
    pub asset: String,

    /// Signed quantity
    ///
    /// Negative is an outflow, positive an inflow. Deposit and withdrawal
    /// rows are used by magnitude only.
    pub quantity: Decimal,

    /// Balance after the row, carried through but never used for pairing
    pub running_balance: Option<Decimal>,

    /// Line in the source file, for diagnostics
    pub line: u64,
}

impl LedgerEntry {
    /// Create an entry with no running balance and no source line
    ///
    /// Mostly useful for callers that build ledgers in memory.
    pub fn new(
        timestamp: NaiveDateTime,
        category: EntryCategory,
        asset: impl Into<String>,
        quantity: Decimal,
    ) -> Self {
        LedgerEntry {
            timestamp,
            category,
            asset: asset.into(),
            quantity,
            running_balance: None,
            line: 0,
        }
    }
}
