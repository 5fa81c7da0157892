//! Category routing
//!
//! Splits the ordered ledger into one stream per category. Routing is a pure
//! classification on `LedgerEntry::category`; relative order inside every
//! stream is the input order.

use crate::types::{EntryCategory, LedgerEntry, ReconcileError, UnrecognizedEntry};

/// Ledger split by category
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RoutedEntries {
    pub deposits: Vec<LedgerEntry>,
    pub withdrawals: Vec<LedgerEntry>,
    pub fees: Vec<LedgerEntry>,
    pub executions: Vec<LedgerEntry>,
    /// Diagnostic side channel, never turned into transactions
    pub unrecognized: Vec<UnrecognizedEntry>,
}

impl RoutedEntries {
    /// Number of entries routed to one of the four handled streams
    pub fn routed_len(&self) -> usize {
        self.deposits.len() + self.withdrawals.len() + self.fees.len() + self.executions.len()
    }
}

/// Partition entries into disjoint per-category streams
pub fn route(entries: Vec<LedgerEntry>) -> RoutedEntries {
    let mut routed = RoutedEntries::default();

    for entry in entries {
        match &entry.category {
            EntryCategory::Deposit => routed.deposits.push(entry),
            EntryCategory::Withdrawal => routed.withdrawals.push(entry),
            EntryCategory::FeeOnWithdrawal => routed.fees.push(entry),
            EntryCategory::OrderExecution => routed.executions.push(entry),
            EntryCategory::Unrecognized(label) => {
                let error = ReconcileError::unrecognized_category(entry.line, label);
                tracing::warn!(asset = %entry.asset, "{}, entry skipped", error);
                routed.unrecognized.push(UnrecognizedEntry {
                    line: entry.line,
                    label: label.clone(),
                    asset: entry.asset,
                });
            }
        }
    }

    routed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, TimeDelta};
    use rust_decimal::Decimal;

    fn entry(offset_secs: i64, category: EntryCategory, asset: &str) -> LedgerEntry {
        let base =
            NaiveDateTime::parse_from_str("2024-01-17 09:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        LedgerEntry::new(
            base + TimeDelta::seconds(offset_secs),
            category,
            asset,
            Decimal::ONE,
        )
    }

    #[test]
    fn test_route_partitions_by_category() {
        let entries = vec![
            entry(0, EntryCategory::Deposit, "BRL"),
            entry(1, EntryCategory::OrderExecution, "BRL"),
            entry(1, EntryCategory::OrderExecution, "BTC"),
            entry(2, EntryCategory::Withdrawal, "BTC"),
            entry(2, EntryCategory::FeeOnWithdrawal, "BTC"),
            entry(3, EntryCategory::Unrecognized("OrderCancellation".into()), "BTC"),
        ];

        let routed = route(entries);

        assert_eq!(routed.deposits.len(), 1);
        assert_eq!(routed.withdrawals.len(), 1);
        assert_eq!(routed.fees.len(), 1);
        assert_eq!(routed.executions.len(), 2);
        assert_eq!(routed.unrecognized.len(), 1);
        assert_eq!(routed.unrecognized[0].label, "OrderCancellation");
        assert_eq!(routed.routed_len(), 5);
    }

    #[test]
    fn test_route_preserves_relative_order() {
        let entries = vec![
            entry(0, EntryCategory::OrderExecution, "A"),
            entry(1, EntryCategory::Deposit, "X"),
            entry(2, EntryCategory::OrderExecution, "B"),
            entry(3, EntryCategory::OrderExecution, "C"),
        ];

        let routed = route(entries);

        let assets: Vec<&str> = routed.executions.iter().map(|e| e.asset.as_str()).collect();
        assert_eq!(assets, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_route_empty() {
        let routed = route(Vec::new());
        assert_eq!(routed, RoutedEntries::default());
    }
}
