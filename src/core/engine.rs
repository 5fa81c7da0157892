//! Reconciliation engine
//!
//! This module provides the ReconciliationEngine that orchestrates one run by
//! coordinating the router, the fee index, the pairer and the assembler.
//! Statements in the settled-operation layout skip all of those and go
//! through the settlement assembler.
//!
//! The engine is a pure function of its input: it holds nothing but its
//! configuration, every call owns its working state, and the same entries
//! always produce the same records. It can be shared across threads and
//! called concurrently for independent ledgers.

use crate::core::assembler::TransactionAssembler;
use crate::core::config::ReconcileConfig;
use crate::core::fee_index::FeeIndex;
use crate::core::pairer::ExecutionPairer;
use crate::core::router::route;
use crate::core::settlement::SettlementAssembler;
use crate::types::{LedgerEntry, RunDiagnostics, SettledOperation, TransactionRecord};

/// Output of one reconciliation run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reconciliation {
    /// Reconciled records, in output order
    pub records: Vec<TransactionRecord>,
    /// What was dropped, left unmatched or shared
    pub diagnostics: RunDiagnostics,
}

impl Reconciliation {
    /// Fold another run into this one, appending its records after ours
    pub fn merge(&mut self, other: Reconciliation) {
        self.records.extend(other.records);
        self.diagnostics.merge(other.diagnostics);
    }
}

/// Reconciliation engine
///
/// Turns normalized ledger entries into transaction records.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    config: ReconcileConfig,
}

impl ReconciliationEngine {
    /// Create a new engine with the given configuration
    pub fn new(config: ReconcileConfig) -> Self {
        ReconciliationEngine { config }
    }

    /// Reconcile one ledger
    ///
    /// Entries are expected sorted ascending by timestamp. They are stably
    /// re-sorted anyway, which keeps the input order of equal timestamps
    /// and is a no-op on sorted input.
    ///
    /// # Steps
    ///
    /// 1. Route entries by category
    /// 2. Build the fee index from the fee stream
    /// 3. Pair the execution stream into trades
    /// 4. Assemble deposits, withdrawals (with fees) and trades
    pub fn reconcile(&self, mut entries: Vec<LedgerEntry>) -> Reconciliation {
        entries.sort_by_key(|entry| entry.timestamp);
        let input_len = entries.len();

        let routed = route(entries);
        let routed_len = routed.routed_len();
        let fee_index = FeeIndex::build(&routed.fees);

        let pairing = ExecutionPairer::new(self.config.pairing_window, &self.config.source_name)
            .pair(&routed.executions);

        let assembly = TransactionAssembler::new(&self.config).assemble(
            &routed.deposits,
            &routed.withdrawals,
            &fee_index,
            pairing.trades,
        );

        let diagnostics = RunDiagnostics {
            unrecognized: routed.unrecognized,
            unmatched_executions: pairing.unmatched,
            unattributed_fees: assembly.unattributed_fees,
            shared_fee_attributions: assembly.shared_fee_attributions,
            ..RunDiagnostics::default()
        };

        tracing::debug!(
            entries = input_len,
            routed = routed_len,
            deposits = routed.deposits.len(),
            withdrawals = routed.withdrawals.len(),
            fees = fee_index.len(),
            executions = routed.executions.len(),
            records = assembly.records.len(),
            "Ledger reconciled"
        );

        if !diagnostics.unmatched_executions.is_empty() {
            tracing::warn!(
                "{} execution leg(s) had no counterpart and were dropped",
                diagnostics.unmatched_executions.len()
            );
        }
        if diagnostics.unattributed_fees > 0 {
            tracing::warn!(
                "{} withdrawal fee(s) could not be attributed to a withdrawal",
                diagnostics.unattributed_fees
            );
        }

        Reconciliation {
            records: assembly.records,
            diagnostics,
        }
    }

    /// Reconcile the operations of one settlement statement
    ///
    /// Operations are stably sorted by timestamp, turned into records one
    /// for one, then put in the configured output order.
    pub fn reconcile_settled(&self, mut operations: Vec<SettledOperation>) -> Reconciliation {
        operations.sort_by_key(|operation| operation.timestamp);

        let settlement = SettlementAssembler::new(&self.config).assemble(&operations);
        let mut records = settlement.records;
        self.config.ordering.apply(&mut records);

        tracing::debug!(
            operations = operations.len(),
            records = records.len(),
            "Settled operations reconciled"
        );

        Reconciliation {
            records,
            diagnostics: RunDiagnostics {
                unrecognized: settlement.unrecognized,
                ..RunDiagnostics::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{FeeAttributionPolicy, OutputOrdering};
    use crate::types::{AssetAmount, EntryCategory, OperationKind, Provenance};
    use chrono::{NaiveDateTime, TimeDelta};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn at(millis: i64) -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-01-17 09:47:30", "%Y-%m-%d %H:%M:%S").unwrap()
            + TimeDelta::milliseconds(millis)
    }

    fn entry(millis: i64, category: EntryCategory, asset: &str, quantity: &str) -> LedgerEntry {
        LedgerEntry::new(
            at(millis),
            category,
            asset,
            Decimal::from_str(quantity).unwrap(),
        )
    }

    fn sample_ledger() -> Vec<LedgerEntry> {
        vec![
            entry(0, EntryCategory::Deposit, "BRL", "1000"),
            entry(10_000, EntryCategory::OrderExecution, "BRL", "-500"),
            entry(10_400, EntryCategory::OrderExecution, "BTC", "0.002"),
            entry(20_000, EntryCategory::Unrecognized("OrderCancellation".into()), "BTC", "0"),
            entry(30_000, EntryCategory::OrderExecution, "BTC", "-0.001"),
            entry(100_000, EntryCategory::Withdrawal, "ETH", "0.05"),
            entry(100_500, EntryCategory::FeeOnWithdrawal, "ETH", "-0.001"),
            entry(200_000, EntryCategory::Withdrawal, "BTC", "0.0005"),
        ]
    }

    #[test]
    fn test_reconcile_sample_ledger() {
        let engine = ReconciliationEngine::default();
        let result = engine.reconcile(sample_ledger());

        let provenances: Vec<Provenance> = result.records.iter().map(|r| r.provenance).collect();
        assert_eq!(
            provenances,
            vec![
                Provenance::Deposit,
                Provenance::Withdrawal,
                Provenance::Withdrawal,
                Provenance::Trade
            ]
        );

        let eth_withdrawal = &result.records[1];
        assert_eq!(
            eth_withdrawal.fee,
            Some(AssetAmount::new(Decimal::from_str("0.001").unwrap(), "ETH"))
        );
        assert_eq!(result.records[2].fee, None);

        let trade = &result.records[3];
        assert_eq!(trade.timestamp, at(10_000));
        assert_eq!(trade.sent, Some(AssetAmount::new(Decimal::from(500), "BRL")));

        assert_eq!(result.diagnostics.unrecognized.len(), 1);
        assert_eq!(result.diagnostics.unrecognized[0].label, "OrderCancellation");
        assert_eq!(result.diagnostics.unmatched_executions.len(), 1);
        assert_eq!(result.diagnostics.unattributed_fees, 0);
    }

    #[test]
    fn test_unrecognized_category_produces_no_record_but_is_counted() {
        let engine = ReconciliationEngine::default();
        let result = engine.reconcile(vec![entry(
            0,
            EntryCategory::from_label("OrderCancellation"),
            "BTC",
            "1",
        )]);

        assert!(result.records.is_empty());
        assert_eq!(result.diagnostics.unrecognized.len(), 1);
        assert!(result.diagnostics.has_warnings());
    }

    #[test]
    fn test_record_count_invariant() {
        let engine = ReconciliationEngine::default();
        let ledger = sample_ledger();
        let input_len = ledger.len();
        let deposits = ledger
            .iter()
            .filter(|e| e.category == EntryCategory::Deposit)
            .count();
        let withdrawals = ledger
            .iter()
            .filter(|e| e.category == EntryCategory::Withdrawal)
            .count();

        let result = engine.reconcile(ledger);
        let trades = result
            .records
            .iter()
            .filter(|r| r.provenance == Provenance::Trade)
            .count();

        assert_eq!(result.records.len(), deposits + withdrawals + trades);
        assert!(result.records.len() <= input_len);
        for record in &result.records {
            assert!(record.sent.is_some() || record.received.is_some());
        }
    }

    #[test]
    fn test_reconcile_is_deterministic() {
        let engine = ReconciliationEngine::default();
        let first = engine.reconcile(sample_ledger());

        for _ in 0..10 {
            assert_eq!(engine.reconcile(sample_ledger()), first);
        }
    }

    #[test]
    fn test_unsorted_input_is_sorted_stably() {
        let engine = ReconciliationEngine::default();
        let mut ledger = sample_ledger();
        ledger.reverse();

        let result = engine.reconcile(ledger);
        let trades: Vec<&TransactionRecord> = result
            .records
            .iter()
            .filter(|r| r.provenance == Provenance::Trade)
            .collect();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].timestamp, at(10_000));
    }

    #[test]
    fn test_config_is_honoured() {
        let engine = ReconciliationEngine::new(ReconcileConfig::new(
            500,
            2_000,
            FeeAttributionPolicy::Shared,
            OutputOrdering::Chronological,
            "Exchange",
        ));

        let result = engine.reconcile(sample_ledger());

        // 400 ms apart still pairs, records come out in time order.
        let provenances: Vec<Provenance> = result.records.iter().map(|r| r.provenance).collect();
        assert_eq!(
            provenances,
            vec![
                Provenance::Deposit,
                Provenance::Trade,
                Provenance::Withdrawal,
                Provenance::Withdrawal
            ]
        );
        assert_eq!(result.records[0].description, "Deposit - Exchange");
    }

    fn settled(secs: i64, label: &str, asset: &str, brl: &str, crypto: &str) -> SettledOperation {
        SettledOperation {
            timestamp: at(secs * 1_000),
            kind: OperationKind::from_label(label, asset),
            asset: asset.to_string(),
            net_brl: Decimal::from_str(brl).unwrap(),
            gross_brl: Decimal::from_str(brl).unwrap(),
            net_crypto: Decimal::from_str(crypto).unwrap(),
            gross_crypto: Decimal::from_str(crypto).unwrap(),
            line: 2 + secs as u64,
        }
    }

    #[test]
    fn test_reconcile_settled_uses_block_order() {
        let engine = ReconciliationEngine::default();
        let result = engine.reconcile_settled(vec![
            settled(30, "CASH-OUT", "BRL", "-100", "0"),
            settled(0, "TRADING-IN", "BTC", "-500", "0.002"),
            settled(10, "WALLET-IN", "ETH", "0", "1"),
            settled(20, "REWARD", "ETH", "0", "0.1"),
        ]);

        let provenances: Vec<Provenance> = result.records.iter().map(|r| r.provenance).collect();
        assert_eq!(
            provenances,
            vec![Provenance::Deposit, Provenance::Withdrawal, Provenance::Trade]
        );
        assert_eq!(result.diagnostics.unrecognized.len(), 1);
        assert_eq!(result.diagnostics.unrecognized[0].label, "REWARD");
        assert!(result.diagnostics.unmatched_executions.is_empty());
    }

    #[test]
    fn test_reconcile_settled_chronological() {
        let engine = ReconciliationEngine::new(ReconcileConfig {
            ordering: OutputOrdering::Chronological,
            ..ReconcileConfig::default()
        });
        let result = engine.reconcile_settled(vec![
            settled(30, "CASH-OUT", "BRL", "-100", "0"),
            settled(0, "TRADING-IN", "BTC", "-500", "0.002"),
            settled(10, "WALLET-IN", "ETH", "0", "1"),
        ]);

        let times: Vec<NaiveDateTime> = result.records.iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![at(0), at(10_000), at(30_000)]);
    }

    #[test]
    fn test_empty_ledger() {
        let result = ReconciliationEngine::default().reconcile(Vec::new());
        assert_eq!(result, Reconciliation::default());

        let result = ReconciliationEngine::default().reconcile_settled(Vec::new());
        assert_eq!(result, Reconciliation::default());
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReconciliationEngine>();
    }
}
