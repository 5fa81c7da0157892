//! Transaction assembly
//!
//! Turns the routed deposit and withdrawal streams into records, attributes
//! withdrawal fees from the [`FeeIndex`], and merges them with the paired
//! trades into the final output sequence.

use crate::core::config::{FeeAttributionPolicy, ReconcileConfig};
use crate::core::fee_index::{FeeIndex, FeeKey};
use crate::types::{AssetAmount, LedgerEntry, TransactionRecord};
use std::collections::BTreeMap;

/// Records assembled for one run, plus fee bookkeeping for diagnostics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Assembly {
    pub records: Vec<TransactionRecord>,
    /// Fee keys that no withdrawal claimed
    pub unattributed_fees: usize,
    /// Attributions beyond the first for the same fee key
    pub shared_fee_attributions: usize,
}

/// Builds the final record sequence
#[derive(Debug, Clone)]
pub struct TransactionAssembler<'a> {
    config: &'a ReconcileConfig,
}

impl<'a> TransactionAssembler<'a> {
    pub fn new(config: &'a ReconcileConfig) -> Self {
        TransactionAssembler { config }
    }

    /// Merge deposits, fee-attributed withdrawals and trades
    ///
    /// With [`OutputOrdering::Blocks`](crate::core::OutputOrdering::Blocks) the output is the deposits block,
    /// then the withdrawals block, then the trades block. With
    /// [`OutputOrdering::Chronological`](crate::core::OutputOrdering::Chronological) the same sequence is stably sorted
    /// by timestamp.
    pub fn assemble(
        &self,
        deposits: &[LedgerEntry],
        withdrawals: &[LedgerEntry],
        fee_index: &FeeIndex,
        trades: Vec<TransactionRecord>,
    ) -> Assembly {
        let source_name = self.config.source_name.as_str();
        let mut records = Vec::with_capacity(deposits.len() + withdrawals.len() + trades.len());

        records.extend(deposits.iter().map(|deposit| {
            TransactionRecord::deposit(
                deposit.timestamp,
                AssetAmount::new(deposit.quantity, deposit.asset.clone()),
                source_name,
            )
        }));

        // Attribution count per fee key, in key order
        let mut claims: BTreeMap<&FeeKey, usize> = BTreeMap::new();

        for withdrawal in withdrawals {
            let found = match self.config.fee_policy {
                FeeAttributionPolicy::Shared => fee_index.lookup(
                    withdrawal.timestamp,
                    &withdrawal.asset,
                    self.config.fee_window,
                ),
                FeeAttributionPolicy::Exclusive => fee_index.lookup_excluding(
                    withdrawal.timestamp,
                    &withdrawal.asset,
                    self.config.fee_window,
                    |key| claims.contains_key(key),
                ),
            };

            let fee = found.map(|(key, amount)| {
                let count = claims.entry(key).or_insert(0);
                *count += 1;
                if *count > 1 {
                    tracing::warn!(
                        line = withdrawal.line,
                        asset = %key.asset,
                        fee_time = %key.timestamp,
                        "Fee already attributed to another withdrawal, attributing again"
                    );
                }
                AssetAmount::new(amount, key.asset.clone())
            });

            records.push(TransactionRecord::withdrawal(
                withdrawal.timestamp,
                AssetAmount::new(withdrawal.quantity, withdrawal.asset.clone()),
                fee,
                source_name,
            ));
        }

        records.extend(trades);
        self.config.ordering.apply(&mut records);

        let unattributed_fees = fee_index.len() - claims.len();
        let shared_fee_attributions = claims.values().map(|count| count - 1).sum();

        Assembly {
            records,
            unattributed_fees,
            shared_fee_attributions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::OutputOrdering;
    use crate::types::{EntryCategory, Provenance};
    use chrono::{NaiveDateTime, TimeDelta};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn at(millis: i64) -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-05-02 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
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

    fn trade(millis: i64) -> TransactionRecord {
        TransactionRecord::trade(
            at(millis),
            AssetAmount::new(Decimal::from(100), "BRL"),
            AssetAmount::new(Decimal::from_str("0.001").unwrap(), "BTC"),
            "Mercado Bitcoin",
        )
    }

    #[test]
    fn test_withdrawal_gets_fee_within_window() {
        let config = ReconcileConfig::default();
        let withdrawals = vec![entry(100_000, EntryCategory::Withdrawal, "ETH", "0.05")];
        let fees = FeeIndex::build(&[entry(
            100_500,
            EntryCategory::FeeOnWithdrawal,
            "ETH",
            "-0.001",
        )]);

        let assembly = TransactionAssembler::new(&config).assemble(&[], &withdrawals, &fees, vec![]);

        assert_eq!(assembly.records.len(), 1);
        let record = &assembly.records[0];
        assert_eq!(
            record.sent,
            Some(AssetAmount::new(Decimal::from_str("0.05").unwrap(), "ETH"))
        );
        assert_eq!(
            record.fee,
            Some(AssetAmount::new(Decimal::from_str("0.001").unwrap(), "ETH"))
        );
        assert_eq!(record.description, "Withdrawal - Mercado Bitcoin");
        assert_eq!(assembly.unattributed_fees, 0);
    }

    #[test]
    fn test_fee_of_other_asset_is_not_attributed() {
        let config = ReconcileConfig::default();
        let withdrawals = vec![entry(0, EntryCategory::Withdrawal, "ETH", "0.05")];
        let fees = FeeIndex::build(&[entry(0, EntryCategory::FeeOnWithdrawal, "BTC", "-0.001")]);

        let assembly = TransactionAssembler::new(&config).assemble(&[], &withdrawals, &fees, vec![]);

        assert_eq!(assembly.records[0].fee, None);
        assert_eq!(assembly.unattributed_fees, 1);
    }

    #[test]
    fn test_withdrawal_without_fee_has_empty_fee() {
        let config = ReconcileConfig::default();
        let withdrawals = vec![entry(0, EntryCategory::Withdrawal, "BRL", "500")];

        let assembly = TransactionAssembler::new(&config).assemble(
            &[],
            &withdrawals,
            &FeeIndex::default(),
            vec![],
        );

        assert_eq!(assembly.records.len(), 1);
        assert_eq!(assembly.records[0].fee, None);
        assert_eq!(assembly.records[0].received, None);
    }

    #[test]
    fn test_fee_rows_that_cancel_out_attribute_nothing() {
        let config = ReconcileConfig::default();
        let withdrawals = vec![entry(0, EntryCategory::Withdrawal, "ETH", "0.05")];
        let fees = FeeIndex::build(&[
            entry(500, EntryCategory::FeeOnWithdrawal, "ETH", "-0.001"),
            entry(500, EntryCategory::FeeOnWithdrawal, "ETH", "0.001"),
        ]);

        let assembly = TransactionAssembler::new(&config).assemble(&[], &withdrawals, &fees, vec![]);

        assert_eq!(assembly.records[0].fee, None);
        assert_eq!(assembly.unattributed_fees, 0);
    }

    #[test]
    fn test_shared_policy_double_attributes_one_fee() {
        let config = ReconcileConfig::default();
        let withdrawals = vec![
            entry(0, EntryCategory::Withdrawal, "ETH", "0.05"),
            entry(1_000, EntryCategory::Withdrawal, "ETH", "0.07"),
        ];
        let fees = FeeIndex::build(&[entry(500, EntryCategory::FeeOnWithdrawal, "ETH", "-0.001")]);

        let assembly = TransactionAssembler::new(&config).assemble(&[], &withdrawals, &fees, vec![]);

        let expected_fee = Some(AssetAmount::new(Decimal::from_str("0.001").unwrap(), "ETH"));
        assert_eq!(assembly.records[0].fee, expected_fee);
        assert_eq!(assembly.records[1].fee, expected_fee);
        assert_eq!(assembly.shared_fee_attributions, 1);
        assert_eq!(assembly.unattributed_fees, 0);
    }

    #[test]
    fn test_exclusive_policy_claims_fee_once() {
        let config = ReconcileConfig {
            fee_policy: FeeAttributionPolicy::Exclusive,
            ..ReconcileConfig::default()
        };
        let withdrawals = vec![
            entry(0, EntryCategory::Withdrawal, "ETH", "0.05"),
            entry(1_000, EntryCategory::Withdrawal, "ETH", "0.07"),
        ];
        let fees = FeeIndex::build(&[entry(500, EntryCategory::FeeOnWithdrawal, "ETH", "-0.001")]);

        let assembly = TransactionAssembler::new(&config).assemble(&[], &withdrawals, &fees, vec![]);

        assert!(assembly.records[0].fee.is_some());
        assert_eq!(assembly.records[1].fee, None);
        assert_eq!(assembly.shared_fee_attributions, 0);
    }

    #[test]
    fn test_exclusive_policy_falls_through_to_next_fee() {
        let config = ReconcileConfig {
            fee_policy: FeeAttributionPolicy::Exclusive,
            ..ReconcileConfig::default()
        };
        let withdrawals = vec![
            entry(0, EntryCategory::Withdrawal, "ETH", "0.05"),
            entry(1_000, EntryCategory::Withdrawal, "ETH", "0.07"),
        ];
        let fees = FeeIndex::build(&[
            entry(500, EntryCategory::FeeOnWithdrawal, "ETH", "-0.001"),
            entry(1_200, EntryCategory::FeeOnWithdrawal, "ETH", "-0.002"),
        ]);

        let assembly = TransactionAssembler::new(&config).assemble(&[], &withdrawals, &fees, vec![]);

        assert_eq!(
            assembly.records[0].fee,
            Some(AssetAmount::new(Decimal::from_str("0.001").unwrap(), "ETH"))
        );
        assert_eq!(
            assembly.records[1].fee,
            Some(AssetAmount::new(Decimal::from_str("0.002").unwrap(), "ETH"))
        );
    }

    #[test]
    fn test_block_ordering() {
        let config = ReconcileConfig::default();
        let deposits = vec![entry(5_000, EntryCategory::Deposit, "BRL", "1000")];
        let withdrawals = vec![entry(1_000, EntryCategory::Withdrawal, "BTC", "0.01")];

        let assembly = TransactionAssembler::new(&config).assemble(
            &deposits,
            &withdrawals,
            &FeeIndex::default(),
            vec![trade(0)],
        );

        let provenances: Vec<Provenance> =
            assembly.records.iter().map(|r| r.provenance).collect();
        assert_eq!(
            provenances,
            vec![Provenance::Deposit, Provenance::Withdrawal, Provenance::Trade]
        );
    }

    #[test]
    fn test_chronological_ordering() {
        let config = ReconcileConfig {
            ordering: OutputOrdering::Chronological,
            ..ReconcileConfig::default()
        };
        let deposits = vec![entry(5_000, EntryCategory::Deposit, "BRL", "1000")];
        let withdrawals = vec![entry(1_000, EntryCategory::Withdrawal, "BTC", "0.01")];

        let assembly = TransactionAssembler::new(&config).assemble(
            &deposits,
            &withdrawals,
            &FeeIndex::default(),
            vec![trade(0), trade(5_000)],
        );

        let provenances: Vec<Provenance> =
            assembly.records.iter().map(|r| r.provenance).collect();
        assert_eq!(
            provenances,
            vec![
                Provenance::Trade,
                Provenance::Withdrawal,
                Provenance::Deposit,
                Provenance::Trade
            ]
        );
    }

    #[test]
    fn test_deposit_uses_magnitude() {
        let config = ReconcileConfig::default();
        let deposits = vec![entry(0, EntryCategory::Deposit, "BRL", "-250.5")];

        let assembly = TransactionAssembler::new(&config).assemble(
            &deposits,
            &[],
            &FeeIndex::default(),
            vec![],
        );

        assert_eq!(
            assembly.records[0].received,
            Some(AssetAmount::new(Decimal::from_str("250.5").unwrap(), "BRL"))
        );
        assert_eq!(assembly.records[0].description, "Deposit - Mercado Bitcoin");
    }
}
