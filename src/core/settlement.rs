//! Settled operation assembly
//!
//! The newer statement layout needs no routing, fee index or pairing: every
//! row is one settled operation carrying both sides, its fee (the gross/net
//! difference) and its BRL value. Each recognized row becomes exactly one
//! record.

use crate::core::config::ReconcileConfig;
use crate::types::{
    tag_with_source, AssetAmount, OperationKind, ReconcileError, SettledOperation,
    TransactionRecord, UnrecognizedEntry, QUOTE_CURRENCY,
};

/// Records built from settled operations
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Settlement {
    /// One record per recognized operation, in input order
    pub records: Vec<TransactionRecord>,
    /// Operations of a kind the reconciler does not handle
    pub unrecognized: Vec<UnrecognizedEntry>,
}

/// Turns settled operations into records
#[derive(Debug, Clone)]
pub struct SettlementAssembler<'a> {
    config: &'a ReconcileConfig,
}

impl<'a> SettlementAssembler<'a> {
    pub fn new(config: &'a ReconcileConfig) -> Self {
        SettlementAssembler { config }
    }

    /// Build one record per recognized operation
    ///
    /// Output order is the input order; the caller applies the configured
    /// ordering.
    pub fn assemble(&self, operations: &[SettledOperation]) -> Settlement {
        let mut settlement = Settlement::default();

        for operation in operations {
            match self.record(operation) {
                Some(record) => settlement.records.push(record),
                None => {
                    let label = match &operation.kind {
                        OperationKind::Unrecognized(label) => label.clone(),
                        _ => String::new(),
                    };
                    let error = ReconcileError::unrecognized_category(operation.line, &label);
                    tracing::warn!(asset = %operation.asset, "{}, operation skipped", error);
                    settlement.unrecognized.push(UnrecognizedEntry {
                        line: operation.line,
                        label,
                        asset: operation.asset.clone(),
                    });
                }
            }
        }

        settlement
    }

    fn record(&self, operation: &SettledOperation) -> Option<TransactionRecord> {
        let source_name = self.config.source_name.as_str();
        let asset = operation.asset.as_str();
        let brl = AssetAmount::new(operation.net_brl, QUOTE_CURRENCY);
        let crypto = AssetAmount::new(operation.net_crypto, asset);
        let ts = operation.timestamp;

        let (record, description) = match operation.kind {
            OperationKind::Buy => (
                TransactionRecord::trade(ts, brl.clone(), crypto, source_name)
                    .with_net_worth(brl),
                format!("Purchase of {}", asset),
            ),
            OperationKind::Sell => (
                TransactionRecord::trade(ts, crypto, brl.clone(), source_name)
                    .with_net_worth(brl),
                format!("Sale of {}", asset),
            ),
            OperationKind::Deposit => (
                TransactionRecord::deposit(ts, crypto, source_name),
                format!("Deposit of {}", asset),
            ),
            OperationKind::Withdrawal => (
                TransactionRecord::withdrawal(ts, crypto, None, source_name),
                format!("Withdrawal of {}", asset),
            ),
            OperationKind::CashOut => (
                TransactionRecord::withdrawal(ts, brl, None, source_name),
                format!("Withdrawal of {}", QUOTE_CURRENCY),
            ),
            OperationKind::Unrecognized(_) => return None,
        };

        Some(
            record
                .with_fee(operation.fee())
                .with_description(tag_with_source(&description, source_name))
                .labelled(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Provenance;
    use chrono::{NaiveDateTime, TimeDelta};
    use rstest::rstest;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn operation(
        secs: i64,
        label: &str,
        asset: &str,
        brl: (&str, &str),
        crypto: (&str, &str),
    ) -> SettledOperation {
        SettledOperation {
            timestamp: NaiveDateTime::parse_from_str("2024-06-01 12:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap()
                + TimeDelta::seconds(secs),
            kind: OperationKind::from_label(label, asset),
            asset: asset.to_string(),
            net_brl: dec(brl.0),
            gross_brl: dec(brl.1),
            net_crypto: dec(crypto.0),
            gross_crypto: dec(crypto.1),
            line: 4 + secs as u64,
        }
    }

    fn amount(value: &str, asset: &str) -> Option<AssetAmount> {
        Some(AssetAmount::new(dec(value), asset))
    }

    #[test]
    fn test_buy_sends_brl_and_receives_asset() {
        let config = ReconcileConfig::default();
        let ops = [operation(0, "TRADING-IN", "BTC", ("-500", "-503.5"), ("0.002", "0.002"))];

        let settlement = SettlementAssembler::new(&config).assemble(&ops);

        let record = &settlement.records[0];
        assert_eq!(record.provenance, Provenance::Trade);
        assert_eq!(record.sent, amount("500", "BRL"));
        assert_eq!(record.received, amount("0.002", "BTC"));
        assert_eq!(record.fee, amount("3.5", "BRL"));
        assert_eq!(record.net_worth, amount("500", "BRL"));
        assert_eq!(record.label, Some("Trade"));
        assert_eq!(record.description, "Purchase of BTC - Mercado Bitcoin");
    }

    #[test]
    fn test_sell_sends_asset_and_receives_brl() {
        let config = ReconcileConfig::default();
        let ops = [operation(0, "TRADING-OUT", "ETH", ("1200", "1200"), ("-0.1", "-0.1001"))];

        let record = &SettlementAssembler::new(&config).assemble(&ops).records[0];

        assert_eq!(record.sent, amount("0.1", "ETH"));
        assert_eq!(record.received, amount("1200", "BRL"));
        assert_eq!(record.fee, amount("0.0001", "ETH"));
        assert_eq!(record.net_worth, amount("1200", "BRL"));
        assert_eq!(record.description, "Sale of ETH - Mercado Bitcoin");
    }

    #[rstest]
    #[case::wallet_in("WALLET-IN", "ETH", Provenance::Deposit, None, amount("1.5", "ETH"), "Deposit of ETH")]
    #[case::wallet_out("WALLET-OUT", "ETH", Provenance::Withdrawal, amount("1.5", "ETH"), None, "Withdrawal of ETH")]
    #[case::cash_out("CASH-OUT", "BRL", Provenance::Withdrawal, amount("800", "BRL"), None, "Withdrawal of BRL")]
    fn test_transfers(
        #[case] label: &str,
        #[case] asset: &str,
        #[case] provenance: Provenance,
        #[case] sent: Option<AssetAmount>,
        #[case] received: Option<AssetAmount>,
        #[case] description: &str,
    ) {
        let config = ReconcileConfig::default();
        let ops = [operation(0, label, asset, ("800", "800"), ("1.5", "1.5"))];

        let record = &SettlementAssembler::new(&config).assemble(&ops).records[0];

        assert_eq!(record.provenance, provenance);
        assert_eq!(record.sent, sent);
        assert_eq!(record.received, received);
        assert_eq!(record.fee, None);
        assert_eq!(record.net_worth, None);
        assert_eq!(record.label, Some(provenance.koinly_label()));
        assert_eq!(record.description, format!("{} - Mercado Bitcoin", description));
    }

    #[test]
    fn test_unrecognized_operations_are_listed_not_recorded() {
        let config = ReconcileConfig::default();
        let ops = [
            operation(0, "CASH-OUT", "BTC", ("0", "0"), ("1", "1")),
            operation(1, "STAKING-REWARD", "ETH", ("0", "0"), ("0.01", "0.01")),
            operation(2, "WALLET-IN", "ETH", ("0", "0"), ("0.01", "0.01")),
        ];

        let settlement = SettlementAssembler::new(&config).assemble(&ops);

        assert_eq!(settlement.records.len(), 1);
        let labels: Vec<(&str, &str)> = settlement
            .unrecognized
            .iter()
            .map(|u| (u.label.as_str(), u.asset.as_str()))
            .collect();
        assert_eq!(labels, vec![("CASH-OUT", "BTC"), ("STAKING-REWARD", "ETH")]);
        assert_eq!(settlement.unrecognized[1].line, 5);
    }

    #[test]
    fn test_unnamed_source_has_bare_description() {
        let config = ReconcileConfig {
            source_name: String::new(),
            ..ReconcileConfig::default()
        };
        let ops = [operation(0, "WALLET-IN", "SOL", ("0", "0"), ("2", "2"))];

        let record = &SettlementAssembler::new(&config).assemble(&ops).records[0];
        assert_eq!(record.description, "Deposit of SOL");
    }
}
