//! Output transaction records
//!
//! A `TransactionRecord` is one line of the sent/received export: a deposit,
//! a withdrawal (optionally carrying its fee) or a two-sided trade.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// An amount of a given asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetAmount {
    /// Magnitude, always non-negative
    pub amount: Decimal,
    /// Asset ticker
    pub asset: String,
}

impl AssetAmount {
    /// Create an amount from a signed quantity, keeping only its magnitude
    pub fn new(amount: Decimal, asset: impl Into<String>) -> Self {
        AssetAmount {
            amount: amount.abs(),
            asset: asset.into(),
        }
    }
}

/// Source category a record was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Deposit,
    Withdrawal,
    Trade,
}

impl Provenance {
    /// Label used as the first half of the record description
    pub fn label(self) -> &'static str {
        match self {
            Provenance::Deposit => "Deposit",
            Provenance::Withdrawal => "Withdrawal",
            Provenance::Trade => "Order execution",
        }
    }

    /// Provenance tag for the given source, e.g. `Deposit - Mercado Bitcoin`
    pub fn describe(self, source_name: &str) -> String {
        tag_with_source(self.label(), source_name)
    }

    /// Value of the Koinly `Label` column
    pub fn koinly_label(self) -> &'static str {
        match self {
            Provenance::Deposit => "Deposit",
            Provenance::Withdrawal => "Withdrawal",
            Provenance::Trade => "Trade",
        }
    }
}

/// Append ` - <source>` to a description, unless the source is unnamed
pub fn tag_with_source(text: &str, source_name: &str) -> String {
    if source_name.is_empty() {
        text.to_string()
    } else {
        format!("{} - {}", text, source_name)
    }
}

/// Reconciled output record
///
/// At least one of `sent` and `received` is always populated. Records are
/// built through [`TransactionRecord::deposit`], [`TransactionRecord::withdrawal`]
/// and [`TransactionRecord::trade`], which uphold that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    /// When the event happened
    pub timestamp: NaiveDateTime,

    /// What left the account
    pub sent: Option<AssetAmount>,

    /// What entered the account
    pub received: Option<AssetAmount>,

    /// Fee paid for the event, if one was attributed
    pub fee: Option<AssetAmount>,

    /// Value of the event in the quote currency, when the statement states it
    pub net_worth: Option<AssetAmount>,

    /// Koinly label, left empty unless the statement classifies the event
    pub label: Option<&'static str>,

    /// Provenance tag naming the source category
    pub description: String,

    /// Source category
    pub provenance: Provenance,
}

impl TransactionRecord {
    /// A deposit: only the received side is populated
    pub fn deposit(timestamp: NaiveDateTime, received: AssetAmount, source_name: &str) -> Self {
        TransactionRecord {
            timestamp,
            sent: None,
            received: Some(received),
            fee: None,
            net_worth: None,
            label: None,
            description: Provenance::Deposit.describe(source_name),
            provenance: Provenance::Deposit,
        }
    }

    /// A withdrawal: only the sent side is populated, plus the fee when one was attributed
    pub fn withdrawal(
        timestamp: NaiveDateTime,
        sent: AssetAmount,
        fee: Option<AssetAmount>,
        source_name: &str,
    ) -> Self {
        TransactionRecord {
            timestamp,
            sent: Some(sent),
            received: None,
            fee,
            net_worth: None,
            label: None,
            description: Provenance::Withdrawal.describe(source_name),
            provenance: Provenance::Withdrawal,
        }
    }

    /// A paired trade: both sides populated
    pub fn trade(
        timestamp: NaiveDateTime,
        sent: AssetAmount,
        received: AssetAmount,
        source_name: &str,
    ) -> Self {
        TransactionRecord {
            timestamp,
            sent: Some(sent),
            received: Some(received),
            fee: None,
            net_worth: None,
            label: None,
            description: Provenance::Trade.describe(source_name),
            provenance: Provenance::Trade,
        }
    }

    /// Replace the fee
    pub fn with_fee(mut self, fee: Option<AssetAmount>) -> Self {
        self.fee = fee;
        self
    }

    /// Attach the value of the event in the quote currency
    pub fn with_net_worth(mut self, net_worth: AssetAmount) -> Self {
        self.net_worth = Some(net_worth);
        self
    }

    /// Replace the description
    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    /// Fill the Koinly label from the provenance
    pub fn labelled(mut self) -> Self {
        self.label = Some(self.provenance.koinly_label());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ts() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-01-17 09:47:30", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_asset_amount_keeps_magnitude() {
        let amount = AssetAmount::new(Decimal::new(-25, 1), "BTC");
        assert_eq!(amount.amount, Decimal::new(25, 1));
        assert_eq!(amount.asset, "BTC");
    }

    #[rstest]
    #[case::deposit(Provenance::Deposit, "Mercado Bitcoin", "Deposit - Mercado Bitcoin")]
    #[case::withdrawal(Provenance::Withdrawal, "Mercado Bitcoin", "Withdrawal - Mercado Bitcoin")]
    #[case::trade(Provenance::Trade, "Mercado Bitcoin", "Order execution - Mercado Bitcoin")]
    #[case::no_source(Provenance::Trade, "", "Order execution")]
    fn test_describe(#[case] provenance: Provenance, #[case] source: &str, #[case] expected: &str) {
        assert_eq!(provenance.describe(source), expected);
    }

    #[test]
    fn test_constructors_never_build_empty_records() {
        let deposit = TransactionRecord::deposit(ts(), AssetAmount::new(Decimal::ONE, "BTC"), "x");
        let withdrawal =
            TransactionRecord::withdrawal(ts(), AssetAmount::new(Decimal::ONE, "BTC"), None, "x");
        let trade = TransactionRecord::trade(
            ts(),
            AssetAmount::new(Decimal::ONE, "BRL"),
            AssetAmount::new(Decimal::ONE, "BTC"),
            "x",
        );

        for record in [deposit, withdrawal, trade] {
            assert!(record.sent.is_some() || record.received.is_some());
            assert_eq!(record.label, None);
            assert_eq!(record.net_worth, None);
        }
    }

    #[test]
    fn test_builders_fill_settlement_columns() {
        let record = TransactionRecord::trade(
            ts(),
            AssetAmount::new(Decimal::from(500), "BRL"),
            AssetAmount::new(Decimal::new(2, 3), "BTC"),
            "x",
        )
        .with_fee(Some(AssetAmount::new(Decimal::new(-35, 1), "BRL")))
        .with_net_worth(AssetAmount::new(Decimal::from(500), "BRL"))
        .with_description(tag_with_source("Purchase of BTC", "Mercado Bitcoin"))
        .labelled();

        assert_eq!(record.label, Some("Trade"));
        assert_eq!(record.fee.unwrap().amount, Decimal::new(35, 1));
        assert_eq!(record.net_worth.unwrap().asset, "BRL");
        assert_eq!(record.description, "Purchase of BTC - Mercado Bitcoin");
    }
}
