//! Settled operation types
//!
//! The newer Mercado Bitcoin statement lists one row per operation with both
//! sides already settled: net and gross amounts in BRL and in the asset. No
//! pairing is needed, so these rows bypass the router and the pairer.

use crate::types::AssetAmount;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Quote currency of the settlement statement
pub const QUOTE_CURRENCY: &str = "BRL";

/// Fee differences at or below this magnitude are rounding noise
const FEE_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 8);

/// Kind of a settled operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    /// Asset bought with BRL (`TRADING-IN`)
    Buy,
    /// Asset sold for BRL (`TRADING-OUT`)
    Sell,
    /// Asset received from outside (`WALLET-IN`)
    Deposit,
    /// Asset sent out (`WALLET-OUT`)
    Withdrawal,
    /// BRL sent to a bank account (`CASH-OUT` on BRL)
    CashOut,
    /// Anything else, with its raw label
    Unrecognized(String),
}

impl OperationKind {
    /// Map an operation label onto a kind
    ///
    /// Labels are matched by substring, case-insensitively, so prefixed
    /// forms such as `OPERATION-TRADING-OUT` are accepted. `CASH-OUT` only
    /// counts on BRL rows.
    pub fn from_label(label: &str, asset: &str) -> Self {
        let upper = label.trim().to_uppercase();
        if upper.contains("TRADING-OUT") {
            OperationKind::Sell
        } else if upper.contains("TRADING-IN") {
            OperationKind::Buy
        } else if upper.contains("WALLET-OUT") {
            OperationKind::Withdrawal
        } else if upper.contains("WALLET-IN") {
            OperationKind::Deposit
        } else if upper.contains("CASH-OUT") && asset.trim().eq_ignore_ascii_case(QUOTE_CURRENCY) {
            OperationKind::CashOut
        } else {
            OperationKind::Unrecognized(label.trim().to_string())
        }
    }
}

/// A single normalized settlement row
#[derive(Debug, Clone, PartialEq)]
pub struct SettledOperation {
    /// When the operation settled
    pub timestamp: NaiveDateTime,

    /// What the operation was
    pub kind: OperationKind,

    /// Asset ticker of the row (`BRL` for cash movements)
    pub asset: String,

    /// BRL amount after fees
    pub net_brl: Decimal,

    /// BRL amount before fees
    pub gross_brl: Decimal,

    /// Asset amount after fees
    pub net_crypto: Decimal,

    /// Asset amount before fees
    pub gross_crypto: Decimal,

    /// Line in the source file, for diagnostics
    pub line: u64,
}

impl SettledOperation {
    /// Fee charged on the operation
    ///
    /// The BRL gross/net difference wins; the asset difference is used only
    /// when the BRL columns agree. Differences within 1e-8 count as none.
    pub fn fee(&self) -> Option<AssetAmount> {
        let brl = self.gross_brl - self.net_brl;
        if brl.abs() > FEE_EPSILON {
            return Some(AssetAmount::new(brl, QUOTE_CURRENCY));
        }
        let crypto = self.gross_crypto - self.net_crypto;
        if crypto.abs() > FEE_EPSILON {
            return Some(AssetAmount::new(crypto, self.asset.as_str()));
        }
        None
    }
}
