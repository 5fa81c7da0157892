//! Fee attribution index
//!
//! Withdrawal fees are logged by the exchange as separate rows that share
//! neither an identifier nor, always, the exact timestamp of the withdrawal
//! they belong to. The index groups fee rows by their exact
//! `(timestamp, asset)` key and answers window queries from withdrawals.
//!
//! The index is built once per run and is read-only afterwards. Keys are
//! kept in a `BTreeMap`, so "first match" means earliest timestamp, then
//! lowest asset, and lookups are deterministic.

use crate::types::LedgerEntry;
use chrono::{NaiveDateTime, TimeDelta};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

/// Exact key fee rows are grouped under
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeeKey {
    pub timestamp: NaiveDateTime,
    pub asset: String,
}

/// Accumulated fee quantities by exact `(timestamp, asset)`
#[derive(Debug, Default, Clone)]
pub struct FeeIndex {
    fees: BTreeMap<FeeKey, Decimal>,
}

impl FeeIndex {
    /// Build the index from the fee stream
    ///
    /// Quantities of rows sharing an identical key are summed (signed);
    /// rows a few milliseconds apart stay separate keys. A key whose rows
    /// cancel out carries no fee and is left out of the index.
    pub fn build(fees: &[LedgerEntry]) -> Self {
        let mut index: BTreeMap<FeeKey, Decimal> = BTreeMap::new();

        for fee in fees {
            let key = FeeKey {
                timestamp: fee.timestamp,
                asset: fee.asset.clone(),
            };
            let total = index.entry(key).or_insert(Decimal::ZERO);
            *total = total.saturating_add(fee.quantity);
        }
        index.retain(|key, total| {
            if total.is_zero() {
                debug!(
                    timestamp = %key.timestamp,
                    asset = %key.asset,
                    "Fee rows cancel out, key dropped"
                );
            }
            !total.is_zero()
        });

        FeeIndex { fees: index }
    }

    /// Number of distinct fee keys
    pub fn len(&self) -> usize {
        self.fees.len()
    }

    /// Whether the index holds no fees
    pub fn is_empty(&self) -> bool {
        self.fees.is_empty()
    }

    /// Find the fee belonging to a withdrawal
    ///
    /// Returns the first key (in index order) with the same asset and
    /// `|Δt| < window`. The amount returned is the magnitude of the
    /// accumulated quantity.
    pub fn lookup(
        &self,
        timestamp: NaiveDateTime,
        asset: &str,
        window: TimeDelta,
    ) -> Option<(&FeeKey, Decimal)> {
        self.lookup_excluding(timestamp, asset, window, |_| false)
    }

    /// Same as [`FeeIndex::lookup`], skipping keys for which `skip` returns true
    pub fn lookup_excluding<F>(
        &self,
        timestamp: NaiveDateTime,
        asset: &str,
        window: TimeDelta,
        skip: F,
    ) -> Option<(&FeeKey, Decimal)>
    where
        F: Fn(&FeeKey) -> bool,
    {
        let lower = FeeKey {
            timestamp: timestamp
                .checked_sub_signed(window)
                .unwrap_or(NaiveDateTime::MIN),
            asset: String::new(),
        };

        self.fees
            .range(lower..)
            .take_while(|(key, _)| key.timestamp - timestamp < window)
            .find(|(key, _)| {
                key.asset == asset && (key.timestamp - timestamp).abs() < window && !skip(*key)
            })
            .map(|(key, quantity)| (key, quantity.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntryCategory;
    use std::str::FromStr;

    fn at(millis: i64) -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2024-03-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
            + TimeDelta::milliseconds(millis)
    }

    fn fee(millis: i64, asset: &str, quantity: &str) -> LedgerEntry {
        LedgerEntry::new(
            at(millis),
            EntryCategory::FeeOnWithdrawal,
            asset,
            Decimal::from_str(quantity).unwrap(),
        )
    }

    fn window() -> TimeDelta {
        TimeDelta::seconds(2)
    }

    #[test]
    fn test_build_sums_identical_keys() {
        let index = FeeIndex::build(&[
            fee(0, "ETH", "-0.001"),
            fee(0, "ETH", "-0.0005"),
            fee(0, "BTC", "-0.0001"),
            fee(1, "ETH", "-0.002"),
        ]);

        assert_eq!(index.len(), 3);
        let (_, amount) = index.lookup(at(0), "BTC", window()).unwrap();
        assert_eq!(amount, Decimal::from_str("0.0001").unwrap());

        let (key, summed) = index.lookup(at(0), "ETH", window()).unwrap();
        assert_eq!(key.timestamp, at(0));
        assert_eq!(summed, Decimal::from_str("0.0015").unwrap());
    }

    #[test]
    fn test_build_drops_keys_that_cancel_out() {
        let index = FeeIndex::build(&[
            fee(0, "ETH", "-0.001"),
            fee(0, "ETH", "0.001"),
            fee(1_500, "ETH", "-0.002"),
        ]);

        assert_eq!(index.len(), 1);
        let (key, amount) = index.lookup(at(0), "ETH", window()).unwrap();
        assert_eq!(key.timestamp, at(1_500));
        assert_eq!(amount, Decimal::from_str("0.002").unwrap());
    }

    #[test]
    fn test_build_with_only_cancelling_rows_is_empty() {
        let index = FeeIndex::build(&[fee(0, "BTC", "0.0001"), fee(0, "BTC", "-0.0001")]);
        assert!(index.is_empty());
        assert!(index.lookup(at(0), "BTC", window()).is_none());
    }

    #[test]
    fn test_lookup_within_window() {
        let index = FeeIndex::build(&[fee(100_500, "ETH", "-0.001")]);

        let (key, amount) = index.lookup(at(100_000), "ETH", window()).unwrap();
        assert_eq!(key.timestamp, at(100_500));
        assert_eq!(amount, Decimal::from_str("0.001").unwrap());
    }

    #[test]
    fn test_lookup_fee_before_withdrawal() {
        let index = FeeIndex::build(&[fee(-1_500, "ETH", "-0.001")]);
        assert!(index.lookup(at(0), "ETH", window()).is_some());
    }

    #[test]
    fn test_lookup_ignores_other_asset() {
        let index = FeeIndex::build(&[fee(0, "BTC", "-0.001")]);
        assert!(index.lookup(at(0), "ETH", window()).is_none());
    }

    #[test]
    fn test_lookup_window_is_strict() {
        let index = FeeIndex::build(&[fee(2_000, "ETH", "-0.001"), fee(-2_000, "ETH", "-0.002")]);
        assert!(index.lookup(at(0), "ETH", window()).is_none());

        let index = FeeIndex::build(&[fee(1_999, "ETH", "-0.001")]);
        assert!(index.lookup(at(0), "ETH", window()).is_some());
    }

    #[test]
    fn test_lookup_boundary_key_with_later_asset_is_excluded() {
        // Sits exactly on the lower range bound but with a non-empty asset.
        let index = FeeIndex::build(&[fee(-2_000, "ZZZ", "-1")]);
        assert!(index.lookup(at(0), "ZZZ", window()).is_none());
    }

    #[test]
    fn test_lookup_returns_first_in_index_order() {
        let index = FeeIndex::build(&[fee(1_000, "ETH", "-0.002"), fee(-1_000, "ETH", "-0.001")]);

        let (key, amount) = index.lookup(at(0), "ETH", window()).unwrap();
        assert_eq!(key.timestamp, at(-1_000));
        assert_eq!(amount, Decimal::from_str("0.001").unwrap());
    }

    #[test]
    fn test_lookup_excluding_skips_claimed_keys() {
        let index = FeeIndex::build(&[fee(-1_000, "ETH", "-0.001"), fee(1_000, "ETH", "-0.002")]);
        let claimed = FeeKey {
            timestamp: at(-1_000),
            asset: "ETH".to_string(),
        };

        let (key, _) = index
            .lookup_excluding(at(0), "ETH", window(), |key| *key == claimed)
            .unwrap();
        assert_eq!(key.timestamp, at(1_000));
    }

    #[test]
    fn test_lookup_on_empty_index() {
        let index = FeeIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.lookup(at(0), "ETH", window()).is_none());
    }
}
