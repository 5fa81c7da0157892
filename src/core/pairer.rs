//! Order-execution pairing
//!
//! The exchange logs each order execution as two independent rows, one per
//! leg, with no shared identifier. The pairer rebuilds two-sided trades from
//! timestamp proximity and opposite signs alone.
//!
//! # Algorithm
//!
//! Greedy, earliest-candidate-wins:
//!
//! ```text
//! for i in 0..n, skipping consumed:
//!     j = first unconsumed index after i with
//!         sign(q[i]) != sign(q[j]), both non-zero, and |t[j] - t[i]| < window
//!     if found: emit trade(i, j), consume i and j
//! ```
//!
//! The scan needs the legs in ascending time order so it can stop at the
//! first candidate past the window. Input that is out of order is
//! stable-sorted into a private copy first.
//!
//! The executions live in a slice that is never mutated; consumption is a
//! parallel `Vec<bool>`. This is not a minimum-Δt matching: when three legs
//! fall inside one window the earliest still-free candidate wins, which keeps
//! the pairing stable for a fixed input order. O(n²) in the worst case.

use crate::types::{AssetAmount, LedgerEntry, TransactionRecord};
use chrono::TimeDelta;
use std::borrow::Cow;

/// Result of pairing one execution stream
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PairingOutcome {
    /// One record per matched pair, in order of the earlier leg
    pub trades: Vec<TransactionRecord>,
    /// Legs with no counterpart, in input order
    pub unmatched: Vec<LedgerEntry>,
}

/// Greedy execution pairer
#[derive(Debug, Clone)]
pub struct ExecutionPairer {
    window: TimeDelta,
    source_name: String,
}

impl ExecutionPairer {
    /// Create a pairer for the given window
    pub fn new(window: TimeDelta, source_name: impl Into<String>) -> Self {
        ExecutionPairer {
            window,
            source_name: source_name.into(),
        }
    }

    /// Pair an execution stream
    ///
    /// Legs are taken in ascending timestamp order, ties in input order.
    /// Sorted input is used as is.
    pub fn pair(&self, executions: &[LedgerEntry]) -> PairingOutcome {
        let executions = in_time_order(executions);
        let executions = executions.as_ref();

        let n = executions.len();
        let mut consumed = vec![false; n];
        let mut trades = Vec::with_capacity(n / 2);

        for i in 0..n {
            if consumed[i] {
                continue;
            }

            let Some(j) = self.find_counterpart(executions, &consumed, i) else {
                continue;
            };

            consumed[i] = true;
            consumed[j] = true;
            trades.push(self.build_trade(&executions[i], &executions[j]));
        }

        let unmatched: Vec<LedgerEntry> = executions
            .iter()
            .zip(&consumed)
            .filter(|(_, used)| !**used)
            .map(|(entry, _)| entry.clone())
            .collect();

        for entry in &unmatched {
            tracing::debug!(
                line = entry.line,
                asset = %entry.asset,
                quantity = %entry.quantity,
                "Execution leg left without counterpart"
            );
        }

        PairingOutcome { trades, unmatched }
    }

    /// First unconsumed `j > i` forming a valid pair with `i`
    fn find_counterpart(
        &self,
        executions: &[LedgerEntry],
        consumed: &[bool],
        i: usize,
    ) -> Option<usize> {
        let leg = &executions[i];

        for (j, candidate) in executions.iter().enumerate().skip(i + 1) {
            let delta = candidate.timestamp - leg.timestamp;
            // Sorted input: nothing further can be inside the window.
            if delta >= self.window {
                break;
            }
            if consumed[j] {
                continue;
            }
            if opposite_signs(leg, candidate) && delta.abs() < self.window {
                return Some(j);
            }
        }

        None
    }

    fn build_trade(&self, first: &LedgerEntry, second: &LedgerEntry) -> TransactionRecord {
        let (outflow, inflow) = if first.quantity.is_sign_negative() {
            (first, second)
        } else {
            (second, first)
        };

        tracing::debug!(
            sent_asset = %outflow.asset,
            received_asset = %inflow.asset,
            "Paired execution legs at lines {} and {}",
            first.line,
            second.line
        );

        TransactionRecord::trade(
            first.timestamp.min(second.timestamp),
            AssetAmount::new(outflow.quantity, outflow.asset.clone()),
            AssetAmount::new(inflow.quantity, inflow.asset.clone()),
            &self.source_name,
        )
    }
}

fn in_time_order(executions: &[LedgerEntry]) -> Cow<'_, [LedgerEntry]> {
    if executions
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp)
    {
        return Cow::Borrowed(executions);
    }

    tracing::debug!("Execution legs out of time order, sorting a copy");
    let mut sorted = executions.to_vec();
    sorted.sort_by_key(|entry| entry.timestamp);
    Cow::Owned(sorted)
}

/// `a * b < 0` without the multiplication
fn opposite_signs(a: &LedgerEntry, b: &LedgerEntry) -> bool {
    !a.quantity.is_zero()
        && !b.quantity.is_zero()
        && a.quantity.is_sign_negative() != b.quantity.is_sign_negative()
}
