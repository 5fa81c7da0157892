//! Row normalization
//!
//! Turns raw statement rows into typed, time-ordered [`LedgerEntry`] values,
//! or [`SettledOperation`] values for settlement statements. Rows whose
//! timestamp or amounts cannot be parsed are dropped, logged and counted;
//! they never abort the run.

use crate::io::csv_format::{
    parse_locale_decimal, DecimalSeparator, RawLedgerRow, RawRow, RawSettlementRow, RawStatement,
};
use crate::types::{
    EntryCategory, LedgerEntry, OperationKind, ReconcileError, RunDiagnostics, SettledOperation,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// Timestamp layouts seen in statements, in detection priority order
pub const DATE_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// How many non-empty timestamp cells take part in format detection
pub const DETECTION_SAMPLE_SIZE: usize = 5;

/// Pick the timestamp layout by majority vote over the first cells
///
/// Each of the first [`DETECTION_SAMPLE_SIZE`] non-empty samples votes for
/// the first layout in [`DATE_FORMATS`] it parses with. Ties go to the
/// layout listed first. `None` when no sample parses at all.
pub fn detect_date_format<'a>(samples: impl IntoIterator<Item = &'a str>) -> Option<&'static str> {
    let mut votes = [0usize; DATE_FORMATS.len()];

    for sample in samples
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(DETECTION_SAMPLE_SIZE)
    {
        if let Some(index) = DATE_FORMATS
            .iter()
            .position(|format| NaiveDateTime::parse_from_str(sample, format).is_ok())
        {
            votes[index] += 1;
        }
    }

    let mut best: Option<usize> = None;
    for (index, count) in votes.iter().enumerate() {
        if *count > 0 && best.map_or(true, |b| *count > votes[b]) {
            best = Some(index);
        }
    }
    best.map(|index| DATE_FORMATS[index])
}

/// Entries of one statement, ready for the engine
///
/// A statement has one layout, so only one of `entries` and `operations`
/// is ever filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedLedger {
    /// Entries sorted ascending by timestamp, ties in file order
    pub entries: Vec<LedgerEntry>,
    /// Settled operations sorted ascending by timestamp, ties in file order
    pub operations: Vec<SettledOperation>,
    /// Dropped-row counters
    pub diagnostics: RunDiagnostics,
}

/// Parses raw rows into ledger entries
#[derive(Debug, Clone, Default)]
pub struct LedgerNormalizer {
    date_format: Option<String>,
}

impl LedgerNormalizer {
    /// Create a normalizer, optionally pinning the timestamp layout
    pub fn new(date_format: Option<String>) -> Self {
        LedgerNormalizer { date_format }
    }

    /// Normalize all rows of one statement
    ///
    /// Amounts are read with the statement's decimal separator, see
    /// [`RawStatement::decimal_separator`].
    pub fn normalize(&self, statement: RawStatement) -> NormalizedLedger {
        let separator = statement.decimal_separator();
        let format = self.resolve_format(&statement.rows);
        let mut ledger = NormalizedLedger::default();

        for row in statement.rows {
            let parsed = match row {
                RawRow::Ledger(row) => parse_ledger_row(row, &format, separator)
                    .map(|entry| ledger.entries.push(entry)),
                RawRow::Settlement(row) => parse_settlement_row(row, &format, separator)
                    .map(|operation| ledger.operations.push(operation)),
            };
            if let Err(e) = parsed {
                tracing::warn!("{}, row skipped", e);
                ledger.diagnostics.record_entry_error(&e);
            }
        }

        if ledger.diagnostics.invalid_timestamps > 0 {
            tracing::warn!(
                "{} row(s) with an invalid timestamp were removed",
                ledger.diagnostics.invalid_timestamps
            );
        }
        if ledger.diagnostics.invalid_quantities > 0 {
            tracing::warn!(
                "{} row(s) with an invalid quantity were removed",
                ledger.diagnostics.invalid_quantities
            );
        }

        ledger.entries.sort_by_key(|entry| entry.timestamp);
        ledger.operations.sort_by_key(|operation| operation.timestamp);
        ledger
    }

    fn resolve_format(&self, rows: &[RawRow]) -> String {
        if let Some(format) = &self.date_format {
            return format.clone();
        }

        match detect_date_format(rows.iter().map(RawRow::timestamp)) {
            Some(format) => {
                tracing::debug!("Detected timestamp format '{}'", format);
                format.to_string()
            }
            None => {
                let fallback = DATE_FORMATS[0];
                if !rows.is_empty() {
                    tracing::warn!(
                        "Could not detect the timestamp format, using fallback '{}'",
                        fallback
                    );
                }
                fallback.to_string()
            }
        }
    }
}

fn parse_timestamp(raw: &str, line: u64, format: &str) -> Result<NaiveDateTime, ReconcileError> {
    NaiveDateTime::parse_from_str(raw.trim(), format)
        .map_err(|_| ReconcileError::unparseable_timestamp(line, raw))
}

fn parse_ledger_row(
    row: RawLedgerRow,
    format: &str,
    separator: DecimalSeparator,
) -> Result<LedgerEntry, ReconcileError> {
    let timestamp = parse_timestamp(&row.timestamp, row.line, format)?;

    let quantity = parse_locale_decimal(&row.quantity, separator)
        .ok_or_else(|| ReconcileError::invalid_quantity(row.line, &row.quantity))?;

    Ok(LedgerEntry {
        timestamp,
        category: EntryCategory::from_label(&row.category),
        asset: row.asset,
        quantity,
        running_balance: parse_locale_decimal(&row.balance, separator),
        line: row.line,
    })
}

fn parse_settlement_row(
    row: RawSettlementRow,
    format: &str,
    separator: DecimalSeparator,
) -> Result<SettledOperation, ReconcileError> {
    let timestamp = parse_timestamp(&row.timestamp, row.line, format)?;
    // Blank amount cells are zero; anything else must parse.
    let amount = |cell: &str| {
        if cell.trim_matches(|c: char| c == '"' || c.is_whitespace()).is_empty() {
            return Ok(Decimal::ZERO);
        }
        parse_locale_decimal(cell, separator)
            .ok_or_else(|| ReconcileError::invalid_quantity(row.line, cell))
    };

    Ok(SettledOperation {
        timestamp,
        kind: OperationKind::from_label(&row.operation, &row.asset),
        net_brl: amount(&row.net_brl)?,
        gross_brl: amount(&row.gross_brl)?,
        net_crypto: amount(&row.net_crypto)?,
        gross_crypto: amount(&row.gross_crypto)?,
        asset: row.asset,
        line: row.line,
    })
}
