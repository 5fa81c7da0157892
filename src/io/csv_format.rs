//! CSV format handling for ledger statements and the Koinly export
//!
//! This module centralizes all CSV format concerns, providing:
//! - Column aliasing and header layout resolution for both statement layouts
//! - Header search past preamble lines
//! - Raw row extraction shared by the sync and async readers
//! - Delimiter sniffing and numeric-locale parsing
//! - Koinly universal layout serialization
//!
//! # Statement layouts
//!
//! The ledger layout (`Data`, `Categoria`, `Moeda`, `Quantidade`, `Saldo`)
//! has one row per leg and goes through pairing. The settlement layout
//! (`Ativo`, `Operação Tipo`, `Operação Data/Hora`, net and gross amounts)
//! has one row per settled operation. A header naming both `Ativo` and
//! `Operação Tipo` selects the settlement layout.
//!
//! All functions are pure (no I/O besides the given writer) for easy testing.

use crate::types::{AssetAmount, ReconcileError, TransactionRecord};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::str::FromStr;

/// Canonical timestamp column
pub const COLUMN_TIMESTAMP: &str = "Data";
/// Canonical category column
pub const COLUMN_CATEGORY: &str = "Categoria";
/// Canonical asset column
pub const COLUMN_ASSET: &str = "Moeda";
/// Canonical quantity column
pub const COLUMN_QUANTITY: &str = "Quantidade";
/// Canonical running balance column
pub const COLUMN_BALANCE: &str = "Saldo";

/// Settlement layout: asset column
pub const SETTLEMENT_ASSET: &str = "Ativo";
/// Settlement layout: operation type column
pub const SETTLEMENT_OPERATION: &str = "Operação Tipo";
/// Settlement layout: timestamp column
pub const SETTLEMENT_TIMESTAMP: &str = "Operação Data/Hora";
/// Settlement layout: BRL amount after fees
pub const SETTLEMENT_NET_BRL: &str = "Liquido BRL";
/// Settlement layout: BRL amount before fees
pub const SETTLEMENT_GROSS_BRL: &str = "Bruto BRL";
/// Settlement layout: asset amount after fees
pub const SETTLEMENT_NET_CRYPTO: &str = "Liquido Cripto";
/// Settlement layout: asset amount before fees
pub const SETTLEMENT_GROSS_CRYPTO: &str = "Bruto Cripto";

/// Lines scanned for a header before giving up
pub const HEADER_SEARCH_LIMIT: u64 = 20;

/// Header of the Koinly universal layout, in column order
pub const KOINLY_HEADERS: [&str; 12] = [
    "Date",
    "Sent Amount",
    "Sent Currency",
    "Received Amount",
    "Received Currency",
    "Fee Amount",
    "Fee Currency",
    "Net Worth Amount",
    "Net Worth Currency",
    "Label",
    "Description",
    "TxHash",
];

const KOINLY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Mapping from alternate header names to canonical column names
///
/// Lookups are case-insensitive. Headers without an alias are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAliases {
    aliases: HashMap<String, String>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        let mut aliases = ColumnAliases {
            aliases: HashMap::new(),
        };
        for (canonical, english) in [
            (COLUMN_TIMESTAMP, "date"),
            (COLUMN_CATEGORY, "category"),
            (COLUMN_ASSET, "asset"),
            (COLUMN_QUANTITY, "quantity"),
            (COLUMN_BALANCE, "balance"),
        ] {
            aliases.insert(canonical, canonical);
            aliases.insert(english, canonical);
        }
        for (canonical, unaccented) in [
            (SETTLEMENT_ASSET, "ativo"),
            (SETTLEMENT_OPERATION, "operacao tipo"),
            (SETTLEMENT_TIMESTAMP, "operacao data/hora"),
            (SETTLEMENT_NET_BRL, "líquido brl"),
            (SETTLEMENT_GROSS_BRL, "bruto brl"),
            (SETTLEMENT_NET_CRYPTO, "líquido cripto"),
            (SETTLEMENT_GROSS_CRYPTO, "bruto cripto"),
        ] {
            aliases.insert(canonical, canonical);
            aliases.insert(unaccented, canonical);
        }
        aliases
    }
}

impl ColumnAliases {
    /// Alias set with no mappings at all
    pub fn empty() -> Self {
        ColumnAliases {
            aliases: HashMap::new(),
        }
    }

    /// Map `alternate` onto `canonical`
    pub fn insert(&mut self, alternate: &str, canonical: &str) {
        self.aliases
            .insert(alternate.to_lowercase(), canonical.to_string());
    }

    /// Builder-style [`ColumnAliases::insert`]
    pub fn with_alias(mut self, alternate: &str, canonical: &str) -> Self {
        self.insert(alternate, canonical);
        self
    }

    /// Canonical name for a cleaned header cell
    pub fn canonical(&self, header: &str) -> String {
        self.aliases
            .get(&header.to_lowercase())
            .cloned()
            .unwrap_or_else(|| header.to_string())
    }
}

/// Configuration of the statement readers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Header aliases
    pub aliases: ColumnAliases,
    /// chrono format for the timestamp column; detected when `None`
    pub date_format: Option<String>,
    /// Field delimiter; sniffed from the header line when `None`
    pub delimiter: Option<u8>,
}

impl ReaderConfig {
    /// Delimiter to use for a statement starting with `header_line`
    pub fn delimiter_for(&self, header_line: &[u8]) -> u8 {
        self.delimiter
            .unwrap_or_else(|| sniff_delimiter(&String::from_utf8_lossy(header_line)))
    }
}

/// Strip a UTF-8 BOM, surrounding quotes and whitespace from a header cell
pub fn clean_header_cell(cell: &str) -> String {
    cell.trim_start_matches('\u{feff}')
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

/// Pick the field delimiter from the header line
///
/// `;` when the line holds more semicolons than commas, `,` otherwise.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let semicolons = header_line.matches(';').count();
    let commas = header_line.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Decimal separator of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecimalSeparator {
    /// `1,234.5`
    #[default]
    Point,
    /// `1.234,5`
    Comma,
}

impl DecimalSeparator {
    /// Decimal separator used by a statement
    ///
    /// `;`-delimited statements are Brazilian exports and write a decimal
    /// comma. Otherwise any amount cell where a comma follows the last
    /// point gives the comma away.
    pub fn detect<'c>(delimiter: u8, amount_cells: impl IntoIterator<Item = &'c str>) -> Self {
        if delimiter == b';' {
            return DecimalSeparator::Comma;
        }
        let comma_last = amount_cells.into_iter().any(|cell| {
            matches!((cell.rfind('.'), cell.rfind(',')), (Some(dot), Some(comma)) if comma > dot)
        });
        if comma_last {
            DecimalSeparator::Comma
        } else {
            DecimalSeparator::Point
        }
    }
}

/// Parse a number written with either a decimal point or a decimal comma
///
/// - both `.` and `,` present: the rightmost one is the decimal separator,
///   the other one is a thousands separator
/// - one kind present more than once: thousands separator
/// - a single `,`: decimal comma
/// - a single `.`: decimal point, except in a decimal-comma statement where
///   it is followed by exactly three digits (`1.000` is a thousand there)
///
/// Quotes and whitespace anywhere in the cell are ignored. Returns `None`
/// for blank or non-numeric input.
pub fn parse_locale_decimal(raw: &str, separator: DecimalSeparator) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != '"' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (None, Some(_)) if cleaned.matches(',').count() > 1 => cleaned.replace(',', ""),
        (None, Some(_)) => cleaned.replace(',', "."),
        (Some(_), None) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        (Some(dot), None)
            if separator == DecimalSeparator::Comma && is_thousands_group(&cleaned, dot) =>
        {
            cleaned.replace('.', "")
        }
        _ => cleaned,
    };

    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}

/// `1.000`, `-12.500`: one to three leading digits, no leading zero, and
/// exactly three digits after the separator
fn is_thousands_group(number: &str, separator: usize) -> bool {
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    let head = number[..separator].trim_start_matches(['-', '+']);
    let tail = &number[separator + 1..];

    digits(head) && head.len() <= 3 && !head.starts_with('0') && digits(tail) && tail.len() == 3
}

/// Positions of the ledger layout columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerColumns {
    timestamp: usize,
    category: usize,
    asset: usize,
    quantity: usize,
    balance: usize,
}

/// Positions of the settlement layout columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementColumns {
    asset: usize,
    operation: usize,
    timestamp: usize,
    net_brl: usize,
    gross_brl: usize,
    net_crypto: usize,
    gross_crypto: usize,
}

/// Column positions of a statement, for whichever layout its header has
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLayout {
    Ledger(LedgerColumns),
    Settlement(SettlementColumns),
}

impl ColumnLayout {
    /// Resolve the layout from the raw header cells
    ///
    /// A header naming both `Ativo` and `Operação Tipo` (after alias
    /// normalization) is a settlement header; anything else must be a
    /// ledger header. The unit price column of the settlement layout is
    /// not used and may be absent.
    ///
    /// # Errors
    ///
    /// `MissingRequiredField` naming the first required column that is
    /// absent, with the normalized header list.
    pub fn from_headers<'h>(
        headers: impl IntoIterator<Item = &'h str>,
        aliases: &ColumnAliases,
    ) -> Result<Self, ReconcileError> {
        let names: Vec<String> = headers
            .into_iter()
            .map(|cell| aliases.canonical(&clean_header_cell(cell)))
            .collect();

        let position = |field: &str| {
            names
                .iter()
                .position(|name| name == field)
                .ok_or_else(|| ReconcileError::missing_required_field(field, &names))
        };

        let is_settlement = [SETTLEMENT_ASSET, SETTLEMENT_OPERATION]
            .iter()
            .all(|field| names.iter().any(|name| name == field));

        if is_settlement {
            Ok(ColumnLayout::Settlement(SettlementColumns {
                asset: position(SETTLEMENT_ASSET)?,
                operation: position(SETTLEMENT_OPERATION)?,
                timestamp: position(SETTLEMENT_TIMESTAMP)?,
                net_brl: position(SETTLEMENT_NET_BRL)?,
                gross_brl: position(SETTLEMENT_GROSS_BRL)?,
                net_crypto: position(SETTLEMENT_NET_CRYPTO)?,
                gross_crypto: position(SETTLEMENT_GROSS_CRYPTO)?,
            }))
        } else {
            Ok(ColumnLayout::Ledger(LedgerColumns {
                timestamp: position(COLUMN_TIMESTAMP)?,
                category: position(COLUMN_CATEGORY)?,
                asset: position(COLUMN_ASSET)?,
                quantity: position(COLUMN_QUANTITY)?,
                balance: position(COLUMN_BALANCE)?,
            }))
        }
    }

    /// Pull the layout's cells out of one record
    ///
    /// `field` returns the cell at a position; short records yield empty
    /// cells rather than errors.
    pub fn extract<'r, F>(&self, line: u64, field: F) -> RawRow
    where
        F: Fn(usize) -> Option<&'r str>,
    {
        let cell = |index: usize| field(index).unwrap_or_default().trim().to_string();

        match self {
            ColumnLayout::Ledger(columns) => RawRow::Ledger(RawLedgerRow {
                line,
                timestamp: cell(columns.timestamp),
                category: cell(columns.category),
                asset: cell(columns.asset),
                quantity: cell(columns.quantity),
                balance: cell(columns.balance),
            }),
            ColumnLayout::Settlement(columns) => RawRow::Settlement(RawSettlementRow {
                line,
                timestamp: cell(columns.timestamp),
                operation: cell(columns.operation),
                asset: cell(columns.asset),
                net_brl: cell(columns.net_brl),
                gross_brl: cell(columns.gross_brl),
                net_crypto: cell(columns.net_crypto),
                gross_crypto: cell(columns.gross_crypto),
            }),
        }
    }
}

/// Ledger row with the canonical cells still unparsed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawLedgerRow {
    pub line: u64,
    pub timestamp: String,
    pub category: String,
    pub asset: String,
    pub quantity: String,
    pub balance: String,
}

/// Settlement row with its cells still unparsed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawSettlementRow {
    pub line: u64,
    pub timestamp: String,
    pub operation: String,
    pub asset: String,
    pub net_brl: String,
    pub gross_brl: String,
    pub net_crypto: String,
    pub gross_crypto: String,
}

/// Statement row of either layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRow {
    Ledger(RawLedgerRow),
    Settlement(RawSettlementRow),
}

impl RawRow {
    /// Physical line of the row in its file
    pub fn line(&self) -> u64 {
        match self {
            RawRow::Ledger(row) => row.line,
            RawRow::Settlement(row) => row.line,
        }
    }

    /// Unparsed timestamp cell
    pub fn timestamp(&self) -> &str {
        match self {
            RawRow::Ledger(row) => &row.timestamp,
            RawRow::Settlement(row) => &row.timestamp,
        }
    }

    /// Unparsed numeric cells
    pub fn amount_cells(&self) -> Vec<&str> {
        match self {
            RawRow::Ledger(row) => vec![&row.quantity, &row.balance],
            RawRow::Settlement(row) => {
                vec![&row.net_brl, &row.gross_brl, &row.net_crypto, &row.gross_crypto]
            }
        }
    }
}

/// Every row of one statement, with the delimiter it was read with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    pub delimiter: u8,
    pub rows: Vec<RawRow>,
}

impl RawStatement {
    /// Decimal separator of the statement's amounts
    pub fn decimal_separator(&self) -> DecimalSeparator {
        DecimalSeparator::detect(
            self.delimiter,
            self.rows.iter().flat_map(|row| row.amount_cells()),
        )
    }
}

/// Header line found by a [`HeaderSearch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementHeader {
    /// The header line, BOM stripped, terminator kept
    pub line: Vec<u8>,
    /// Delimiter of the statement
    pub delimiter: u8,
    /// Lines before the header
    pub preamble_lines: u64,
}

/// Locates the header of a statement that may start with preamble lines
///
/// Readers feed lines one at a time until a line resolves to a
/// [`ColumnLayout`]. The search gives up at end of input or after
/// [`HEADER_SEARCH_LIMIT`] lines, reporting why the first line failed.
#[derive(Debug)]
pub struct HeaderSearch<'c> {
    config: &'c ReaderConfig,
    scanned: u64,
    first_error: Option<ReconcileError>,
}

impl<'c> HeaderSearch<'c> {
    pub fn new(config: &'c ReaderConfig) -> Self {
        HeaderSearch {
            config,
            scanned: 0,
            first_error: None,
        }
    }

    /// Offer the next line, terminator included; an empty line means end of input
    ///
    /// # Errors
    ///
    /// `MissingRequiredField` once the search is over without a header.
    pub fn offer(&mut self, mut line: Vec<u8>) -> Result<Option<StatementHeader>, ReconcileError> {
        if line.is_empty() {
            return Err(self.give_up());
        }
        if self.scanned == 0 && line.starts_with(UTF8_BOM) {
            line.drain(..UTF8_BOM.len());
        }

        let text = String::from_utf8_lossy(&line)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        let delimiter = self.config.delimiter_for(text.as_bytes());

        match ColumnLayout::from_headers(text.split(char::from(delimiter)), &self.config.aliases) {
            Ok(_) => {
                let preamble_lines = self.scanned;
                return Ok(Some(StatementHeader {
                    line,
                    delimiter,
                    preamble_lines,
                }));
            }
            Err(error) => {
                self.first_error.get_or_insert(error);
            }
        }

        self.scanned += 1;
        if self.scanned >= HEADER_SEARCH_LIMIT {
            return Err(self.give_up());
        }
        Ok(None)
    }

    fn give_up(&mut self) -> ReconcileError {
        self.first_error
            .take()
            .unwrap_or_else(|| ReconcileError::missing_required_field(COLUMN_TIMESTAMP, &[]))
    }
}

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// One line of the Koinly universal layout
#[derive(Debug, Serialize)]
struct KoinlyRow<'a> {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Sent Amount")]
    sent_amount: Option<String>,
    #[serde(rename = "Sent Currency")]
    sent_currency: Option<&'a str>,
    #[serde(rename = "Received Amount")]
    received_amount: Option<String>,
    #[serde(rename = "Received Currency")]
    received_currency: Option<&'a str>,
    #[serde(rename = "Fee Amount")]
    fee_amount: Option<String>,
    #[serde(rename = "Fee Currency")]
    fee_currency: Option<&'a str>,
    #[serde(rename = "Net Worth Amount")]
    net_worth_amount: Option<String>,
    #[serde(rename = "Net Worth Currency")]
    net_worth_currency: Option<&'a str>,
    #[serde(rename = "Label")]
    label: Option<&'a str>,
    #[serde(rename = "Description")]
    description: &'a str,
    #[serde(rename = "TxHash")]
    tx_hash: Option<&'a str>,
}

fn split(amount: &Option<AssetAmount>) -> (Option<String>, Option<&str>) {
    match amount {
        Some(amount) => (
            Some(amount.amount.normalize().to_string()),
            Some(amount.asset.as_str()),
        ),
        None => (None, None),
    }
}

impl<'a> From<&'a TransactionRecord> for KoinlyRow<'a> {
    fn from(record: &'a TransactionRecord) -> Self {
        let (sent_amount, sent_currency) = split(&record.sent);
        let (received_amount, received_currency) = split(&record.received);
        let (fee_amount, fee_currency) = split(&record.fee);
        let (net_worth_amount, net_worth_currency) = split(&record.net_worth);

        KoinlyRow {
            date: record.timestamp.format(KOINLY_DATE_FORMAT).to_string(),
            sent_amount,
            sent_currency,
            received_amount,
            received_currency,
            fee_amount,
            fee_currency,
            net_worth_amount,
            net_worth_currency,
            label: record.label,
            description: &record.description,
            tx_hash: None,
        }
    }
}

/// Write records in the Koinly universal layout
///
/// Every field is quoted. The header is always written, also for an empty
/// record list.
pub fn write_records_csv(
    records: &[TransactionRecord],
    output: &mut dyn Write,
) -> Result<(), ReconcileError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(output);

    writer
        .write_record(KOINLY_HEADERS)
        .map_err(|e| ReconcileError::output(format!("Failed to write CSV header: {}", e)))?;

    for record in records {
        writer
            .serialize(KoinlyRow::from(record))
            .map_err(|e| ReconcileError::output(format!("Failed to write record: {}", e)))?;
    }

    writer
        .flush()
        .map_err(|e| ReconcileError::output(format!("Failed to flush output: {}", e)))?;

    Ok(())
}
