//! I/O module
//!
//! Handles statement parsing and export.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (column layout, locale numbers, Koinly output)
//! - `line_index` - Physical line numbers for records, CRLF and blank lines included
//! - `normalizer` - Raw rows to typed, time-ordered ledger entries or settled operations
//! - `sync_reader` - Synchronous statement reader with iterator interface
//! - `async_reader` - Asynchronous statement reader with batch reading interface

pub mod async_reader;
pub mod csv_format;
pub mod line_index;
pub mod normalizer;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    parse_locale_decimal, sniff_delimiter, write_records_csv, ColumnAliases, ColumnLayout,
    DecimalSeparator, HeaderSearch, RawLedgerRow, RawRow, RawSettlementRow, RawStatement,
    ReaderConfig, StatementHeader,
};
pub use line_index::{LineCounting, LineIndex};
pub use normalizer::{detect_date_format, LedgerNormalizer, NormalizedLedger};
pub use sync_reader::SyncReader;
