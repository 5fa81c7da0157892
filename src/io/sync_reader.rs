//! Synchronous statement reader with iterator interface
//!
//! Provides a streaming iterator over raw statement rows from a CSV file.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Design
//!
//! Lines are read up front until one resolves to a header, so statements
//! that open with a title or a period line still read. The header line is
//! then chained back in front of the rest of the stream so the CSV reader
//! sees it, and the header is resolved into a [`ColumnLayout`] before a
//! single row is read: a missing column fails early. Row line numbers are
//! physical lines of the file, preamble included.
//!
//! ```no_run
//! use ledger_reconciler::io::sync_reader::SyncReader;
//! use ledger_reconciler::io::ReaderConfig;
//! use std::path::Path;
//!
//! let reader = SyncReader::open(Path::new("statement.csv"), &ReaderConfig::default()).unwrap();
//! for row in reader {
//!     println!("{:?}", row);
//! }
//! ```

use crate::io::csv_format::{ColumnLayout, HeaderSearch, RawRow, RawStatement, ReaderConfig};
use crate::io::line_index::{LineCounting, LineIndex};
use crate::types::ReconcileError;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::Path;

type Source<R> = LineCounting<io::Chain<Cursor<Vec<u8>>, R>>;

/// Synchronous statement reader
///
/// Yields one [`RawRow`] per data record. Structural CSV errors are
/// yielded as `Err` and are fatal for the statement.
#[derive(Debug)]
pub struct SyncReader<R: BufRead> {
    reader: csv::Reader<Source<R>>,
    layout: ColumnLayout,
    lines: LineIndex,
    delimiter: u8,
    record: StringRecord,
}

impl SyncReader<BufReader<File>> {
    /// Open a statement file
    ///
    /// # Errors
    ///
    /// `FileNotFound` if the path does not exist, `IoError` if it cannot be
    /// read, `MissingRequiredField` if no header with every required column
    /// is found.
    pub fn open(path: &Path, config: &ReaderConfig) -> Result<Self, ReconcileError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ReconcileError::file_not_found(path),
            _ => ReconcileError::from(e),
        })?;

        Self::new(BufReader::with_capacity(8 * 1024, file), config)
    }
}

impl<R: BufRead> SyncReader<R> {
    /// Create a reader over any buffered source
    pub fn new(mut source: R, config: &ReaderConfig) -> Result<Self, ReconcileError> {
        let mut search = HeaderSearch::new(config);
        let header = loop {
            let mut line = Vec::new();
            source.read_until(b'\n', &mut line)?;
            if let Some(header) = search.offer(line)? {
                break header;
            }
        };

        let lines = LineIndex::starting_after(header.preamble_lines);
        let source = LineCounting::new(Cursor::new(header.line).chain(source), lines.clone());
        let mut reader = ReaderBuilder::new()
            .delimiter(header.delimiter)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);

        let layout = ColumnLayout::from_headers(reader.headers()?.iter(), &config.aliases)?;
        tracing::debug!(
            preamble_lines = header.preamble_lines,
            delimiter = %char::from(header.delimiter),
            "Statement header resolved: {:?}",
            layout
        );

        Ok(Self {
            reader,
            layout,
            lines,
            delimiter: header.delimiter,
            record: StringRecord::new(),
        })
    }

    /// Read every remaining row
    ///
    /// # Errors
    ///
    /// The first structural CSV error.
    pub fn read_statement(self) -> Result<RawStatement, ReconcileError> {
        let delimiter = self.delimiter;
        let rows = self.collect::<Result<Vec<_>, _>>()?;
        Ok(RawStatement { delimiter, rows })
    }
}

impl<R: BufRead> Iterator for SyncReader<R> {
    type Item = Result<RawRow, ReconcileError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.record) {
            Ok(true) => {
                let line = self
                    .record
                    .position()
                    .map(|pos| self.lines.line_at(pos.byte()))
                    .unwrap_or_default();
                let record = &self.record;
                Some(Ok(self.layout.extract(line, |i| record.get(i))))
            }
            Ok(false) => None,
            Err(e) => Some(Err(e.into())),
        }
    }
}
