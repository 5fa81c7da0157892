//! Asynchronous statement reader with batch interface
//!
//! Provides a streaming interface over raw statement rows from a CSV file.
//! Supports batch reading for the async strategy.
//!
//! # Architecture
//!
//! ```text
//! tokio File → compat → BufReader → (header search) → header line chained back
//!            → line counting → csv-async → AsyncReader
//!                                              ↓
//!                                     csv_format module
//!                              (HeaderSearch, ColumnLayout, RawRow)
//! ```

use crate::io::csv_format::{ColumnLayout, HeaderSearch, RawRow, RawStatement, ReaderConfig};
use crate::io::line_index::{LineCounting, LineIndex};
use crate::types::ReconcileError;
use csv_async::AsyncReaderBuilder;
use futures::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader, Chain, Cursor};
use futures::stream::StreamExt;
use std::path::Path;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

/// Source type of a statement opened from disk
pub type FileSource = Compat<tokio::fs::File>;

type Source<R> = LineCounting<Chain<Cursor<Vec<u8>>, BufReader<R>>>;

/// Asynchronous statement reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncReader<Source<R>>,
    layout: ColumnLayout,
    lines: LineIndex,
    delimiter: u8,
}

impl AsyncReader<FileSource> {
    /// Open a statement file
    pub async fn open(path: &Path, config: &ReaderConfig) -> Result<Self, ReconcileError> {
        let file = tokio::fs::File::open(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ReconcileError::file_not_found(path),
            _ => ReconcileError::from(e),
        })?;

        AsyncReader::new(file.compat(), config).await
    }
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a reader: find the header past any preamble, then resolve its layout
    pub async fn new(reader: R, config: &ReaderConfig) -> Result<Self, ReconcileError> {
        let mut source = BufReader::with_capacity(8 * 1024, reader);
        let mut search = HeaderSearch::new(config);
        let header = loop {
            let mut line = Vec::new();
            source.read_until(b'\n', &mut line).await?;
            if let Some(header) = search.offer(line)? {
                break header;
            }
        };

        let lines = LineIndex::starting_after(header.preamble_lines);
        let rewound = AsyncReadExt::chain(Cursor::new(header.line), source);
        let mut csv_reader = AsyncReaderBuilder::new()
            .delimiter(header.delimiter)
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_reader(LineCounting::new(rewound, lines.clone()));

        let layout =
            ColumnLayout::from_headers(csv_reader.headers().await?.iter(), &config.aliases)?;

        Ok(Self {
            csv_reader,
            layout,
            lines,
            delimiter: header.delimiter,
        })
    }

    /// Read up to `batch_size` rows
    ///
    /// Returns an empty vector at the end of the file. A structural CSV error
    /// aborts the read.
    pub async fn read_batch(&mut self, batch_size: usize) -> Result<Vec<RawRow>, ReconcileError> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.records();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(record)) => {
                    let line = record
                        .position()
                        .map(|pos| self.lines.line_at(pos.byte()))
                        .unwrap_or_default();
                    batch.push(self.layout.extract(line, |i| record.get(i)));
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }

        Ok(batch)
    }

    /// Read every remaining row, `batch_size` at a time
    pub async fn read_statement(
        &mut self,
        batch_size: usize,
    ) -> Result<RawStatement, ReconcileError> {
        let mut rows = Vec::new();
        loop {
            let batch = self.read_batch(batch_size.max(1)).await?;
            if batch.is_empty() {
                return Ok(RawStatement {
                    delimiter: self.delimiter,
                    rows,
                });
            }
            rows.extend(batch);
        }
    }
}
