//! Physical line numbers for CSV records
//!
//! The CSV parsers know where a record starts as a byte offset, but their
//! line counter is taken before the previous record's terminator is fully
//! consumed: it lags by one on CRLF files and does not count blank lines.
//! [`LineCounting`] sits between the source and the parser and notes the
//! offset of every line terminator it hands over; [`LineIndex`] turns a
//! record's start offset into the line its first character is on.

use futures::io::AsyncRead;
use std::collections::VecDeque;
use std::io::{self, Read};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

#[derive(Debug, Default)]
struct Terminators {
    /// `\r` and `\n` offsets not yet passed by a lookup; `true` marks `\n`
    pending: VecDeque<(u64, bool)>,
    /// Bytes handed to the parser so far
    observed: u64,
    /// Newlines passed, including lines before the stream started
    newlines: u64,
}

/// Shared map from stream offsets to physical lines
#[derive(Debug, Clone, Default)]
pub struct LineIndex(Arc<Mutex<Terminators>>);

impl LineIndex {
    /// Index for a stream whose first byte sits after `lines_before` lines
    pub fn starting_after(lines_before: u64) -> Self {
        LineIndex(Arc::new(Mutex::new(Terminators {
            newlines: lines_before,
            ..Terminators::default()
        })))
    }

    fn observe(&self, bytes: &[u8]) {
        let mut guard = self.lock();
        let terminators = &mut *guard;
        let base = terminators.observed;

        for (i, byte) in bytes.iter().enumerate() {
            if matches!(byte, b'\r' | b'\n') {
                terminators
                    .pending
                    .push_back((base + i as u64, *byte == b'\n'));
            }
        }
        terminators.observed += bytes.len() as u64;
    }

    /// Line of the first character of a record the parser places at `offset`
    ///
    /// Terminators found at the start offset belong to what precedes the
    /// record (the `\n` of a CRLF pair, blank lines) and are stepped over.
    /// Offsets must be asked for in ascending order.
    pub fn line_at(&self, offset: u64) -> u64 {
        let mut guard = self.lock();
        let terminators = &mut *guard;
        let mut start = offset;

        while let Some(&(at, newline)) = terminators.pending.front() {
            if at > start {
                break;
            }
            if at == start {
                start += 1;
            }
            if newline {
                terminators.newlines += 1;
            }
            terminators.pending.pop_front();
        }

        terminators.newlines + 1
    }

    fn lock(&self) -> MutexGuard<'_, Terminators> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reader adapter feeding every byte it passes on to a [`LineIndex`]
#[derive(Debug)]
pub struct LineCounting<R> {
    inner: R,
    index: LineIndex,
}

impl<R> LineCounting<R> {
    pub fn new(inner: R, index: LineIndex) -> Self {
        LineCounting { inner, index }
    }
}

impl<R: Read> Read for LineCounting<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.index.observe(&buf[..n]);
        Ok(n)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for LineCounting<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.index.observe(&buf[..n]);
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }
}
