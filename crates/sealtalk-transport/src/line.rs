// ============================================
// File: crates/sealtalk-transport/src/line.rs
// ============================================
//! # Line Framing
//!
//! ## Creation Reason
//! Every protocol unit is one UTF-8 line terminated by `\n`. This module
//! reads and writes such lines over any async byte stream, enforcing a
//! maximum line length so a peer cannot grow our buffer without bound.
//!
//! ## Main Functionality
//! - `LineReader`: bounded line reads, `\r\n` tolerated
//! - `LineWriter`: single-line writes with flush
//!
//! ## ⚠️ Important Note for Next Developer
//! - `read_line` is not cancellation safe: a partially read line is lost
//!   when the future is dropped. Only cancel it when the stream is about to
//!   be closed anyway.
//! - A final line without terminator before EOF is still returned
//!
//! ## Last Modified
//! v0.1.0 - Initial line framing

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use sealtalk_core::protocol::codec::{self, MAX_LINE_LEN};
use sealtalk_core::CoreError;

use crate::error::{Result, TransportError};

// ============================================
// LineReader
// ============================================

/// Reads newline-delimited UTF-8 lines from a byte stream.
pub struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Creates a reader with the default line limit.
    pub fn new(inner: R) -> Self {
        Self::with_max_len(inner, MAX_LINE_LEN)
    }

    /// Creates a reader with a custom line limit (terminator excluded).
    pub fn with_max_len(inner: R, max_len: usize) -> Self {
        Self {
            inner: BufReader::new(inner),
            buf: Vec::new(),
            max_len,
        }
    }

    /// Reads the next line without its terminator.
    ///
    /// Returns `Ok(None)` on a clean end of stream.
    ///
    /// # Errors
    /// - `LineTooLong` if the line exceeds the limit
    /// - `Protocol` if the line is not valid UTF-8
    /// - `Io` on read failure
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        self.buf.clear();

        // Room for the content plus "\r\n"
        let limit = (self.max_len + 2) as u64;
        let read = (&mut self.inner)
            .take(limit)
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(|e| TransportError::io("reading line", e))?;

        if read == 0 {
            return Ok(None);
        }
        if self.buf.last() != Some(&b'\n') && read as u64 == limit {
            return Err(TransportError::LineTooLong { max: self.max_len });
        }

        let raw = std::str::from_utf8(&self.buf)
            .map_err(|_| TransportError::Protocol(CoreError::malformed("line is not valid UTF-8")))?;
        let line = codec::strip_line_ending(raw);
        if line.len() > self.max_len {
            return Err(TransportError::LineTooLong { max: self.max_len });
        }

        Ok(Some(line.to_string()))
    }
}

// ============================================
// LineWriter
// ============================================

/// Writes newline-terminated lines to a byte stream.
pub struct LineWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    /// Wraps a writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes `line` followed by `\n` and flushes.
    ///
    /// # Errors
    /// - `Protocol` if `line` contains a line break
    /// - `Io` on write failure
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        codec::ensure_single_line(line).map_err(TransportError::Protocol)?;

        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');

        self.inner
            .write_all(&frame)
            .await
            .map_err(|e| TransportError::io("writing line", e))?;
        self.inner
            .flush()
            .await
            .map_err(|e| TransportError::io("flushing line", e))
    }

    /// Shuts down the write half.
    ///
    /// # Errors
    /// Returns `Io` if the shutdown fails.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| TransportError::io("shutting down writer", e))
    }
}

// ============================================
// Tests
// ============================================
