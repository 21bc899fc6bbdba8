// ============================================
// File: crates/sealtalk-client/src/console.rs
// ============================================
//! # Terminal Source and Sink
//!
//! ## Creation Reason
//! Connects the session loops to the user's terminal: typed lines become
//! outgoing messages and decrypted messages are printed.
//!
//! ## Last Modified
//! v0.1.0 - Initial console adapters

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tracing::warn;

use sealtalk_core::CoreError;
use sealtalk_transport::{MessageSink, MessageSource};

/// Reads outgoing messages line by line from any async reader.
pub struct LineSource<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> LineSource<R> {
    /// Wraps `input`.
    pub fn new(input: R) -> Self {
        Self {
            lines: BufReader::new(input).lines(),
        }
    }
}

impl LineSource<tokio::io::Stdin> {
    /// Reads from the process's standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

#[async_trait]
impl<R> MessageSource for LineSource<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_message(&mut self) -> Option<String> {
        match self.lines.next_line().await {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read input: {}", e);
                None
            }
        }
    }
}

/// Prints messages from the server to stdout and rejections to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink;

#[async_trait]
impl MessageSink for ConsoleSink {
    async fn on_message(&self, text: &str) {
        println!("[Server] {text}");
    }

    async fn on_rejected(&self, error: &CoreError) {
        eprintln!("Message not delivered: {error}");
    }
}
