// ============================================
// File: crates/sealtalk-transport/src/traits.rs
// ============================================
//! # Session Traits
//!
//! ## Creation Reason
//! A session does not know where outgoing text comes from or where
//! incoming text goes. The client reads the console; the server takes
//! operator messages routed through the registry. These traits are the
//! seam between the session loops and those endpoints.
//!
//! ## Main Functionality
//! - `MessageSource`: yields outgoing plaintext messages
//! - `MessageSink`: receives decrypted messages and per-message errors
//! - `ChannelSource`: `MessageSource` over an mpsc receiver
//!
//! ## ⚠️ Important Note for Next Developer
//! - `next_message` may be cancelled when the session stops; implementors
//!   must not lose state the caller cares about when dropped mid-await
//! - Sinks are shared by reference across the receive and send loops
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use async_trait::async_trait;
use tokio::sync::mpsc;

use sealtalk_core::CoreError;

// ============================================
// MessageSource
// ============================================

/// Supplies outgoing plaintext messages for a session.
///
/// # Example
/// ```ignore
/// struct Script(Vec<String>);
///
/// #[async_trait]
/// impl MessageSource for Script {
///     async fn next_message(&mut self) -> Option<String> {
///         self.0.pop()
///     }
/// }
/// ```
#[async_trait]
pub trait MessageSource: Send {
    /// Returns the next message, or `None` when the source is exhausted.
    ///
    /// Exhaustion ends the session cleanly, as does the exit command.
    async fn next_message(&mut self) -> Option<String>;
}

// ============================================
// MessageSink
// ============================================

/// Consumes what a session produces for the local user.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Called with each successfully decrypted incoming message.
    async fn on_message(&self, text: &str);

    /// Called when a single message could not be sent or decrypted.
    ///
    /// The session continues after this call.
    async fn on_rejected(&self, error: &CoreError);
}

// ============================================
// ChannelSource
// ============================================

/// Message source fed by an mpsc channel.
///
/// The session ends cleanly once every sender is dropped.
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<String>,
}

impl ChannelSource {
    /// Wraps a receiver.
    #[must_use]
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        Self { rx }
    }

    /// Creates a bounded channel and returns its sender with the source.
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn next_message(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_source_drains_then_ends() {
        let (tx, mut source) = ChannelSource::channel(4);
        tx.send("one".into()).await.unwrap();
        tx.send("two".into()).await.unwrap();
        drop(tx);

        assert_eq!(source.next_message().await.as_deref(), Some("one"));
        assert_eq!(source.next_message().await.as_deref(), Some("two"));
        assert_eq!(source.next_message().await, None);
    }
}
