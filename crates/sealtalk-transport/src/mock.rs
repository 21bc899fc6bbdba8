// ============================================
// File: crates/sealtalk-transport/src/mock.rs
// ============================================
//! # Mock Source and Sink
//!
//! ## Creation Reason
//! Lets session and server tests script outgoing messages and inspect
//! what a session delivered, without a console.
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only; enabled by the `mock` feature
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use sealtalk_core::CoreError;

use crate::traits::{MessageSink, MessageSource};

// ============================================
// ScriptedSource
// ============================================

/// Yields a fixed list of messages, then either ends or stays pending.
#[derive(Debug)]
pub struct ScriptedSource {
    messages: VecDeque<String>,
    delay: Duration,
    hold_open: bool,
}

impl ScriptedSource {
    /// Yields `messages` in order, then reports exhaustion.
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
            delay: Duration::ZERO,
            hold_open: false,
        }
    }

    /// Waits `delay` before each message.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Never reports exhaustion; the session must end some other way.
    #[must_use]
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn next_message(&mut self) -> Option<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.messages.pop_front() {
            Some(message) => Some(message),
            None if self.hold_open => std::future::pending().await,
            None => None,
        }
    }
}

// ============================================
// RecordingSink
// ============================================

/// Records every delivered message and rejection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
    rejections: Mutex<Vec<CoreError>>,
    notify: Notify,
}

impl RecordingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the messages received so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Returns the rejections reported so far.
    #[must_use]
    pub fn rejections(&self) -> Vec<CoreError> {
        self.rejections.lock().clone()
    }

    /// Waits until at least `count` messages have arrived.
    pub async fn wait_for_messages(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.messages.lock().len() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn on_message(&self, text: &str) {
        self.messages.lock().push(text.to_string());
        self.notify.notify_waiters();
    }

    async fn on_rejected(&self, error: &CoreError) {
        self.rejections.lock().push(error.clone());
    }
}
