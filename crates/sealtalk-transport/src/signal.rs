// ============================================
// File: crates/sealtalk-transport/src/signal.rs
// ============================================
//! # Stop Signal
//!
//! ## Creation Reason
//! A session runs two loops that must end together. The first loop to
//! finish triggers the signal; the other observes it at its next await
//! point. The same signal doubles as the connection's liveness handle in
//! the server registry.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Triggering is idempotent; only the first call returns `true`
//! - `wait` returns immediately once triggered, including for waiters that
//!   subscribe afterwards
//!
//! ## Last Modified
//! v0.1.0 - Initial stop signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    notify: Notify,
}

/// Cloneable one-shot stop flag with async notification.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<Inner>,
}

impl StopSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers the signal and wakes every waiter.
    ///
    /// Returns `true` if this call was the one that triggered it.
    pub fn trigger(&self) -> bool {
        let first = !self.inner.stopped.swap(true, Ordering::AcqRel);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Returns `true` once triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Waits until the signal is triggered.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent trigger
            // cannot slip between the check and the await.
            notified.as_mut().enable();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_trigger_once() {
        let signal = StopSignal::new();
        assert!(!signal.is_triggered());
        assert!(signal.trigger());
        assert!(!signal.clone().trigger());
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_wait_wakes_all_clones() {
        let signal = StopSignal::new();
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let s = signal.clone();
                tokio::spawn(async move { s.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        signal.trigger();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_wait_after_trigger_returns_immediately() {
        let signal = StopSignal::new();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .unwrap();
    }
}
