// ============================================
// File: crates/sealtalk-client/src/client.rs
// ============================================
//! # Client Connector
//!
//! ## Creation Reason
//! Connects to a SealTalk server, authenticates its key and hands back an
//! encrypted session ready to run.
//!
//! ## Flow
//! ```text
//! connect ─► run_initiator (verify integrity + trust anchor) ─► Connected
//!                  │                                              │
//!                  └─ SECURITY ALERT: abort, nothing sent         ▼
//!                                                      Session::run(source, sink)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The client key is ephemeral; generate it once per process with
//!   `generate_identity`
//! - A failed handshake must never fall back to TOFU
//!
//! ## Last Modified
//! v0.1.0 - Initial client connector

use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{info, warn};

use sealtalk_common::DisplayName;
use sealtalk_core::{EstablishedPeer, Fingerprint, KeyPair, SecureChannel};
use sealtalk_transport::{
    run_initiator, tcp, LineReader, LineWriter, MessageSink, MessageSource, Session,
    SessionOutcome, StopSignal,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Generates a fresh client key pair on the blocking pool.
///
/// # Errors
/// Returns `Core` if key generation fails.
pub async fn generate_identity() -> Result<Arc<KeyPair>> {
    let identity = tokio::task::spawn_blocking(KeyPair::generate)
        .await
        .map_err(|e| ClientError::Core(sealtalk_core::CoreError::key_generation(e.to_string())))??;
    Ok(Arc::new(identity))
}

// ============================================
// Client
// ============================================

/// SealTalk client.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    identity: Arc<KeyPair>,
}

impl Client {
    /// Creates a client with the given settings and key pair.
    pub fn new(config: ClientConfig, identity: Arc<KeyPair>) -> Self {
        Self { config, identity }
    }

    /// Returns the client's key fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.identity.fingerprint()
    }

    /// Connects and completes the handshake.
    ///
    /// # Errors
    /// - `Transport(ConnectionRefused | ConnectFailed | Timeout)` if the
    ///   server cannot be reached
    /// - `Transport(Security)` if the server key fails verification
    pub async fn connect(&self) -> Result<Connected> {
        let stream = tcp::connect(&self.config.host, self.config.port, self.config.connect_timeout).await?;
        let (read_half, write_half) = stream.into_split();
        let mut reader = LineReader::new(read_half);
        let mut writer = LineWriter::new(write_half);

        let peer = run_initiator(
            &mut reader,
            &mut writer,
            Arc::clone(&self.identity),
            self.config.anchor.clone(),
            self.config.read_timeout,
        )
        .await?;

        if !self.config.anchor.is_pinned() {
            warn!(
                fingerprint = %peer.fingerprint,
                "Trusting server key on first use; pin it with --pin to detect interception"
            );
        }
        info!(name = %peer.display_name, "Secure channel established");

        let channel = SecureChannel::new(Arc::clone(&self.identity), peer.public_key.clone());
        let session = Session::new(reader, writer, channel, StopSignal::new(), self.config.read_timeout);

        Ok(Connected { peer, session })
    }
}

// ============================================
// Connected
// ============================================

/// An authenticated connection whose message loops have not started yet.
pub struct Connected {
    peer: EstablishedPeer,
    session: Session<OwnedReadHalf, OwnedWriteHalf>,
}

impl Connected {
    /// Name the server assigned to this client.
    #[must_use]
    pub fn display_name(&self) -> &DisplayName {
        &self.peer.display_name
    }

    /// Verified server key fingerprint.
    #[must_use]
    pub fn server_fingerprint(&self) -> Fingerprint {
        self.peer.fingerprint
    }

    /// Stop signal that ends the session from outside.
    #[must_use]
    pub fn stop_signal(&self) -> StopSignal {
        self.session.stop_signal().clone()
    }

    /// Runs the message loops until either side ends the session.
    pub async fn run<S, K>(self, source: S, sink: &K) -> SessionOutcome
    where
        S: MessageSource,
        K: MessageSink,
    {
        self.session.run(source, sink).await
    }
}

impl std::fmt::Debug for Connected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connected")
            .field("display_name", &self.peer.display_name)
            .field("server_fingerprint", &self.peer.fingerprint)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
