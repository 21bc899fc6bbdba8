// ============================================
// File: crates/sealtalk-core/src/protocol/handshake.rs
// ============================================
//! # Handshake State Machine
//!
//! ## Creation Reason
//! Encodes the ordered key exchange and the verification decision that
//! gates all message traffic. The machine performs no I/O; the transport
//! crate feeds it lines and writes what it returns.
//!
//! ## Main Functionality
//! - `Handshake`: per-connection state machine for either role
//! - `TrustAnchor`: pinned fingerprint or trust-on-first-use
//! - `verify_presented_key`: integrity check, then anchor check
//! - `EstablishedPeer`: what a successful handshake yields
//!
//! ## State Flow
//! ```text
//! Responder: Init ─► LocalKeySent ─► RemoteKeyReceived ─► Verified ─► NameAssigned ─► Established
//! Initiator: Init ─► RemoteKeyReceived ─► Verified ─► LocalKeySent ─► NameAssigned ─► Established
//!
//! Any non-terminal state ──(verification failure / out-of-order call)──► Failed
//! ```
//!
//! ## Verification Order
//! 1. Decode the key line (`MalformedKey` on failure)
//! 2. Recompute SHA-256 over the canonical DER and compare with the
//!    fingerprint line (`IntegrityMismatch`)
//! 3. Pinned mode only: compare with the anchor (`TrustAnchorMismatch`)
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Failed` is terminal; a failed handshake is never resumed or retried
//! - In TOFU mode the first verified fingerprint becomes the anchor for the
//!   rest of this handshake only; nothing is persisted
//! - The responder always verifies in TOFU mode: clients are not pinned
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake state machine

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use sealtalk_common::DisplayName;

use crate::crypto::keys::{Fingerprint, KeyPair, PublicKey};
use crate::crypto::RSA_KEY_BYTES;
use crate::error::{CoreError, Result};

/// Longest excerpt of an untrusted fingerprint line kept in an error.
const MAX_REPORTED_FINGERPRINT_LEN: usize = 64;

// ============================================
// Role / State
// ============================================

/// Which side of the exchange this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Connecting side (client). Receives the first key.
    Initiator,
    /// Accepting side (server). Sends the first key and assigns the name.
    Responder,
}

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing exchanged yet.
    Init,
    /// Local key and fingerprint written.
    LocalKeySent,
    /// Peer key and fingerprint read, not yet verified.
    RemoteKeyReceived,
    /// Peer key passed integrity and anchor checks.
    Verified,
    /// Display name sent (responder) or received (initiator).
    NameAssigned,
    /// Message traffic may begin.
    Established,
    /// Handshake aborted; the connection must be closed.
    Failed,
}

impl HandshakeState {
    /// Returns `true` for `Established` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Established | Self::Failed)
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "Init",
            Self::LocalKeySent => "LocalKeySent",
            Self::RemoteKeyReceived => "RemoteKeyReceived",
            Self::Verified => "Verified",
            Self::NameAssigned => "NameAssigned",
            Self::Established => "Established",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

// ============================================
// TrustAnchor
// ============================================

/// How the peer's key is authenticated beyond the integrity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustAnchor {
    /// The peer's fingerprint must equal this value.
    Pinned(Fingerprint),
    /// Accept the first verified fingerprint for this session.
    TrustOnFirstUse,
}

impl TrustAnchor {
    /// Parses a pinned fingerprint in base64 or colon-hex form.
    ///
    /// # Errors
    /// Returns `MalformedMessage` if the text is not a fingerprint.
    pub fn pinned(text: &str) -> Result<Self> {
        Fingerprint::parse(text).map(Self::Pinned)
    }

    /// Returns `true` in pinned mode.
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        matches!(self, Self::Pinned(_))
    }
}

// ============================================
// KeyAnnouncement
// ============================================

/// The two lines an endpoint sends to announce its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAnnouncement {
    /// Base64 SPKI public key.
    pub key_line: String,
    /// Base64 SHA-256 fingerprint of the key.
    pub fingerprint_line: String,
}

impl KeyAnnouncement {
    /// Builds the announcement for a public key.
    #[must_use]
    pub fn for_key(key: &PublicKey) -> Self {
        Self {
            key_line: key.encode(),
            fingerprint_line: key.fingerprint().to_base64(),
        }
    }

    /// Returns the lines in wire order.
    #[must_use]
    pub fn lines(&self) -> [&str; 2] {
        [&self.key_line, &self.fingerprint_line]
    }
}

/// Verifies a presented key against its fingerprint line and the anchor.
///
/// # Errors
/// - `MalformedKey` if the key line does not decode or is not RSA-3072
/// - `IntegrityMismatch` if the fingerprint line differs from the digest
///   recomputed from the key bytes
/// - `TrustAnchorMismatch` if pinned and the digest differs from the pin
pub fn verify_presented_key(
    key_line: &str,
    fingerprint_line: &str,
    anchor: &TrustAnchor,
) -> Result<(PublicKey, Fingerprint)> {
    let key = PublicKey::from_base64(key_line)?;
    if key.modulus_len() != RSA_KEY_BYTES {
        return Err(CoreError::malformed_key(format!(
            "expected a {}-bit RSA key, got {} bits",
            RSA_KEY_BYTES * 8,
            key.modulus_len() * 8
        )));
    }
    let computed = key.fingerprint();

    let matches_line = Fingerprint::from_base64(fingerprint_line)
        .map(|received| received == computed)
        .unwrap_or(false);
    if !matches_line {
        let received: String = fingerprint_line
            .trim()
            .chars()
            .take(MAX_REPORTED_FINGERPRINT_LEN)
            .collect();
        return Err(CoreError::IntegrityMismatch {
            computed: computed.to_base64(),
            received,
        });
    }

    if let TrustAnchor::Pinned(pinned) = anchor {
        if *pinned != computed {
            return Err(CoreError::TrustAnchorMismatch {
                pinned: pinned.to_base64(),
                presented: computed.to_base64(),
            });
        }
    }

    Ok((key, computed))
}

// ============================================
// EstablishedPeer
// ============================================

/// Result of a completed handshake.
#[derive(Debug, Clone)]
pub struct EstablishedPeer {
    /// Verified peer public key.
    pub public_key: PublicKey,
    /// Fingerprint of `public_key`.
    pub fingerprint: Fingerprint,
    /// Name the responder assigned to the initiator.
    pub display_name: DisplayName,
}

// ============================================
// Handshake
// ============================================

/// Per-connection key exchange state machine.
///
/// # Example
/// ```ignore
/// let mut hs = Handshake::responder(server_identity);
/// for line in hs.local_announcement()?.lines() { write(line) }
/// hs.receive_peer_announcement(&read()?, &read()?)?;
/// write(&hs.assign_name(name)?);
/// let peer = hs.establish()?;
/// ```
pub struct Handshake {
    role: Role,
    state: HandshakeState,
    local: Arc<KeyPair>,
    anchor: TrustAnchor,
    peer: Option<(PublicKey, Fingerprint)>,
    name: Option<DisplayName>,
}

impl Handshake {
    /// Creates the connecting side with the configured trust anchor.
    #[must_use]
    pub fn initiator(local: Arc<KeyPair>, anchor: TrustAnchor) -> Self {
        Self::new(Role::Initiator, local, anchor)
    }

    /// Creates the accepting side. Client keys are verified in TOFU mode.
    #[must_use]
    pub fn responder(local: Arc<KeyPair>) -> Self {
        Self::new(Role::Responder, local, TrustAnchor::TrustOnFirstUse)
    }

    fn new(role: Role, local: Arc<KeyPair>, anchor: TrustAnchor) -> Self {
        Self {
            role,
            state: HandshakeState::Init,
            local,
            anchor,
            peer: None,
            name: None,
        }
    }

    /// Returns this endpoint's role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> HandshakeState {
        self.state
    }

    /// Returns the active trust anchor.
    #[must_use]
    pub const fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    /// Returns the local identity.
    #[must_use]
    pub fn local(&self) -> &Arc<KeyPair> {
        &self.local
    }

    /// Produces the local key announcement.
    ///
    /// Responder: first step. Initiator: after the peer key is verified.
    ///
    /// # Errors
    /// Returns `InvalidState` if called out of order.
    pub fn local_announcement(&mut self) -> Result<KeyAnnouncement> {
        let required = match self.role {
            Role::Responder => HandshakeState::Init,
            Role::Initiator => HandshakeState::Verified,
        };
        self.require("local_announcement", required)?;
        self.state = HandshakeState::LocalKeySent;
        Ok(KeyAnnouncement::for_key(self.local.public_key()))
    }

    /// Consumes the peer's key and fingerprint lines and verifies them.
    ///
    /// # Errors
    /// Returns `InvalidState` if called out of order, or any error of
    /// [`verify_presented_key`]. The machine is `Failed` afterwards.
    pub fn receive_peer_announcement(
        &mut self,
        key_line: &str,
        fingerprint_line: &str,
    ) -> Result<Fingerprint> {
        let required = match self.role {
            Role::Initiator => HandshakeState::Init,
            Role::Responder => HandshakeState::LocalKeySent,
        };
        self.require("receive_peer_announcement", required)?;
        self.state = HandshakeState::RemoteKeyReceived;

        match verify_presented_key(key_line, fingerprint_line, &self.anchor) {
            Ok((key, fingerprint)) => {
                debug!(
                    role = ?self.role,
                    fingerprint = %fingerprint,
                    pinned = self.anchor.is_pinned(),
                    "Peer key verified"
                );
                if !self.anchor.is_pinned() {
                    self.anchor = TrustAnchor::Pinned(fingerprint);
                }
                self.peer = Some((key, fingerprint));
                self.state = HandshakeState::Verified;
                Ok(fingerprint)
            }
            Err(e) => {
                warn!(role = ?self.role, error = %e, "Peer key verification failed");
                self.state = HandshakeState::Failed;
                Err(e)
            }
        }
    }

    /// Responder: assigns the display name and returns the line to send.
    ///
    /// # Errors
    /// Returns `InvalidState` if not a verified responder.
    pub fn assign_name(&mut self, name: DisplayName) -> Result<String> {
        if self.role != Role::Responder {
            self.state = HandshakeState::Failed;
            return Err(CoreError::invalid_state("assign_name", "responder role"));
        }
        self.require("assign_name", HandshakeState::Verified)?;
        let line = name.as_str().to_string();
        self.name = Some(name);
        self.state = HandshakeState::NameAssigned;
        Ok(line)
    }

    /// Initiator: accepts the display name line sent by the responder.
    ///
    /// # Errors
    /// Returns `InvalidState` if called out of order, or `Common` if the
    /// name is not a valid display name.
    pub fn accept_name(&mut self, line: &str) -> Result<DisplayName> {
        if self.role != Role::Initiator {
            self.state = HandshakeState::Failed;
            return Err(CoreError::invalid_state("accept_name", "initiator role"));
        }
        self.require("accept_name", HandshakeState::LocalKeySent)?;
        let name = DisplayName::new(line).map_err(|e| {
            self.state = HandshakeState::Failed;
            CoreError::from(e)
        })?;
        self.name = Some(name.clone());
        self.state = HandshakeState::NameAssigned;
        Ok(name)
    }

    /// Completes the handshake.
    ///
    /// # Errors
    /// Returns `InvalidState` unless a name has been assigned.
    pub fn establish(&mut self) -> Result<EstablishedPeer> {
        self.require("establish", HandshakeState::NameAssigned)?;
        let (Some((public_key, fingerprint)), Some(display_name)) =
            (self.peer.clone(), self.name.clone())
        else {
            self.state = HandshakeState::Failed;
            return Err(CoreError::invalid_state("establish", "verified peer and name"));
        };
        self.state = HandshakeState::Established;
        Ok(EstablishedPeer {
            public_key,
            fingerprint,
            display_name,
        })
    }

    /// Marks the handshake failed (e.g. after an I/O error).
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = HandshakeState::Failed;
        }
    }

    fn require(&mut self, operation: &str, required: HandshakeState) -> Result<()> {
        if self.state == required {
            return Ok(());
        }
        self.state = HandshakeState::Failed;
        Err(CoreError::invalid_state(operation, required.to_string()))
    }
}

impl fmt::Debug for Handshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handshake")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("anchor", &self.anchor)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
