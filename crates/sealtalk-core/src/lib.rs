// ============================================
// File: crates/sealtalk-core/src/lib.rs
// ============================================
//! # SealTalk Core - Protocol & Cryptography Library
//!
//! ## Creation Reason
//! Provides the key identity, the per-message encryption channel and the
//! handshake state machine. Everything here is synchronous and free of I/O;
//! the transport crate drives it over a socket.
//!
//! ## Main Functionality
//!
//! ### Crypto Module ([`crypto`])
//! - `KeyPair`, `PublicKey`, `PrivateKey` (RSA-3072)
//! - `Fingerprint` (SHA-256 over the SPKI DER encoding)
//! - `SecureChannel` (RSA-OAEP-SHA256, one ciphertext per message)
//!
//! ### Protocol Module ([`protocol`])
//! - Line codec for keys, fingerprints and ciphertext
//! - `Handshake` state machine and `TrustAnchor`
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │      sealtalk-server          sealtalk-client       │
//! │              └──────────┬───────────┘               │
//! │                         ▼                           │
//! │                 sealtalk-transport                  │
//! │                         ▼                           │
//! │                   sealtalk-core  ◄── You are here   │
//! │                         ▼                           │
//! │                  sealtalk-common                    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Guarantees
//! - **Confidentiality**: RSA-OAEP with SHA-256 and MGF1-SHA-256
//! - **Key authenticity**: fingerprint recomputed from received key bytes,
//!   optionally pinned against a configured trust anchor
//!
//! ## ⚠️ Important Note for Next Developer
//! - There is no session key: every message is encrypted directly with the
//!   peer's long-term public key, which caps a message at 318 bytes
//! - NEVER log private keys or decrypted plaintext at info level
//! - Fingerprints are the only basis for trust decisions
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;

// Re-export commonly used items
pub use crypto::{Fingerprint, KeyPair, PrivateKey, PublicKey, SecureChannel};
pub use error::{CoreError, Result};
pub use protocol::{EstablishedPeer, Handshake, HandshakeState, Role, TrustAnchor};
