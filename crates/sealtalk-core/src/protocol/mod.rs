// ============================================
// File: crates/sealtalk-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Main Functionality
//! - [`codec`]: line-level text encoding of keys, fingerprints, ciphertext
//! - [`handshake`]: key exchange state machine and trust anchors
//!
//! ## Wire Sequence
//! ```text
//! responder -> initiator: <base64 SPKI public key>\n
//! responder -> initiator: <base64 fingerprint>\n
//! initiator -> responder: <base64 SPKI public key>\n
//! initiator -> responder: <base64 fingerprint>\n
//! responder -> initiator: <display name>\n
//! (either direction, repeating): <base64 OAEP ciphertext>\n
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod handshake;

pub use codec::{is_exit_command, EXIT_COMMAND, MAX_LINE_LEN};
pub use handshake::{
    verify_presented_key, EstablishedPeer, Handshake, HandshakeState, KeyAnnouncement, Role,
    TrustAnchor,
};
