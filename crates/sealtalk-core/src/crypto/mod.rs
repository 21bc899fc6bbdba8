// ============================================
// File: crates/sealtalk-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes all cryptographic operations, using the audited RustCrypto
//! `rsa` and `sha2` implementations.
//!
//! ## Main Functionality
//! - [`keys`]: RSA key pairs, canonical encoding, fingerprints
//! - [`channel`]: per-message RSA-OAEP encryption
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Key Exchange Phase                       │
//! │  Server                                        Client       │
//! │    │  SPKI(pub_s), SHA256(SPKI(pub_s)) ──────────► │        │
//! │    │                               recompute + pin check    │
//! │    │ ◄────────── SPKI(pub_c), SHA256(SPKI(pub_c))  │        │
//! │    │  recompute                                    │        │
//! │    │  display name ──────────────────────────────► │        │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Message Phase                            │
//! │   plaintext ──► RSA-OAEP(SHA-256, peer public key) ──► b64  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER roll your own crypto
//! - OAEP overhead is `2 * hash_len + 2` bytes per block
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod channel;
pub mod keys;

pub use channel::{decrypt, encrypt, max_plaintext_len, SecureChannel};
pub use keys::{Fingerprint, Key, KeyKind, KeyPair, PrivateKey, PublicKey};

// ============================================
// Constants
// ============================================

/// RSA modulus size in bits.
pub const RSA_KEY_BITS: usize = 3072;

/// RSA modulus size in bytes.
pub const RSA_KEY_BYTES: usize = RSA_KEY_BITS / 8;

/// SHA-256 output size in bytes (OAEP hash and fingerprint digest).
pub const SHA256_OUTPUT_SIZE: usize = 32;

/// Fingerprint size in bytes.
pub const FINGERPRINT_SIZE: usize = SHA256_OUTPUT_SIZE;

/// OAEP padding overhead per RSA block.
pub const OAEP_OVERHEAD: usize = 2 * SHA256_OUTPUT_SIZE + 2;

/// Largest plaintext a 3072-bit key can carry in one OAEP block (318).
pub const MAX_PLAINTEXT_SIZE: usize = RSA_KEY_BYTES - OAEP_OVERHEAD;
