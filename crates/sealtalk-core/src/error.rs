// ============================================
// File: crates/sealtalk-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types for key handling, message encryption and the
//! handshake protocol.
//!
//! ## Error Categories
//! 1. **Security-fatal**: malformed peer key, fingerprint integrity
//!    mismatch, trust anchor mismatch. The connection must be aborted and
//!    no application message may follow.
//! 2. **Recoverable**: oversized plaintext, embedded line break, failed
//!    decryption. Reported per message; the session keeps running.
//! 3. **State**: operation called out of protocol order.
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material or plaintext in error messages
//! - Fingerprints are public and may be shown in alerts
//! - `Decryption` is deliberately a unit variant: padding failures must not
//!   be distinguishable from other decryption failures
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use sealtalk_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for key, channel and handshake operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    // ========================================
    // Key Errors
    // ========================================

    /// Failed to generate a key pair.
    #[error("Key generation failed: {context}")]
    KeyGeneration {
        /// What key was being generated
        context: String,
    },

    /// Key text could not be decoded.
    #[error("Malformed key: {reason}")]
    MalformedKey {
        /// What's wrong with the encoding
        reason: String,
    },

    // ========================================
    // Verification Errors
    // ========================================

    /// Presented fingerprint does not match the one recomputed from the
    /// presented key bytes.
    #[error("Key fingerprint mismatch: computed {computed}, received {received}")]
    IntegrityMismatch {
        /// Fingerprint recomputed from the received key
        computed: String,
        /// Fingerprint line as received
        received: String,
    },

    /// Peer key does not match the pinned trust anchor.
    #[error("Trust anchor mismatch, possible interception: expected {pinned}, presented {presented}")]
    TrustAnchorMismatch {
        /// Pinned fingerprint
        pinned: String,
        /// Fingerprint of the presented key
        presented: String,
    },

    // ========================================
    // Message Errors
    // ========================================

    /// Plaintext exceeds what one OAEP block can carry.
    #[error("Message too large: max {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Maximum plaintext size for the peer key
        max: usize,
        /// Actual plaintext size
        actual: usize,
    },

    /// Plaintext contains a line break and would corrupt line framing.
    #[error("Message contains a line break")]
    EmbeddedNewline,

    /// Encryption operation failed.
    #[error("Encryption failed: {context}")]
    Encryption {
        /// What was being encrypted
        context: String,
    },

    /// Decryption failed (bad encoding, wrong key or padding).
    #[error("Decryption failed")]
    Decryption,

    /// Protocol line is malformed.
    #[error("Malformed message: {reason}")]
    MalformedMessage {
        /// What's wrong with the line
        reason: String,
    },

    // ========================================
    // State Errors
    // ========================================

    /// Operation not valid in current state.
    #[error("Invalid state for operation: {operation} requires {required_state}")]
    InvalidState {
        /// What operation was attempted
        operation: String,
        /// What state was required
        required_state: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `KeyGeneration` error.
    pub fn key_generation(context: impl Into<String>) -> Self {
        Self::KeyGeneration {
            context: context.into(),
        }
    }

    /// Creates a `MalformedKey` error.
    pub fn malformed_key(reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedMessage` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Creates an `Encryption` error.
    pub fn encryption(context: impl Into<String>) -> Self {
        Self::Encryption {
            context: context.into(),
        }
    }

    /// Creates an `InvalidState` error.
    pub fn invalid_state(
        operation: impl Into<String>,
        required_state: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            required_state: required_state.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error means the peer cannot be trusted.
    ///
    /// The connection must be dropped before any application traffic.
    #[must_use]
    pub const fn is_security_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedKey { .. }
                | Self::IntegrityMismatch { .. }
                | Self::TrustAnchorMismatch { .. }
        )
    }

    /// Returns `true` if this error only affects a single message.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MessageTooLarge { .. }
                | Self::EmbeddedNewline
                | Self::Encryption { .. }
                | Self::Decryption
        )
    }
}

// ============================================
// Tests
// ============================================
