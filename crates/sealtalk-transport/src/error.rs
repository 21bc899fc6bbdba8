// ============================================
// File: crates/sealtalk-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for connection setup, line I/O and handshake
//! driving.
//!
//! ## Error Categories
//! 1. **Network Errors**: connect/bind failures, refused connections,
//!    timeouts, peer closing mid-handshake
//! 2. **Security Errors**: key verification failures raised by the
//!    handshake; reported as security alerts
//! 3. **Protocol Errors**: oversized or malformed lines, out-of-order
//!    handshake steps
//! 4. **System Errors**: other I/O failures
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Security` and `Protocol` both wrap `CoreError`; route through
//!   [`TransportError::from_core`] so classification stays consistent
//! - Security errors are terminal and must never be retried
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use sealtalk_core::CoreError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Network Errors
    // ========================================

    /// Failed to bind a listening socket.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: SocketAddr,
        /// Why binding failed
        reason: String,
    },

    /// Address already in use.
    #[error("Address {addr} already in use")]
    AddressInUse {
        /// The address that's in use
        addr: SocketAddr,
    },

    /// Could not reach the peer.
    #[error("Failed to connect to {target}: {reason}")]
    ConnectFailed {
        /// Host and port we tried
        target: String,
        /// Why connecting failed
        reason: String,
    },

    /// Peer actively refused the connection.
    #[error("Connection refused by {target}")]
    ConnectionRefused {
        /// Host and port we tried
        target: String,
    },

    /// Operation timed out.
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// What operation timed out
        operation: String,
    },

    /// Peer closed the stream before the handshake completed.
    #[error("Peer closed the connection during {stage}")]
    PeerClosed {
        /// Handshake step being performed
        stage: String,
    },

    // ========================================
    // Security Errors
    // ========================================

    /// Peer key failed verification.
    #[error("Security failure: {0}")]
    Security(CoreError),

    // ========================================
    // Protocol Errors
    // ========================================

    /// Incoming line exceeds the framing limit.
    #[error("Line exceeds {max} bytes")]
    LineTooLong {
        /// Maximum accepted line length
        max: usize,
    },

    /// Protocol violation other than a failed verification.
    #[error("Protocol error: {0}")]
    Protocol(CoreError),

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a `PeerClosed` error.
    pub fn peer_closed(stage: impl Into<String>) -> Self {
        Self::PeerClosed {
            stage: stage.into(),
        }
    }

    /// Wraps a core error, separating security failures from protocol
    /// errors.
    #[must_use]
    pub fn from_core(err: CoreError) -> Self {
        if err.is_security_fatal() {
            Self::Security(err)
        } else {
            Self::Protocol(err)
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error must be reported as a security alert.
    #[must_use]
    pub const fn is_security_alert(&self) -> bool {
        matches!(self, Self::Security(_))
    }

    /// Returns `true` if this is a network-related error.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::BindFailed { .. }
                | Self::AddressInUse { .. }
                | Self::ConnectFailed { .. }
                | Self::ConnectionRefused { .. }
                | Self::Timeout { .. }
                | Self::PeerClosed { .. }
        )
    }

    /// Returns `true` if this error is a framing or protocol violation.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(self, Self::LineTooLong { .. } | Self::Protocol(_))
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

impl From<CoreError> for TransportError {
    fn from(err: CoreError) -> Self {
        Self::from_core(err)
    }
}

// ============================================
// Tests
// ============================================
