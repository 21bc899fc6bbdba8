// ============================================
// File: crates/sealtalk-client/src/error.rs
// ============================================
//! # Client Error Types
//!
//! ## Creation Reason
//! Separates what the user must hear about a failed run: a bad argument,
//! an unreachable server, or a server whose key cannot be trusted.
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use sealtalk_core::CoreError;
use sealtalk_transport::TransportError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error types.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Command-line value could not be used.
    #[error("Invalid argument {field}: {reason}")]
    InvalidArgument {
        /// Argument name
        field: String,
        /// Why it's invalid
        reason: String,
    },

    /// Cryptographic failure outside the connection.
    #[error("Crypto error: {0}")]
    Core(#[from] CoreError),

    /// Connection, handshake or session failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ClientError {
    /// Creates an `InvalidArgument` error.
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the server key failed verification.
    #[must_use]
    pub const fn is_security_alert(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_security_alert(),
            Self::Core(e) => e.is_security_fatal(),
            Self::InvalidArgument { .. } => false,
        }
    }

    /// Returns `true` if the server could not be reached or went away.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_network_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let refused = ClientError::from(TransportError::ConnectionRefused {
            target: "localhost:1234".into(),
        });
        assert!(refused.is_connection_error());
        assert!(!refused.is_security_alert());

        let pin = ClientError::from(TransportError::Security(CoreError::malformed_key("truncated")));
        assert!(pin.is_security_alert());
        assert!(!pin.is_connection_error());

        let arg = ClientError::invalid_argument("--pin", "not base64");
        assert!(arg.to_string().contains("--pin"));
        assert!(!arg.is_security_alert());
    }
}
