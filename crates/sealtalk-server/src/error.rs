// ============================================
// File: crates/sealtalk-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! ## Creation Reason
//! Defines error types for server startup, the connection registry and
//! the key store.
//!
//! ## Error Categories
//! 1. **Configuration**: unreadable or invalid config file
//! 2. **Key Store**: missing, corrupt or unwritable key file
//! 3. **Registry**: duplicate registration, unknown or unreachable client
//! 4. **Wrapped**: errors from lower crates
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use sealtalk_common::ConnectionId;
use sealtalk_core::CoreError;
use sealtalk_transport::TransportError;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    // ========================================
    // Configuration Errors
    // ========================================

    /// Failed to load configuration file.
    #[error("Failed to load config from {path}: {reason}")]
    ConfigLoad {
        /// Config file path
        path: String,
        /// Why loading failed
        reason: String,
    },

    /// Configuration value is invalid.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Offending field
        field: String,
        /// Why it's invalid
        reason: String,
    },

    // ========================================
    // Key Store Errors
    // ========================================

    /// Key file could not be read, parsed or written.
    #[error("Key store error at {path}: {reason}")]
    KeyStore {
        /// Key file path
        path: String,
        /// What went wrong
        reason: String,
    },

    // ========================================
    // Registry Errors
    // ========================================

    /// A connection with this id is already registered.
    #[error("Connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// No connected client has this name.
    #[error("No connected client named {name}")]
    ClientNotFound {
        /// Requested display name
        name: String,
    },

    /// Client exists but its session no longer accepts messages.
    #[error("Client {name} cannot accept messages: {reason}")]
    ClientUnavailable {
        /// Display name
        name: String,
        /// Why delivery failed
        reason: String,
    },

    // ========================================
    // Lifecycle Errors
    // ========================================

    /// Server failed to start.
    #[error("Server failed to start: {reason}")]
    StartupFailed {
        /// Why startup failed
        reason: String,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from core crate.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from transport crate.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `KeyStore` error.
    pub fn key_store(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::KeyStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `StartupFailed` error.
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }

    /// Returns `true` for configuration errors.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    /// Returns `true` for errors about a registry operation.
    #[must_use]
    pub const fn is_registry_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyRegistered(_) | Self::ClientNotFound { .. } | Self::ClientUnavailable { .. }
        )
    }

    /// Returns `true` if the server cannot continue.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad { .. }
                | Self::ConfigInvalid { .. }
                | Self::KeyStore { .. }
                | Self::StartupFailed { .. }
                | Self::Transport(TransportError::BindFailed { .. } | TransportError::AddressInUse { .. })
        )
    }
}
