// ============================================
// File: crates/sealtalk-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Main Functionality
//! - `ConnectionId`: process-unique handle for one accepted TCP connection
//! - `DisplayName`: server-assigned human-readable name sent to the client
//!
//! ## ⚠️ Important Note for Next Developer
//! - `DisplayName` travels as a single wire line, so it must never contain
//!   line breaks
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// Maximum length of a display name in bytes.
pub const MAX_DISPLAY_NAME_LEN: usize = 64;

// ============================================
// ConnectionId
// ============================================

/// Identifier of one accepted connection.
///
/// Assigned from a monotonic counter by the listener, so identifiers are
/// never reused within a server lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Thread-safe allocator of sequential connection identifiers.
#[derive(Debug, Default)]
pub struct ConnectionIdGenerator {
    next: AtomicU64,
}

impl ConnectionIdGenerator {
    /// Creates a generator starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Returns the next identifier.
    pub fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================
// DisplayName
// ============================================

/// Server-assigned display name of a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Validates and wraps a display name.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the name is empty, too long, or contains
    /// control characters.
    pub fn new(name: impl Into<String>) -> Result<Self, CommonError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CommonError::invalid_input("display_name", "cannot be empty"));
        }
        if name.len() > MAX_DISPLAY_NAME_LEN {
            return Err(CommonError::invalid_input(
                "display_name",
                format!("cannot exceed {MAX_DISPLAY_NAME_LEN} bytes"),
            ));
        }
        if name.chars().any(char::is_control) {
            return Err(CommonError::invalid_input(
                "display_name",
                "cannot contain control characters",
            ));
        }
        Ok(Self(name))
    }

    /// Builds the sequential name the listener hands out (`Client-N`).
    #[must_use]
    pub fn sequential(id: ConnectionId) -> Self {
        Self(format!("Client-{}", id.get()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DisplayName {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DisplayName {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}
