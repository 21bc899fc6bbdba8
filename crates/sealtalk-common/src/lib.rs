// ============================================
// File: crates/sealtalk-common/src/lib.rs
// ============================================
//! # SealTalk Common - Shared Types Library
//!
//! ## Creation Reason
//! Provides the identifiers and base error type shared by every SealTalk
//! crate, so the server registry, the session layer and the protocol core
//! agree on how a connection is named.
//!
//! ## Main Functionality
//! - [`types`]: `ConnectionId` and `DisplayName`
//! - [`error`]: `CommonError` and the `Result` alias
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │      sealtalk-server          sealtalk-client       │
//! │              │                      │               │
//! │              └──────────┬───────────┘               │
//! │                         ▼                           │
//! │                 sealtalk-transport                  │
//! │                         │                           │
//! │                         ▼                           │
//! │                   sealtalk-core                     │
//! │                         │                           │
//! │                         ▼                           │
//! │                  sealtalk-common  ◄── You are here  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep it free of async and crypto dependencies
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CommonError, Result};
pub use types::{ConnectionId, ConnectionIdGenerator, DisplayName};
