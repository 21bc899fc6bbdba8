// ============================================
// File: crates/sealtalk-client/src/lib.rs
// ============================================
//! # SealTalk Client Library
//!
//! ## Creation Reason
//! Provides the client side of SealTalk: an ephemeral RSA identity, the
//! authenticated connection to a server and the terminal adapters for the
//! message loops.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Command-line arguments and resolved settings
//! - [`client`]: Connect, verify the server key, run the session
//! - [`console`]: Terminal message source and sink
//! - [`error`]: Client-specific error types
//!
//! ## ⚠️ Important Note for Next Developer
//! - `--pin` is the safe mode; `--tofu` cannot detect interception on the
//!   first connection
//!
//! ## Last Modified
//! v0.1.0 - Initial client library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod console;
pub mod error;

// Re-export primary types
pub use client::{generate_identity, Client, Connected};
pub use config::{ClientArgs, ClientConfig};
pub use console::{ConsoleSink, LineSource};
pub use error::{ClientError, Result};
