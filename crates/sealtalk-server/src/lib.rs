// ============================================
// File: crates/sealtalk-server/src/lib.rs
// ============================================
//! # SealTalk Server Library
//!
//! ## Creation Reason
//! Provides the server side of SealTalk: it holds a persistent RSA identity,
//! accepts clients, runs the key exchange with each one and relays
//! encrypted messages between the clients and the operator.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Server configuration management
//! - [`keystore`]: Persistent server key
//! - [`server`]: Listener, worker pool and lifecycle
//! - [`services`]: Shared server state
//!   - [`services::registry`]: Live connection registry
//! - [`operator`]: Operator console commands
//! - [`error`]: Server-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     SealTalk Server                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────┐    ┌──────────┐    ┌────────────────────┐  │
//! │  │  Config  │───►│  Server  │───►│ Connection Tasks   │  │
//! │  └──────────┘    └────┬─────┘    └─────────┬──────────┘  │
//! │  ┌──────────┐         │                    │             │
//! │  │ KeyStore │─────────┘                    ▼             │
//! │  └──────────┘                   ┌────────────────────┐   │
//! │  ┌──────────┐   @name message   │ ConnectionRegistry │   │
//! │  │ Operator │──────────────────►│                    │   │
//! │  └──────────┘                   └────────────────────┘   │
//! ├──────────────────────────────────────────────────────────┤
//! │                   sealtalk-transport                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Configuration changes require restart (no hot-reload)
//! - The key file is created on first start; deleting it changes the
//!   fingerprint every client has pinned
//!
//! ## Last Modified
//! v0.1.0 - Initial server library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod keystore;
pub mod operator;
pub mod server;
pub mod services;

// Re-export primary types
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::Server;
