// ============================================
// File: crates/sealtalk-transport/src/lib.rs
// ============================================
//! # SealTalk Transport - Connection Layer
//!
//! ## Creation Reason
//! Drives the handshake and the encrypted message loops over a byte
//! stream. Everything here is generic over `AsyncRead`/`AsyncWrite` so the
//! same code runs on TCP sockets and on in-memory pipes in tests.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`line`]: bounded newline-delimited framing
//! - [`tcp`]: listener binding and outbound connect
//! - [`signal`]: per-session stop signal
//! - [`exchange`]: async handshake drivers for both roles
//! - [`session`]: concurrent send/receive loops
//! - [`traits`]: message source and sink seams
//! - [`error`]: transport error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │        sealtalk-server      sealtalk-client         │
//! │                 │                 │                 │
//! │                 └────────┬────────┘                 │
//! │                          ▼                          │
//! │                 sealtalk-transport                  │
//! │                  You are here ◄──                   │
//! │                          │                          │
//! │                          ▼                          │
//! │                   sealtalk-core                     │
//! │                          │                          │
//! │                          ▼                          │
//! │                  sealtalk-common                    │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Connection Lifecycle
//! ```text
//! connect/accept ─► exchange (handshake) ─► Session::run ─► SessionOutcome
//!                        │
//!                        └─ security failure ─► abort, nothing further written
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handshake failures are never retried
//! - `TransportError::Security` must be logged as a security alert, not as
//!   a network error
//! - Mock source/sink available with the `mock` feature
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod exchange;
pub mod line;
pub mod session;
pub mod signal;
pub mod tcp;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export primary types
pub use error::{Result, TransportError};
pub use exchange::{run_initiator, run_responder};
pub use line::{LineReader, LineWriter};
pub use session::{Session, SessionOutcome};
pub use signal::StopSignal;
pub use traits::{ChannelSource, MessageSink, MessageSource};
