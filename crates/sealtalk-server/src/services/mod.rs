// ============================================
// File: crates/sealtalk-server/src/services/mod.rs
// ============================================
//! # Server Services
//!
//! ## Creation Reason
//! Groups the shared state services used by connection tasks.
//!
//! ## Main Functionality
//! - [`registry`]: live connection registry and reap cycle support
//!
//! ## Last Modified
//! v0.1.0 - Initial services module

pub mod registry;

// Re-export primary types
pub use registry::{ClientEntry, ConnectionRegistry, RegistrationGuard};
