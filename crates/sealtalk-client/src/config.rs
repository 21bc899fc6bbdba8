// ============================================
// File: crates/sealtalk-client/src/config.rs
// ============================================
//! # Client Configuration
//!
//! ## Creation Reason
//! The client has no config file; everything comes from the command line
//! (or matching environment variables) and is resolved here into a
//! validated `ClientConfig`.
//!
//! ## Trust Modes
//! - `--pin <FINGERPRINT>`: the server must present this exact key
//! - `--tofu`: accept whatever key the server presents for this session
//!
//! Exactly one of the two must be given.
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::time::Duration;

use clap::{Args, Parser};

use sealtalk_core::TrustAnchor;

use crate::error::{ClientError, Result};

/// Default server host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default server port.
pub const DEFAULT_PORT: u16 = 1234;

/// Default read timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

// ============================================
// ClientArgs
// ============================================

/// SealTalk encrypted messaging client
#[derive(Parser, Debug, Clone)]
#[command(name = "sealtalk-client")]
#[command(author, version, about, long_about = None)]
pub struct ClientArgs {
    /// Server host
    #[arg(long, env = "SEALTALK_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SEALTALK_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// How the server key is trusted
    #[command(flatten)]
    pub trust: TrustArgs,

    /// Seconds to wait for a line from the server before giving up
    #[arg(short, long, env = "SEALTALK_TIMEOUT", default_value_t = DEFAULT_READ_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Seconds to wait for the TCP connection
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SEALTALK_LOG", default_value = "warn")]
    pub log_level: String,
}

/// Mutually exclusive trust mode flags.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct TrustArgs {
    /// Server key fingerprint to pin (base64 or hex)
    #[arg(long, env = "SEALTALK_PIN", value_name = "FINGERPRINT")]
    pub pin: Option<String>,

    /// Trust the key the server presents on first use
    #[arg(long)]
    pub tofu: bool,
}

impl TrustArgs {
    /// Resolves the flags into a trust anchor.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the pinned fingerprint cannot be parsed.
    pub fn anchor(&self) -> Result<TrustAnchor> {
        match &self.pin {
            Some(pin) => TrustAnchor::pinned(pin.trim())
                .map_err(|e| ClientError::invalid_argument("--pin", e.to_string())),
            None => Ok(TrustAnchor::TrustOnFirstUse),
        }
    }
}

// ============================================
// ClientConfig
// ============================================

/// Resolved client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// How the server key is checked.
    pub anchor: TrustAnchor,
    /// Per-line read timeout.
    pub read_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Builds a config for `host:port` with default timeouts.
    pub fn new(host: impl Into<String>, port: u16, anchor: TrustAnchor) -> Self {
        Self {
            host: host.into(),
            port,
            anchor,
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Returns `host:port`.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl TryFrom<&ClientArgs> for ClientConfig {
    type Error = ClientError;

    fn try_from(args: &ClientArgs) -> Result<Self> {
        if args.host.trim().is_empty() {
            return Err(ClientError::invalid_argument("--host", "cannot be empty"));
        }
        if args.port == 0 {
            return Err(ClientError::invalid_argument("--port", "cannot be 0"));
        }
        if args.timeout == 0 {
            return Err(ClientError::invalid_argument("--timeout", "must be greater than 0"));
        }
        if args.connect_timeout == 0 {
            return Err(ClientError::invalid_argument(
                "--connect-timeout",
                "must be greater than 0",
            ));
        }

        Ok(Self {
            host: args.host.trim().to_string(),
            port: args.port,
            anchor: args.trust.anchor()?,
            read_timeout: Duration::from_secs(args.timeout),
            connect_timeout: Duration::from_secs(args.connect_timeout),
        })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use sealtalk_core::crypto::keys::test_support::alice;

    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<ClientArgs, clap::Error> {
        ClientArgs::try_parse_from(std::iter::once("sealtalk-client").chain(args.iter().copied()))
    }

    #[test]
    fn test_defaults_with_tofu() {
        let args = parse(&["--tofu"]).unwrap();
        let config = ClientConfig::try_from(&args).unwrap();

        assert_eq!(config.target(), "localhost:1234");
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert!(!config.anchor.is_pinned());
    }

    #[test]
    fn test_pin_resolves_to_anchor() {
        let fingerprint = alice().fingerprint();
        let pin = fingerprint.to_base64();
        let args = parse(&["--host", "10.0.0.5", "--port", "4000", "--pin", &pin, "--timeout", "5"]).unwrap();
        let config = ClientConfig::try_from(&args).unwrap();

        assert_eq!(config.target(), "10.0.0.5:4000");
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert!(matches!(config.anchor, TrustAnchor::Pinned(fp) if fp == fingerprint));
    }

    #[test]
    fn test_trust_mode_is_required_and_exclusive() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--tofu", "--pin", "abc"]).is_err());
    }

    #[test]
    fn test_bad_values_rejected() {
        let args = parse(&["--pin", "not-a-fingerprint"]).unwrap();
        let err = ClientConfig::try_from(&args).unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument { ref field, .. } if field == "--pin"));

        let args = parse(&["--tofu", "--timeout", "0"]).unwrap();
        assert!(ClientConfig::try_from(&args).is_err());
    }
}
