// ============================================
// File: crates/sealtalk-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the SealTalk server from a TOML
//! file, with command-line overrides applied by the binary.
//!
//! ## Configuration Sections
//! - `network`: TCP listen address
//! - `server_key`: key file path
//! - `limits`: concurrency, read timeout, reap interval
//! - `logging`: log level
//!
//! ## Example Configuration
//! ```toml
//! [network]
//! listen_addr = "0.0.0.0:1234"
//!
//! [server_key]
//! key_file = "server_key.json"
//!
//! [limits]
//! max_clients = 10
//! read_timeout_secs = 600
//! reap_interval_secs = 60
//!
//! [logging]
//! level = "info"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every field has a default; an empty file is a valid config
//! - Config changes require a restart
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ServerError};

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 1234;

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Server key configuration.
    #[serde(default)]
    pub server_key: ServerKeyConfig,

    /// Concurrency and timeout limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    ///
    /// # Errors
    /// Returns error if an existing file is invalid.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            info!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        self.server_key.validate()?;
        self.limits.validate()?;
        Ok(())
    }

    /// Serializes configuration to a TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Returns the listen address.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        self.network.listen_addr
    }

    /// Returns the key file path.
    #[must_use]
    pub fn key_file(&self) -> &Path {
        &self.server_key.key_file
    }

    /// Returns the maximum number of concurrently served clients.
    #[must_use]
    pub fn max_clients(&self) -> usize {
        self.limits.max_clients
    }

    /// Returns the per-line read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.limits.read_timeout_secs)
    }

    /// Returns the reaper interval.
    #[must_use]
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.limits.reap_interval_secs)
    }
}

impl FromStr for ServerConfig {
    type Err = ServerError;

    fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// TCP listen address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT))
}

impl NetworkConfig {
    fn validate(&self) -> Result<()> {
        if self.listen_addr.port() == 0 {
            return Err(ServerError::config_invalid(
                "network.listen_addr",
                "port cannot be 0",
            ));
        }
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

// ============================================
// ServerKeyConfig
// ============================================

/// Server key configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerKeyConfig {
    /// Path to the JSON key file. Created on first start.
    #[serde(default = "default_key_file")]
    pub key_file: PathBuf,
}

fn default_key_file() -> PathBuf {
    PathBuf::from("server_key.json")
}

impl ServerKeyConfig {
    fn validate(&self) -> Result<()> {
        if self.key_file.as_os_str().is_empty() {
            return Err(ServerError::config_invalid(
                "server_key.key_file",
                "cannot be empty",
            ));
        }
        Ok(())
    }
}

impl Default for ServerKeyConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Limits configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Connections served concurrently; further ones wait in a queue.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Seconds without an incoming line before a client is dropped.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// Seconds between registry reap cycles.
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
}

fn default_max_clients() -> usize {
    10
}

fn default_read_timeout_secs() -> u64 {
    600
}

fn default_reap_interval_secs() -> u64 {
    60
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_clients == 0 {
            return Err(ServerError::config_invalid(
                "limits.max_clients",
                "must be greater than 0",
            ));
        }

        if self.read_timeout_secs == 0 {
            return Err(ServerError::config_invalid(
                "limits.read_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.reap_interval_secs == 0 {
            return Err(ServerError::config_invalid(
                "limits.reap_interval_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
            read_timeout_secs: default_read_timeout_secs(),
            reap_interval_secs: default_reap_interval_secs(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr().port(), 1234);
        assert_eq!(config.max_clients(), 10);
        assert_eq!(config.read_timeout(), Duration::from_secs(600));
        assert_eq!(config.reap_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: ServerConfig = "".parse().unwrap();
        assert_eq!(config.listen_addr(), default_listen_addr());
        assert_eq!(config.key_file(), Path::new("server_key.json"));
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
            [network]
            listen_addr = "127.0.0.1:4000"

            [server_key]
            key_file = "/var/lib/sealtalk/key.json"

            [limits]
            max_clients = 3
            read_timeout_secs = 30
            reap_interval_secs = 5

            [logging]
            level = "debug"
        "#;

        let config: ServerConfig = toml.parse().unwrap();
        assert_eq!(config.listen_addr().port(), 4000);
        assert_eq!(config.key_file(), Path::new("/var/lib/sealtalk/key.json"));
        assert_eq!(config.max_clients(), 3);
        assert_eq!(config.read_timeout(), Duration::from_secs(30));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = "[limits]\nmax_clients = 0".parse::<ServerConfig>().unwrap_err();
        assert!(matches!(err, ServerError::ConfigInvalid { ref field, .. } if field == "limits.max_clients"));

        let err = "[network]\nlisten_addr = \"0.0.0.0:0\"".parse::<ServerConfig>().unwrap_err();
        assert!(err.is_config_error());

        let err = "[network]\nlisten_addr = \"not an address\"".parse::<ServerConfig>().unwrap_err();
        assert!(matches!(err, ServerError::ConfigLoad { .. }));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ServerConfig::default();
        let parsed: ServerConfig = config.to_toml().parse().unwrap();
        assert_eq!(parsed.listen_addr(), config.listen_addr());
        assert_eq!(parsed.max_clients(), config.max_clients());
    }

    #[tokio::test]
    async fn test_load_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load_or_default(dir.path().join("absent.toml"))
            .await
            .unwrap();
        assert_eq!(config.max_clients(), 10);

        let path = dir.path().join("server.toml");
        tokio::fs::write(&path, "[limits]\nmax_clients = 2\n").await.unwrap();
        let config = ServerConfig::load_or_default(&path).await.unwrap();
        assert_eq!(config.max_clients(), 2);
    }
}
