// ============================================
// File: crates/sealtalk-server/src/keystore.rs
// ============================================
//! # Server Key Store
//!
//! ## Creation Reason
//! The server's RSA identity must survive restarts so clients can pin its
//! fingerprint. This module persists it as a small JSON document.
//!
//! ## File Format
//! ```json
//! {
//!   "version": "1.0",
//!   "key_type": "rsa-3072",
//!   "public_key": "<base64 SPKI DER>",
//!   "private_key": "<base64 PKCS#8 DER>",
//!   "created_at": "1767225600Z"
//! }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The file holds the private key; it is created with mode 0600 on Unix
//! - On load, the stored public key must match the one derived from the
//!   private key, otherwise the file is rejected
//! - Key generation is CPU bound and runs on the blocking pool
//!
//! ## Last Modified
//! v0.1.0 - Initial key store

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use zeroize::Zeroizing;

use sealtalk_core::{KeyPair, PrivateKey, PublicKey};

use crate::error::{Result, ServerError};

/// Current key file format version.
const KEY_FILE_VERSION: &str = "1.0";

/// Key type recorded in the file.
const KEY_TYPE: &str = "rsa-3072";

/// On-disk key file.
#[derive(Serialize, Deserialize)]
struct KeyFile {
    version: String,
    key_type: String,
    public_key: String,
    private_key: String,
    created_at: String,
}

/// Loads the key pair stored at `path`.
///
/// # Errors
/// Returns `KeyStore` if the file is unreadable, malformed or inconsistent.
pub async fn load(path: &Path) -> Result<KeyPair> {
    let path_str = path.display().to_string();

    let content = Zeroizing::new(
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::key_store(&path_str, e.to_string()))?,
    );
    let file: KeyFile = serde_json::from_str(&content)
        .map_err(|e| ServerError::key_store(&path_str, format!("invalid key file: {e}")))?;
    let private_text = Zeroizing::new(file.private_key);

    if file.key_type != KEY_TYPE {
        return Err(ServerError::key_store(
            &path_str,
            format!("unsupported key type '{}'", file.key_type),
        ));
    }

    let private = PrivateKey::from_base64(&private_text)
        .map_err(|e| ServerError::key_store(&path_str, e.to_string()))?;
    let identity = KeyPair::from_private_key(private)
        .map_err(|e| ServerError::key_store(&path_str, e.to_string()))?;

    let stored_public = PublicKey::from_base64(&file.public_key)
        .map_err(|e| ServerError::key_store(&path_str, e.to_string()))?;
    if &stored_public != identity.public_key() {
        return Err(ServerError::key_store(
            &path_str,
            "public key does not match private key",
        ));
    }

    info!(fingerprint = %identity.fingerprint(), "Loaded server key from {}", path_str);
    Ok(identity)
}

/// Writes `identity` to `path`, creating parent directories.
///
/// # Errors
/// Returns `KeyStore` if the file cannot be written.
pub async fn save(identity: &KeyPair, path: &Path) -> Result<()> {
    let path_str = path.display().to_string();
    let io_err = |e: std::io::Error| ServerError::key_store(&path_str, e.to_string());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let private_text = identity
        .private_key()
        .encode()
        .map_err(|e| ServerError::key_store(&path_str, e.to_string()))?;

    let file = KeyFile {
        version: KEY_FILE_VERSION.to_string(),
        key_type: KEY_TYPE.to_string(),
        public_key: identity.public_key().encode(),
        private_key: private_text.to_string(),
        created_at: unix_timestamp(),
    };
    let content = Zeroizing::new(
        serde_json::to_string_pretty(&file)
            .map_err(|e| ServerError::key_store(&path_str, e.to_string()))?,
    );
    let KeyFile { private_key, .. } = file;
    drop(Zeroizing::new(private_key));

    write_private_file(path, content.as_bytes()).await.map_err(io_err)?;

    info!(fingerprint = %identity.fingerprint(), "Saved server key to {}", path_str);
    Ok(())
}

/// Loads the key at `path`, or generates and saves a new one.
///
/// Returns the identity and whether it was newly created.
///
/// # Errors
/// Returns `KeyStore` on load/save failure, `Core` if generation fails.
pub async fn load_or_generate(path: &Path) -> Result<(Arc<KeyPair>, bool)> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok((Arc::new(load(path).await?), false));
    }

    info!("No server key at {}, generating a new one", path.display());
    let identity = tokio::task::spawn_blocking(KeyPair::generate)
        .await
        .map_err(|e| ServerError::startup_failed(format!("key generation task failed: {e}")))??;

    save(&identity, path).await?;
    Ok((Arc::new(identity), true))
}

#[cfg(unix)]
async fn write_private_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    file.write_all(content).await?;
    file.flush().await?;

    // An existing file keeps its old mode; tighten it as well
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn write_private_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, content).await
}

/// Returns seconds since the Unix epoch with a `Z` suffix.
fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}Z", duration.as_secs())
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use sealtalk_core::crypto::keys::test_support::{alice, bob};

    use super::*;

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys").join("server_key.json");

        save(&alice(), &path).await.unwrap();
        let loaded = load(&path).await.unwrap();
        assert_eq!(loaded.fingerprint(), alice().fingerprint());

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["key_type"], "rsa-3072");
        assert_eq!(value["public_key"], alice().public_key().encode());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_key.json");
        save(&bob(), &path).await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_load_existing_does_not_regenerate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_key.json");
        save(&alice(), &path).await.unwrap();

        let (identity, created) = load_or_generate(&path).await.unwrap();
        assert!(!created);
        assert_eq!(identity.fingerprint(), alice().fingerprint());
    }

    #[tokio::test]
    async fn test_mismatched_public_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_key.json");
        save(&alice(), &path).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&text).unwrap();
        value["public_key"] = serde_json::Value::String(bob().public_key().encode());
        tokio::fs::write(&path, value.to_string()).await.unwrap();

        let err = load(&path).await.unwrap_err();
        assert!(matches!(err, ServerError::KeyStore { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_corrupt_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_key.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();
        assert!(matches!(load(&path).await, Err(ServerError::KeyStore { .. })));

        assert!(matches!(
            load(&dir.path().join("missing.json")).await,
            Err(ServerError::KeyStore { .. })
        ));
    }
}
