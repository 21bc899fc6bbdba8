// ============================================
// File: crates/sealtalk-core/src/crypto/channel.rs
// ============================================
//! # Secure Channel
//!
//! ## Creation Reason
//! Encrypts each chat message independently with the peer's long-term RSA
//! public key and decrypts incoming messages with the local private key.
//!
//! ## Main Functionality
//! - `encrypt` / `decrypt`: stateless RSA-OAEP-SHA256 over base64 text
//! - `SecureChannel`: binds the local key pair to one verified peer key
//!
//! ## Size Limit
//! ```text
//! max_plaintext = modulus_bytes - 2 * 32 - 2
//!               = 384 - 66 = 318 bytes for RSA-3072
//! ```
//! Oversized plaintext is rejected, never truncated or split.
//!
//! ## ⚠️ Important Note for Next Developer
//! - All decryption failures collapse into `CoreError::Decryption`
//! - OAEP is randomized: encrypting the same text twice gives different
//!   ciphertext
//!
//! ## Last Modified
//! v0.1.0 - Initial channel implementation

use std::sync::Arc;

use rand::rngs::OsRng;
use rsa::Oaep;
use sha2::Sha256;

use super::keys::{KeyPair, PrivateKey, PublicKey};
use super::OAEP_OVERHEAD;
use crate::error::{CoreError, Result};
use crate::protocol::codec;

/// Returns the largest plaintext, in bytes, that fits one OAEP block for
/// the given key.
#[must_use]
pub fn max_plaintext_len(key: &PublicKey) -> usize {
    key.modulus_len().saturating_sub(OAEP_OVERHEAD)
}

/// Encrypts `plaintext` for `peer` and returns the base64 ciphertext line.
///
/// # Errors
/// - `MessageTooLarge` if the UTF-8 plaintext exceeds
///   [`max_plaintext_len`]
/// - `Encryption` if the RSA operation fails
pub fn encrypt(plaintext: &str, peer: &PublicKey) -> Result<String> {
    let bytes = plaintext.as_bytes();
    let max = max_plaintext_len(peer);
    if bytes.len() > max {
        return Err(CoreError::MessageTooLarge {
            max,
            actual: bytes.len(),
        });
    }

    let ciphertext = peer
        .as_rsa()
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), bytes)
        .map_err(|e| CoreError::encryption(e.to_string()))?;

    Ok(codec::ciphertext_to_line(&ciphertext))
}

/// Decrypts a base64 ciphertext line with `local`.
///
/// # Errors
/// Returns `Decryption` on malformed base64, wrong key, padding failure or
/// a non-UTF-8 plaintext.
pub fn decrypt(ciphertext: &str, local: &PrivateKey) -> Result<String> {
    let bytes = codec::ciphertext_from_line(ciphertext).map_err(|_| CoreError::Decryption)?;

    let plaintext = local
        .as_rsa()
        .decrypt(Oaep::new::<Sha256>(), &bytes)
        .map_err(|_| CoreError::Decryption)?;

    String::from_utf8(plaintext).map_err(|_| CoreError::Decryption)
}

// ============================================
// SecureChannel
// ============================================

/// Encryption context of one established session.
///
/// # Example
/// ```ignore
/// let channel = SecureChannel::new(local_identity, verified_peer_key);
/// let line = channel.seal("hello")?;
/// writer.write_line(&line).await?;
/// ```
#[derive(Clone)]
pub struct SecureChannel {
    local: Arc<KeyPair>,
    peer: PublicKey,
}

impl SecureChannel {
    /// Creates a channel between the local identity and a verified peer key.
    #[must_use]
    pub fn new(local: Arc<KeyPair>, peer: PublicKey) -> Self {
        Self { local, peer }
    }

    /// Encrypts an outgoing message for the peer.
    ///
    /// # Errors
    /// - `EmbeddedNewline` if the message would break line framing
    /// - `MessageTooLarge` / `Encryption` as for [`encrypt`]
    pub fn seal(&self, message: &str) -> Result<String> {
        codec::ensure_single_line(message)?;
        encrypt(message, &self.peer)
    }

    /// Decrypts an incoming ciphertext line.
    ///
    /// # Errors
    /// Returns `Decryption` if the line cannot be decrypted.
    pub fn open(&self, line: &str) -> Result<String> {
        decrypt(line, self.local.private_key())
    }

    /// Returns the verified peer key.
    #[must_use]
    pub fn peer(&self) -> &PublicKey {
        &self.peer
    }

    /// Returns the largest message this channel can send.
    #[must_use]
    pub fn max_message_len(&self) -> usize {
        max_plaintext_len(&self.peer)
    }
}

impl std::fmt::Debug for SecureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureChannel")
            .field("local", &self.local.public_key())
            .field("peer", &self.peer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    use super::*;
    use crate::crypto::keys::test_support::{alice, bob};
    use crate::crypto::MAX_PLAINTEXT_SIZE;

    #[test]
    fn test_roundtrip() {
        let bob = bob();
        let longest = "x".repeat(MAX_PLAINTEXT_SIZE);
        for message in ["", "hi", "héllo wörld ✓", longest.as_str()] {
            let ciphertext = encrypt(message, bob.public_key()).unwrap();
            assert_eq!(decrypt(&ciphertext, bob.private_key()).unwrap(), message);
        }
    }

    #[test]
    fn test_max_plaintext_len_for_3072_bit_key() {
        assert_eq!(max_plaintext_len(bob().public_key()), 318);
    }

    #[test]
    fn test_oversized_message_rejected() {
        let bob = bob();
        let err = encrypt(&"x".repeat(319), bob.public_key()).unwrap_err();
        assert_eq!(err, CoreError::MessageTooLarge { max: 318, actual: 319 });
        assert!(err.is_recoverable());

        // Multi-byte characters count in bytes, not chars
        let err = encrypt(&"é".repeat(160), bob.public_key()).unwrap_err();
        assert!(matches!(err, CoreError::MessageTooLarge { actual: 320, .. }));
    }

    #[test]
    fn test_ciphertext_is_randomized() {
        let bob = bob();
        let a = encrypt("same", bob.public_key()).unwrap();
        let b = encrypt("same", bob.public_key()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let bob = bob();
        let ciphertext = encrypt("attack at dawn", bob.public_key()).unwrap();
        let bytes = BASE64.decode(&ciphertext).unwrap();
        assert_eq!(bytes.len(), 384);

        for index in [0, 1, 100, 200, 383] {
            let mut tampered = bytes.clone();
            tampered[index] ^= 0x01;
            let result = decrypt(&BASE64.encode(&tampered), bob.private_key());
            assert_eq!(result, Err(CoreError::Decryption), "byte {index}");
        }
    }

    #[test]
    fn test_wrong_key_and_garbage_fail_generically() {
        let ciphertext = encrypt("for bob only", bob().public_key()).unwrap();
        assert_eq!(
            decrypt(&ciphertext, alice().private_key()),
            Err(CoreError::Decryption)
        );
        assert_eq!(decrypt("not base64!", bob().private_key()), Err(CoreError::Decryption));
        assert_eq!(decrypt("", bob().private_key()), Err(CoreError::Decryption));
    }

    #[test]
    fn test_channel_pair() {
        let (alice, bob) = (alice(), bob());
        let a_to_b = SecureChannel::new(Arc::clone(&alice), bob.public_key().clone());
        let b_to_a = SecureChannel::new(Arc::clone(&bob), alice.public_key().clone());

        let line = a_to_b.seal("hello bob").unwrap();
        assert_eq!(b_to_a.open(&line).unwrap(), "hello bob");

        let line = b_to_a.seal("hello alice").unwrap();
        assert_eq!(a_to_b.open(&line).unwrap(), "hello alice");

        // A side cannot read what it sent to the peer
        assert_eq!(a_to_b.open(&a_to_b.seal("x").unwrap()), Err(CoreError::Decryption));
    }

    #[test]
    fn test_channel_rejects_line_breaks() {
        let channel = SecureChannel::new(alice(), bob().public_key().clone());
        assert_eq!(channel.seal("two\nlines"), Err(CoreError::EmbeddedNewline));
        assert_eq!(channel.seal("carriage\rreturn"), Err(CoreError::EmbeddedNewline));
        assert_eq!(channel.max_message_len(), 318);
    }
}
