// ============================================
// File: crates/sealtalk-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Defines the RSA key identity used by both endpoints, its canonical text
//! encoding, and the fingerprint that every trust decision is based on.
//!
//! ## Main Functionality
//! - `KeyPair`: RSA-3072 private key plus its cached public half
//! - `PublicKey`: public key with its canonical SPKI DER bytes
//! - `PrivateKey`: private key, PKCS#8 encoded for storage
//! - `Fingerprint`: SHA-256 of the SPKI DER bytes
//! - `encode` / `decode`: base64-wrapped DER text form
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  Client KeyPair                                            │
//! │  ├─ Generated fresh at process start                       │
//! │  └─ Dropped (zeroized) at exit                             │
//! │                                                            │
//! │  Server KeyPair                                            │
//! │  ├─ Loaded from the key file, or generated and saved once  │
//! │  └─ Its fingerprint is what clients pin                    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Fingerprints are computed over the re-encoded DER, never over the raw
//!   received text, so a non-canonical encoding cannot pass verification
//! - Private key material must never reach `Debug` output or logs
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::{FINGERPRINT_SIZE, RSA_KEY_BITS};
use crate::error::{CoreError, Result};

// ============================================
// KeyPair
// ============================================

/// Long-term RSA key pair identifying one endpoint.
///
/// # Example
/// ```ignore
/// use sealtalk_core::crypto::KeyPair;
///
/// let identity = KeyPair::generate()?;
/// println!("fingerprint: {}", identity.fingerprint().to_hex());
/// ```
pub struct KeyPair {
    private: PrivateKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generates a new RSA-3072 key pair from the OS random number generator.
    ///
    /// # Errors
    /// Returns `KeyGeneration` if the RSA provider fails.
    pub fn generate() -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS).map_err(|e| {
            CoreError::key_generation(format!("RSA-{RSA_KEY_BITS}: {e}"))
        })?;
        Self::from_private_key(PrivateKey(private))
    }

    /// Rebuilds a key pair from its private half.
    ///
    /// # Errors
    /// Returns `KeyGeneration` if the public key cannot be encoded.
    pub fn from_private_key(private: PrivateKey) -> Result<Self> {
        let public = PublicKey::from_rsa(private.0.to_public_key())
            .map_err(|e| CoreError::key_generation(e.to_string()))?;
        Ok(Self { private, public })
    }

    /// Returns the public half.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Returns the private half.
    #[must_use]
    pub fn private_key(&self) -> &PrivateKey {
        &self.private
    }

    /// Returns the fingerprint of the public half.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.public.fingerprint()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print private key material
        f.debug_struct("KeyPair")
            .field("public_key", &self.public)
            .finish_non_exhaustive()
    }
}

// ============================================
// PublicKey
// ============================================

/// RSA public key together with its canonical SPKI DER encoding.
#[derive(Clone)]
pub struct PublicKey {
    inner: RsaPublicKey,
    der: Vec<u8>,
}

impl PublicKey {
    /// Wraps an RSA public key, computing its canonical encoding.
    ///
    /// # Errors
    /// Returns `MalformedKey` if the key cannot be DER-encoded.
    pub fn from_rsa(inner: RsaPublicKey) -> Result<Self> {
        let der = inner
            .to_public_key_der()
            .map_err(|e| CoreError::malformed_key(format!("SPKI encoding failed: {e}")))?
            .as_bytes()
            .to_vec();
        Ok(Self { inner, der })
    }

    /// Parses SPKI DER bytes.
    ///
    /// # Errors
    /// Returns `MalformedKey` if the bytes are not an RSA SPKI structure.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        let inner = RsaPublicKey::from_public_key_der(bytes)
            .map_err(|e| CoreError::malformed_key(format!("invalid SPKI DER: {e}")))?;
        Self::from_rsa(inner)
    }

    /// Decodes the base64 wire form.
    ///
    /// # Errors
    /// Returns `MalformedKey` on invalid base64 or DER.
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(text.trim())
            .map_err(|e| CoreError::malformed_key(format!("invalid base64: {e}")))?;
        Self::from_der(&bytes)
    }

    /// Returns the canonical SPKI DER bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the base64 wire form.
    #[must_use]
    pub fn encode(&self) -> String {
        BASE64.encode(&self.der)
    }

    /// Returns the modulus length in bytes.
    #[must_use]
    pub fn modulus_len(&self) -> usize {
        self.inner.size()
    }

    /// Returns the SHA-256 fingerprint of the canonical encoding.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.der)
    }

    /// Returns the underlying RSA key.
    #[must_use]
    pub fn as_rsa(&self) -> &RsaPublicKey {
        &self.inner
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fp = self.fingerprint();
        let bytes = fp.as_bytes();
        write!(
            f,
            "PublicKey(rsa-{}, {:02x}{:02x}{:02x}{:02x}...)",
            self.modulus_len() * 8,
            bytes[0],
            bytes[1],
            bytes[2],
            bytes[3]
        )
    }
}

// ============================================
// PrivateKey
// ============================================

/// RSA private key. Zeroized on drop by the `rsa` crate.
#[derive(Clone)]
pub struct PrivateKey(RsaPrivateKey);

impl PrivateKey {
    /// Returns the base64 PKCS#8 form for storage.
    ///
    /// # Errors
    /// Returns `MalformedKey` if PKCS#8 encoding fails.
    pub fn encode(&self) -> Result<Zeroizing<String>> {
        let doc = self
            .0
            .to_pkcs8_der()
            .map_err(|e| CoreError::malformed_key(format!("PKCS#8 encoding failed: {e}")))?;
        Ok(Zeroizing::new(BASE64.encode(doc.as_bytes())))
    }

    /// Decodes the base64 PKCS#8 form.
    ///
    /// # Errors
    /// Returns `MalformedKey` on invalid base64 or DER.
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            BASE64
                .decode(text.trim())
                .map_err(|e| CoreError::malformed_key(format!("invalid base64: {e}")))?,
        );
        let inner = RsaPrivateKey::from_pkcs8_der(&bytes)
            .map_err(|_| CoreError::malformed_key("invalid PKCS#8 DER"))?;
        Ok(Self(inner))
    }

    /// Returns the underlying RSA key.
    #[must_use]
    pub fn as_rsa(&self) -> &RsaPrivateKey {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

// ============================================
// Key / KeyKind (text codec)
// ============================================

/// Which half of a key pair a text encoding holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// SPKI-encoded public key.
    Public,
    /// PKCS#8-encoded private key.
    Private,
}

/// A decoded key of either kind.
#[derive(Debug, Clone)]
pub enum Key {
    /// Public key.
    Public(PublicKey),
    /// Private key.
    Private(PrivateKey),
}

/// Encodes a key as base64-wrapped DER.
///
/// # Errors
/// Returns `MalformedKey` if DER encoding fails.
pub fn encode(key: &Key) -> Result<Zeroizing<String>> {
    match key {
        Key::Public(public) => Ok(Zeroizing::new(public.encode())),
        Key::Private(private) => private.encode(),
    }
}

/// Decodes base64-wrapped DER of the given kind.
///
/// # Errors
/// Returns `MalformedKey` on invalid base64 or DER.
pub fn decode(text: &str, kind: KeyKind) -> Result<Key> {
    match kind {
        KeyKind::Public => PublicKey::from_base64(text).map(Key::Public),
        KeyKind::Private => PrivateKey::from_base64(text).map(Key::Private),
    }
}

/// Computes the fingerprint of a public key.
#[must_use]
pub fn fingerprint(key: &PublicKey) -> Fingerprint {
    key.fingerprint()
}

// ============================================
// Fingerprint
// ============================================

/// SHA-256 digest of a public key's canonical SPKI DER bytes.
///
/// Displayed as base64 (wire form) or colon-separated hex (for humans).
#[derive(Clone, Copy)]
pub struct Fingerprint([u8; FINGERPRINT_SIZE]);

impl Fingerprint {
    /// Hashes canonical key bytes.
    #[must_use]
    pub fn of(der: &[u8]) -> Self {
        Self(Sha256::digest(der).into())
    }

    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; FINGERPRINT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_SIZE] {
        &self.0
    }

    /// Parses the base64 wire form.
    ///
    /// # Errors
    /// Returns `MalformedMessage` if the text is not base64 of 32 bytes.
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(text.trim())
            .map_err(|e| CoreError::malformed(format!("fingerprint is not base64: {e}")))?;
        let arr: [u8; FINGERPRINT_SIZE] = bytes.try_into().map_err(|b: Vec<u8>| {
            CoreError::malformed(format!(
                "fingerprint must be {FINGERPRINT_SIZE} bytes, got {}",
                b.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Parses either the base64 form or the colon-separated hex form.
    ///
    /// # Errors
    /// Returns `MalformedMessage` if neither form matches.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.contains(':') {
            let compact: String = text.split(':').collect();
            let bytes = hex::decode(compact)
                .map_err(|e| CoreError::malformed(format!("fingerprint is not hex: {e}")))?;
            let arr: [u8; FINGERPRINT_SIZE] = bytes
                .try_into()
                .map_err(|_| CoreError::malformed("fingerprint must be 32 bytes"))?;
            return Ok(Self(arr));
        }
        Self::from_base64(text)
    }

    /// Returns the base64 wire form.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Returns the colon-separated uppercase hex form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

// Constant-time equality comparison
impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Fingerprint {}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fingerprint({:02x}{:02x}{:02x}{:02x}...)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

// ============================================
// Test Support
// ============================================

/// Cached key pairs for tests. RSA-3072 generation takes seconds, so each
/// identity is generated once per test binary.
#[cfg(any(test, feature = "test-util"))]
#[allow(missing_docs, clippy::missing_panics_doc)]
pub mod test_support {
    use std::sync::{Arc, OnceLock};

    use super::KeyPair;

    fn cached(slot: &'static OnceLock<Arc<KeyPair>>) -> Arc<KeyPair> {
        Arc::clone(slot.get_or_init(|| {
            Arc::new(KeyPair::generate().expect("test key generation"))
        }))
    }

    pub fn alice() -> Arc<KeyPair> {
        static SLOT: OnceLock<Arc<KeyPair>> = OnceLock::new();
        cached(&SLOT)
    }

    pub fn bob() -> Arc<KeyPair> {
        static SLOT: OnceLock<Arc<KeyPair>> = OnceLock::new();
        cached(&SLOT)
    }

    pub fn mallory() -> Arc<KeyPair> {
        static SLOT: OnceLock<Arc<KeyPair>> = OnceLock::new();
        cached(&SLOT)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::test_support::{alice, bob};
    use super::*;

    #[test]
    fn test_generated_key_size() {
        let kp = alice();
        assert_eq!(kp.public_key().modulus_len(), 384);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let kp = alice();
        let first = fingerprint(kp.public_key());
        let second = fingerprint(kp.public_key());
        assert_eq!(first.as_bytes(), second.as_bytes());

        // Decoding the wire form yields the same fingerprint
        let decoded = PublicKey::from_base64(&kp.public_key().encode()).unwrap();
        assert_eq!(decoded.fingerprint(), first);
    }

    #[test]
    fn test_distinct_keys_have_distinct_fingerprints() {
        assert_ne!(alice().fingerprint(), bob().fingerprint());
        assert_ne!(alice().public_key(), bob().public_key());
    }

    #[test]
    fn test_fingerprint_matches_sha256_of_der() {
        let kp = alice();
        let expected: [u8; 32] = Sha256::digest(kp.public_key().der()).into();
        assert_eq!(kp.fingerprint().as_bytes(), &expected);
    }

    #[test]
    fn test_fingerprint_text_forms() {
        let fp = alice().fingerprint();

        let b64 = fp.to_base64();
        assert_eq!(b64.len(), 44);
        assert_eq!(Fingerprint::from_base64(&b64).unwrap(), fp);

        let hex_form = fp.to_hex();
        assert_eq!(hex_form.split(':').count(), 32);
        assert_eq!(Fingerprint::parse(&hex_form).unwrap(), fp);
        assert_eq!(Fingerprint::parse(&b64).unwrap(), fp);

        assert!(Fingerprint::from_base64("AAAA").is_err());
        assert!(Fingerprint::from_base64("not base64!").is_err());
    }

    #[test]
    fn test_private_key_roundtrip() {
        let kp = alice();
        let text = encode(&Key::Private(kp.private_key().clone())).unwrap();

        let Key::Private(private) = decode(&text, KeyKind::Private).unwrap() else {
            panic!("expected private key");
        };
        let restored = KeyPair::from_private_key(private).unwrap();
        assert_eq!(restored.public_key(), kp.public_key());
    }

    #[test]
    fn test_decode_rejects_malformed_keys() {
        let err = decode("%%%", KeyKind::Public).unwrap_err();
        assert!(matches!(err, CoreError::MalformedKey { .. }));

        let err = decode(&BASE64.encode(b"not a key"), KeyKind::Public).unwrap_err();
        assert!(matches!(err, CoreError::MalformedKey { .. }));

        let err = decode(&BASE64.encode(b"not a key"), KeyKind::Private).unwrap_err();
        assert!(err.is_security_fatal());
    }

    #[test]
    fn test_debug_never_prints_private_key() {
        let kp = alice();
        let debug = format!("{:?}", kp.private_key());
        assert_eq!(debug, "PrivateKey([REDACTED])");
        assert!(!format!("{kp:?}").contains(&*kp.private_key().encode().unwrap()));
    }
}
