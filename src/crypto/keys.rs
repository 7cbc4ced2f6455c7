//! Key types and generation
//!
//! This module defines the Curve25519 key pair that identifies a user and
//! the serializable form that goes inside the identity vault:
//! - `KeyPair`: X25519 keys for Diffie-Hellman message encryption
//! - `StoredIdentity`: key pair plus identity metadata, serialized as JSON
//!   before being locked into the vault

use base64::Engine;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::errors::{CryptoError, CryptoResult};

/// Curve25519 key pair for message encryption
///
/// Generated once per identity. The public half is published to the
/// directory; the secret half never leaves the client unencrypted.
pub struct KeyPair {
    /// Public key (safe to share)
    pub public: PublicKey,
    /// Secret key (never leaves device)
    secret: StaticSecret,
}

impl KeyPair {
    /// Generate a new random key pair
    ///
    /// Uses the operating system CSPRNG. If the platform cannot supply
    /// entropy this aborts rather than falling back to a weaker source.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let public = PublicKey::from(&secret);
        Self { public, secret }
    }

    /// Restore from existing key bytes
    pub fn from_bytes(public_bytes: &[u8], secret_bytes: &[u8]) -> CryptoResult<Self> {
        let public_arr: [u8; 32] = public_bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Public key must be 32 bytes".to_string()))?;
        let secret_arr: [u8; 32] = secret_bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Secret key must be 32 bytes".to_string()))?;

        Ok(Self {
            public: PublicKey::from(public_arr),
            secret: StaticSecret::from(secret_arr),
        })
    }

    /// Borrow the secret key for encryption operations
    pub fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    /// Get the public key bytes
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.public.to_bytes()
    }

    /// Get the secret key bytes (for vault storage only)
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }

    /// Compute a short fingerprint for key verification in UIs
    pub fn fingerprint(&self) -> String {
        use sha2::{Digest, Sha256};
        let hash = Sha256::digest(self.public.as_bytes());
        hex::encode(&hash[..8])
    }
}

/// Parse a base64-encoded public key received from the directory
pub fn public_key_from_base64(encoded: &str) -> CryptoResult<PublicKey> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::InvalidKey(format!("Public key is not valid base64: {}", e)))?;
    let arr: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("Public key must be 32 bytes".to_string()))?;
    Ok(PublicKey::from(arr))
}

/// Encode a public key for the directory
pub fn public_key_to_base64(key: &PublicKey) -> String {
    base64::engine::general_purpose::STANDARD.encode(key.as_bytes())
}

/// Serializable key pair plus identity metadata
///
/// This is the plaintext that gets locked into the identity vault. It only
/// exists in memory between unlock and logout, and is wiped on drop.
#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct StoredIdentity {
    /// Application-level user id this key pair belongs to
    pub user_id: String,
    /// Base64-encoded public key
    pub public_key: String,
    /// Base64-encoded secret key
    pub secret_key: String,
}

impl StoredIdentity {
    /// Capture a key pair for vault storage
    pub fn from_keypair(user_id: &str, keypair: &KeyPair) -> Self {
        let engine = &base64::engine::general_purpose::STANDARD;
        Self {
            user_id: user_id.to_string(),
            public_key: engine.encode(keypair.public_key_bytes()),
            secret_key: engine.encode(keypair.secret_key_bytes()),
        }
    }

    /// Restore the key pair
    pub fn to_keypair(&self) -> CryptoResult<KeyPair> {
        let engine = &base64::engine::general_purpose::STANDARD;
        let public = engine.decode(&self.public_key).map_err(|e| {
            CryptoError::SerializationError(format!("Failed to decode public key: {}", e))
        })?;
        let mut secret = engine.decode(&self.secret_key).map_err(|e| {
            CryptoError::SerializationError(format!("Failed to decode secret key: {}", e))
        })?;

        let keypair = KeyPair::from_bytes(&public, &secret);
        secret.zeroize();
        keypair
    }

    /// Serialize to the JSON text handed to the vault
    pub fn to_json(&self) -> CryptoResult<String> {
        serde_json::to_string(self)
            .map_err(|e| CryptoError::SerializationError(format!("Failed to encode identity: {}", e)))
    }

    /// Parse from vault plaintext
    pub fn from_json(json: &str) -> CryptoResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CryptoError::SerializationError(format!("Failed to parse identity: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let key = KeyPair::generate();
        assert_eq!(key.public_key_bytes().len(), 32);
        assert_eq!(key.secret_key_bytes().len(), 32);
    }

    #[test]
    fn test_key_generation_is_random() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_ne!(a.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn test_from_bytes_roundtrip() {
        let key = KeyPair::generate();
        let restored =
            KeyPair::from_bytes(&key.public_key_bytes(), &key.secret_key_bytes()).unwrap();
        assert_eq!(restored.public_key_bytes(), key.public_key_bytes());
        assert_eq!(restored.secret_key_bytes(), key.secret_key_bytes());
    }

    #[test]
    fn test_from_bytes_rejects_wrong_length() {
        let key = KeyPair::generate();
        let result = KeyPair::from_bytes(&[0u8; 16], &key.secret_key_bytes());
        assert!(matches!(result, Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_base64_roundtrip() {
        let key = KeyPair::generate();
        let encoded = public_key_to_base64(&key.public);
        let decoded = public_key_from_base64(&encoded).unwrap();
        assert_eq!(decoded.as_bytes(), key.public.as_bytes());
    }

    #[test]
    fn test_base64_rejects_short_key() {
        let encoded = base64::engine::general_purpose::STANDARD.encode([0u8; 31]);
        assert!(public_key_from_base64(&encoded).is_err());
    }

    #[test]
    fn test_stored_identity_roundtrip() {
        let key = KeyPair::generate();
        let stored = StoredIdentity::from_keypair("user-1", &key);
        let json = stored.to_json().unwrap();

        let parsed = StoredIdentity::from_json(&json).unwrap();
        assert_eq!(parsed.user_id, "user-1");

        let restored = parsed.to_keypair().unwrap();
        assert_eq!(restored.public_key_bytes(), key.public_key_bytes());
        assert_eq!(restored.secret_key_bytes(), key.secret_key_bytes());
    }

    #[test]
    fn test_fingerprint() {
        let key = KeyPair::generate();
        let fingerprint = key.fingerprint();
        assert_eq!(fingerprint.len(), 16); // 8 bytes as hex = 16 chars
    }
}
