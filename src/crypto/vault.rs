//! Identity vault
//!
//! Encrypts the serialized identity (key pair plus metadata) at rest under a
//! key derived from a low-entropy PIN. The backend only ever sees the opaque
//! locked package.
//!
//! Construction: PBKDF2-HMAC-SHA256 over the PIN with a fresh random 16-byte
//! salt, then AES-256-GCM under a fresh random 12-byte IV. Salt and IV are
//! stored in the clear next to the ciphertext; that is the standard contract
//! for this construction and not a secrecy requirement. The package carries a
//! version tag and its own iteration count so the work factor can be raised
//! later without breaking existing vaults.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::crypto::errors::{CryptoError, CryptoResult};

/// Lowest acceptable PBKDF2 work factor
///
/// PINs are low-entropy, so the derivation cost is the only thing slowing an
/// offline brute force. Lock never derives with fewer iterations than this.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Work factor applied by [`IdentityVault::new`]
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 210_000;

const VAULT_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;

/// A locked vault as persisted to the local store
///
/// Produced once per `lock` call and overwritten wholesale; never partially
/// updated. Serialized as a JSON object with base64 byte fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultPackage {
    /// Format version, for future migrations
    pub version: u8,
    /// Base64-encoded 16-byte PBKDF2 salt
    pub salt: String,
    /// Base64-encoded 12-byte AES-GCM IV
    pub iv: String,
    /// PBKDF2 iteration count this package was locked with
    pub iterations: u32,
    /// Base64-encoded ciphertext with the 16-byte GCM tag appended
    pub data: String,
}

impl VaultPackage {
    /// Serialize for storage
    pub fn to_json(&self) -> CryptoResult<String> {
        serde_json::to_string(self)
            .map_err(|e| CryptoError::SerializationError(format!("Failed to encode vault: {}", e)))
    }

    /// Parse a stored package
    pub fn from_json(json: &str) -> CryptoResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| CryptoError::SerializationError(format!("Failed to parse vault: {}", e)))
    }
}

/// PIN-based encryption of the identity blob
///
/// Stateless; all data is passed in and out explicitly. The only
/// configuration is the PBKDF2 work factor used for new packages.
#[derive(Debug, Clone)]
pub struct IdentityVault {
    iterations: u32,
}

impl Default for IdentityVault {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl IdentityVault {
    /// Create a vault with the default work factor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a vault with a custom work factor, clamped to the floor
    pub fn with_iterations(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(MIN_PBKDF2_ITERATIONS),
        }
    }

    /// The work factor new packages will be locked with
    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    /// Encrypt `secret_data` under a key derived from `pin`
    ///
    /// Fresh random salt and IV on every call, so locking the same data with
    /// the same PIN twice produces unrelated packages.
    pub fn lock(&self, secret_data: &str, pin: &str) -> CryptoResult<VaultPackage> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut key = derive_vault_key(pin, &salt, self.iterations);
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CryptoError::EncryptionError(format!("Invalid derived key: {}", e)))?;
        key.zeroize();

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), secret_data.as_bytes())
            .map_err(|e| CryptoError::EncryptionError(format!("AES-GCM encryption failed: {}", e)))?;

        let engine = &base64::engine::general_purpose::STANDARD;
        Ok(VaultPackage {
            version: VAULT_VERSION,
            salt: engine.encode(salt),
            iv: engine.encode(iv),
            iterations: self.iterations,
            data: engine.encode(ciphertext),
        })
    }

    /// Recover the plaintext from a locked package
    ///
    /// The key is re-derived with the salt and iteration count stored in the
    /// package, so packages locked under an older work factor keep opening
    /// after the default is raised.
    ///
    /// Every failure mode (malformed fields, wrong version, wrong PIN,
    /// tampered ciphertext) returns the same [`CryptoError::UnlockFailed`].
    pub fn unlock(&self, package: &VaultPackage, pin: &str) -> CryptoResult<String> {
        if package.version != VAULT_VERSION || package.iterations == 0 {
            return Err(CryptoError::UnlockFailed);
        }

        let engine = &base64::engine::general_purpose::STANDARD;
        let salt = engine.decode(&package.salt).map_err(|_| CryptoError::UnlockFailed)?;
        let iv = engine.decode(&package.iv).map_err(|_| CryptoError::UnlockFailed)?;
        let ciphertext = engine.decode(&package.data).map_err(|_| CryptoError::UnlockFailed)?;

        if salt.len() != SALT_LEN || iv.len() != IV_LEN {
            return Err(CryptoError::UnlockFailed);
        }

        let mut key = derive_vault_key(pin, &salt, package.iterations);
        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::UnlockFailed)?;
        key.zeroize();

        let plaintext = cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
            .map_err(|_| CryptoError::UnlockFailed)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::UnlockFailed)
    }

    /// Parse and unlock a serialized package in one step
    ///
    /// This is the entry point for blobs loaded from storage; parse errors
    /// are indistinguishable from a wrong PIN.
    pub fn unlock_blob(&self, blob: &str, pin: &str) -> CryptoResult<String> {
        let package = VaultPackage::from_json(blob).map_err(|_| CryptoError::UnlockFailed)?;
        self.unlock(&package, pin)
    }
}

/// Derive the 256-bit vault key from the PIN and salt
fn derive_vault_key(pin: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(pin.as_bytes(), salt, iterations, &mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    // The floor is plenty for tests; the default would just burn CPU.
    fn test_vault() -> IdentityVault {
        IdentityVault::with_iterations(MIN_PBKDF2_ITERATIONS)
    }

    #[test]
    fn test_roundtrip() {
        let vault = test_vault();
        let package = vault.lock("my secret identity", "1234").unwrap();
        let recovered = vault.unlock(&package, "1234").unwrap();
        assert_eq!(recovered, "my secret identity");
    }

    #[test]
    fn test_roundtrip_through_json() {
        let vault = test_vault();
        let blob = vault.lock("payload", "0000").unwrap().to_json().unwrap();
        assert_eq!(vault.unlock_blob(&blob, "0000").unwrap(), "payload");
    }

    #[test]
    fn test_wrong_pin_rejected() {
        let vault = test_vault();
        let package = vault.lock("secret", "1234").unwrap();
        let result = vault.unlock(&package, "4321");
        assert!(matches!(result, Err(CryptoError::UnlockFailed)));
    }

    #[test]
    fn test_lock_is_nondeterministic() {
        let vault = test_vault();
        let first = vault.lock("same data", "1234").unwrap();
        let second = vault.lock("same data", "1234").unwrap();

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.iv, second.iv);
        assert_ne!(first.data, second.data);

        assert_eq!(vault.unlock(&first, "1234").unwrap(), "same data");
        assert_eq!(vault.unlock(&second, "1234").unwrap(), "same data");
    }

    #[test]
    fn test_tampered_data_rejected() {
        let vault = test_vault();
        let mut package = vault.lock("secret", "1234").unwrap();

        let engine = &base64::engine::general_purpose::STANDARD;
        let mut data = engine.decode(&package.data).unwrap();
        data[0] ^= 0x01;
        package.data = engine.encode(data);

        let result = vault.unlock(&package, "1234");
        assert!(matches!(result, Err(CryptoError::UnlockFailed)));
    }

    #[test]
    fn test_malformed_blob_rejected() {
        let vault = test_vault();
        for blob in ["", "not json", "{\"version\":1}", "{\"salt\":\"!!\"}"] {
            let result = vault.unlock_blob(blob, "1234");
            assert!(matches!(result, Err(CryptoError::UnlockFailed)), "blob: {}", blob);
        }
    }

    #[test]
    fn test_unknown_version_rejected() {
        let vault = test_vault();
        let mut package = vault.lock("secret", "1234").unwrap();
        package.version = 2;
        assert!(matches!(vault.unlock(&package, "1234"), Err(CryptoError::UnlockFailed)));
    }

    #[test]
    fn test_iteration_floor_is_enforced() {
        let vault = IdentityVault::with_iterations(10);
        assert_eq!(vault.iterations(), MIN_PBKDF2_ITERATIONS);
    }

    #[test]
    fn test_unlock_uses_stored_iteration_count() {
        // A package locked under an old work factor still opens after the
        // configured default changes.
        let old = IdentityVault::with_iterations(MIN_PBKDF2_ITERATIONS);
        let package = vault_locked_with(&old);

        let new = IdentityVault::with_iterations(MIN_PBKDF2_ITERATIONS + 50_000);
        assert_eq!(new.unlock(&package, "1234").unwrap(), "secret");
    }

    fn vault_locked_with(vault: &IdentityVault) -> VaultPackage {
        vault.lock("secret", "1234").unwrap()
    }
}
