//! Cryptographic error types
//!
//! This module defines all error types for the identity vault and the
//! message encryption layer.

use thiserror::Error;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A key had the wrong length or could not be parsed.
    ///
    /// This is a caller contract violation (an upstream bug), not an
    /// expected runtime condition.
    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    /// A nonce or IV had the wrong length
    #[error("Invalid nonce format: {0}")]
    InvalidNonce(String),

    /// Encryption failed in the underlying AEAD primitive
    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    /// Message authentication failed during decryption
    ///
    /// Wrong key pair, tampered ciphertext, or a message never meant for
    /// this recipient. Carries no detail on purpose.
    #[error("Decryption failed")]
    DecryptionFailed,

    /// The vault could not be opened with the supplied PIN
    ///
    /// Deliberately covers malformed blobs, wrong PINs, and tampered
    /// ciphertext alike so callers (and attackers) cannot tell the failure
    /// modes apart.
    #[error("Vault unlock failed")]
    UnlockFailed,

    /// Serialization or encoding error outside the unlock path
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
