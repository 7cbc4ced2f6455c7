//! End-to-end encryption module
//!
//! This module implements the two cryptographic components of the Murmur
//! client: public-key message encryption between peers, and the PIN-locked
//! vault that protects the private key at rest.
//!
//! ## Components
//!
//! - **keys**: Curve25519 key pair generation and the serializable identity
//! - **exchange**: authenticated public-key encryption of message payloads
//! - **vault**: PBKDF2 + AES-GCM wrapping of the identity blob
//! - **errors**: shared error taxonomy
//!
//! ## Usage
//!
//! ```rust,ignore
//! use murmur_core::crypto::{exchange, IdentityVault, KeyPair, StoredIdentity};
//!
//! // Once per identity
//! let keypair = KeyPair::generate();
//!
//! // Wrap for local storage
//! let vault = IdentityVault::new();
//! let blob = vault
//!     .lock(&StoredIdentity::from_keypair("me", &keypair).to_json()?, "1234")?
//!     .to_json()?;
//!
//! // Per message
//! let msg = exchange::encrypt_message("hello", keypair.secret(), &peer_public)?;
//! ```

pub mod errors;
pub mod exchange;
pub mod keys;
pub mod vault;

// Re-export commonly used types
pub use errors::{CryptoError, CryptoResult};
pub use exchange::{decrypt_message, encrypt_message, EncryptedMessage};
pub use keys::{KeyPair, StoredIdentity};
pub use vault::{IdentityVault, VaultPackage};
