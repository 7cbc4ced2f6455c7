//! Shared data types for API and database operations

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::errors::CryptoResult;
use crate::crypto::exchange::EncryptedMessage;

// ============================================================================
// Directory Types
// ============================================================================

/// A user's entry in the public-key directory
///
/// The directory is an external collaborator; this layer only consumes the
/// base64-encoded public key it returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Base64-encoded Curve25519 public key
    pub public_key: String,
}

// ============================================================================
// Transport Types
// ============================================================================

/// An encrypted message in transit
///
/// Sender, receiver, and timestamp travel in the clear; only nonce and
/// ciphertext come out of the crypto layer. The transport never sees
/// plaintext or keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    /// Base64-encoded 24-byte nonce
    pub nonce: String,
    /// Base64-encoded ciphertext (includes the auth tag)
    pub ciphertext: String,
    pub created_at: DateTime<Utc>,
}

impl Envelope {
    /// Wrap an encrypted message for the transport
    pub fn seal(sender_id: &str, receiver_id: &str, msg: &EncryptedMessage) -> Self {
        let engine = &base64::engine::general_purpose::STANDARD;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            nonce: engine.encode(msg.nonce),
            ciphertext: engine.encode(&msg.ciphertext),
            created_at: Utc::now(),
        }
    }

    /// Decode the payload for decryption
    ///
    /// `sender_public` comes from the directory, not from the envelope; the
    /// envelope itself carries no key material.
    pub fn to_message(&self, sender_public: &[u8; 32]) -> CryptoResult<EncryptedMessage> {
        let engine = &base64::engine::general_purpose::STANDARD;
        let nonce = engine.decode(&self.nonce).map_err(|e| {
            crate::crypto::CryptoError::SerializationError(format!("Bad nonce encoding: {}", e))
        })?;
        let ciphertext = engine.decode(&self.ciphertext).map_err(|e| {
            crate::crypto::CryptoError::SerializationError(format!("Bad ciphertext encoding: {}", e))
        })?;

        EncryptedMessage::from_parts(&nonce, ciphertext, sender_public)
    }
}

/// A message received during sync, after a decryption attempt
///
/// `body` is `None` when authentication failed; callers can render
/// "decryption failed" without confusing it with an empty message.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub envelope_id: String,
    pub sender_id: String,
    pub created_at: DateTime<Utc>,
    pub body: Option<String>,
}

// ============================================================================
// Local Storage Types
// ============================================================================

/// A locally cached plaintext message
///
/// Outgoing plaintext is written at send time because the one-way box cannot
/// be reopened by its author; incoming plaintext is written after a
/// successful decryption.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: String,
    pub peer_id: String,
    pub outgoing: bool,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
