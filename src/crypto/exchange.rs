//! Authenticated public-key message encryption
//!
//! One-way "box" construction between two static Curve25519 keys:
//! an X25519 shared secret is expanded with HKDF-SHA256 into a direction-bound
//! symmetric key, and the message is sealed with XChaCha20-Poly1305 under a
//! fresh random 24-byte nonce.
//!
//! The HKDF info string includes the sender and recipient public keys in that
//! order, so the key for A->B traffic differs from the key for B->A traffic.
//! A sender holding only their own secret key and the recipient's public key
//! cannot reopen their own ciphertext; callers that need to display sent
//! messages must retain the plaintext at send time.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::crypto::errors::{CryptoError, CryptoResult};

/// Nonce length for XChaCha20-Poly1305
pub const NONCE_LEN: usize = 24;

/// Domain separation label for the message key derivation
const BOX_KDF_INFO: &[u8] = b"murmur box v1";

/// An encrypted message as produced by [`encrypt_message`]
///
/// Immutable once created. `sender_public` is included for the receiver's
/// convenience only; it is not authenticated by the box construction.
#[derive(Debug, Clone)]
pub struct EncryptedMessage {
    /// Fresh random nonce, unique per encryption call
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the 16-byte Poly1305 tag appended
    pub ciphertext: Vec<u8>,
    /// The sender's own public key
    pub sender_public: [u8; 32],
}

impl EncryptedMessage {
    /// Reassemble a message received from the transport
    pub fn from_parts(
        nonce: &[u8],
        ciphertext: Vec<u8>,
        sender_public: &[u8],
    ) -> CryptoResult<Self> {
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| CryptoError::InvalidNonce("Nonce must be 24 bytes".to_string()))?;
        let sender_public: [u8; 32] = sender_public
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Sender public key must be 32 bytes".to_string()))?;

        Ok(Self {
            nonce,
            ciphertext,
            sender_public,
        })
    }
}

/// Derive the directed symmetric key for one sender->recipient pair
///
/// The shared secret is the same in both directions; the info string is not.
fn derive_message_key(
    shared_secret: &[u8; 32],
    sender_public: &PublicKey,
    recipient_public: &PublicKey,
) -> [u8; 32] {
    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);

    let mut info = Vec::with_capacity(BOX_KDF_INFO.len() + 64);
    info.extend_from_slice(BOX_KDF_INFO);
    info.extend_from_slice(sender_public.as_bytes());
    info.extend_from_slice(recipient_public.as_bytes());

    let mut key = [0u8; 32];
    hkdf.expand(&info, &mut key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    key
}

/// Encrypt a text message for a peer
///
/// Draws a fresh random 24-byte nonce on every call. Nonce reuse under the
/// same key pair breaks both confidentiality and integrity, so the nonce is
/// never caller-supplied.
pub fn encrypt_message(
    plaintext: &str,
    my_secret: &StaticSecret,
    their_public: &PublicKey,
) -> CryptoResult<EncryptedMessage> {
    let my_public = PublicKey::from(my_secret);
    let shared = my_secret.diffie_hellman(their_public);

    let mut key = derive_message_key(shared.as_bytes(), &my_public, their_public);
    let cipher = XChaCha20Poly1305::new_from_slice(&key)
        .map_err(|e| CryptoError::EncryptionError(format!("Invalid derived key: {}", e)))?;
    key.zeroize();

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| CryptoError::EncryptionError(format!("AEAD encryption failed: {}", e)))?;

    Ok(EncryptedMessage {
        nonce: nonce_bytes,
        ciphertext,
        sender_public: my_public.to_bytes(),
    })
}

/// Decrypt a message from a peer
///
/// `their_public` must be the sender's public key. The Poly1305 tag is
/// verified before any plaintext is released; on failure this returns
/// [`CryptoError::DecryptionFailed`] with no further detail and no partial
/// plaintext.
pub fn decrypt_message(
    msg: &EncryptedMessage,
    my_secret: &StaticSecret,
    their_public: &PublicKey,
) -> CryptoResult<String> {
    let my_public = PublicKey::from(my_secret);
    let shared = my_secret.diffie_hellman(their_public);

    // The sender derived with (sender, recipient) = (their key, our key).
    let mut key = derive_message_key(shared.as_bytes(), their_public, &my_public);
    let cipher = XChaCha20Poly1305::new_from_slice(&key)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    key.zeroize();

    let nonce = XNonce::from_slice(&msg.nonce);
    let plaintext = cipher
        .decrypt(nonce, msg.ciphertext.as_ref())
        .map_err(|_| CryptoError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;

    #[test]
    fn test_roundtrip() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let msg = encrypt_message("hello", alice.secret(), &bob.public).unwrap();
        let plaintext = decrypt_message(&msg, bob.secret(), &alice.public).unwrap();

        assert_eq!(plaintext, "hello");
    }

    #[test]
    fn test_roundtrip_empty_and_unicode() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        for text in ["", "caf\u{e9} \u{1f512}", "line one\nline two"] {
            let msg = encrypt_message(text, alice.secret(), &bob.public).unwrap();
            assert_eq!(decrypt_message(&msg, bob.secret(), &alice.public).unwrap(), text);
        }
    }

    #[test]
    fn test_cross_key_failure() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let eve = KeyPair::generate();

        let msg = encrypt_message("secret", alice.secret(), &bob.public).unwrap();

        let result = decrypt_message(&msg, eve.secret(), &alice.public);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_nonce_uniqueness() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let first = encrypt_message("same text", alice.secret(), &bob.public).unwrap();
        let second = encrypt_message("same text", alice.secret(), &bob.public).unwrap();

        assert_ne!(first.nonce, second.nonce);
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let msg = encrypt_message("payload", alice.secret(), &bob.public).unwrap();

        for i in 0..msg.ciphertext.len() {
            let mut tampered = msg.clone();
            tampered.ciphertext[i] ^= 0x01;
            let result = decrypt_message(&tampered, bob.secret(), &alice.public);
            assert!(result.is_err(), "bit flip at byte {} was not detected", i);
        }
    }

    #[test]
    fn test_tampered_nonce_rejected() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let mut msg = encrypt_message("payload", alice.secret(), &bob.public).unwrap();
        msg.nonce[0] ^= 0x01;

        let result = decrypt_message(&msg, bob.secret(), &alice.public);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_from_parts_validates_lengths() {
        let alice = KeyPair::generate();

        let short_nonce = EncryptedMessage::from_parts(
            &[0u8; 12],
            vec![1, 2, 3],
            &alice.public_key_bytes(),
        );
        assert!(matches!(short_nonce, Err(CryptoError::InvalidNonce(_))));

        let short_key = EncryptedMessage::from_parts(&[0u8; 24], vec![1, 2, 3], &[0u8; 16]);
        assert!(matches!(short_key, Err(CryptoError::InvalidKey(_))));
    }

    /// A encrypts "ping" to B, B replies "pong"; both decrypt correctly, but
    /// A cannot reopen its own "ping" ciphertext with (A.secret, B.public).
    #[test]
    fn test_ping_pong_and_one_way_property() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();

        let ping = encrypt_message("ping", alice.secret(), &bob.public).unwrap();
        assert_eq!(decrypt_message(&ping, bob.secret(), &alice.public).unwrap(), "ping");

        let pong = encrypt_message("pong", bob.secret(), &alice.public).unwrap();
        assert_eq!(decrypt_message(&pong, alice.secret(), &bob.public).unwrap(), "pong");

        let own = decrypt_message(&ping, alice.secret(), &bob.public);
        assert!(matches!(own, Err(CryptoError::DecryptionFailed)));
    }
}
