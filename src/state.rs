//! Session state management
//!
//! The unlocked key pair lives in a session-scoped `Identity` that is
//! exclusively owned by the authenticated session: created on enroll or
//! unlock, passed by reference to every operation that needs it, and
//! destroyed on lock or logout. Nothing here is global.

use std::collections::HashMap;

use sqlx::SqlitePool;
use x25519_dalek::PublicKey;
use zeroize::Zeroize;

use crate::api::ApiClient;
use crate::crypto::keys::{public_key_from_base64, public_key_to_base64};
use crate::crypto::{decrypt_message, encrypt_message, IdentityVault, KeyPair, StoredIdentity};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{DirectoryEntry, Envelope, InboundMessage, MessageRecord};

/// User session information
#[derive(Debug, Clone)]
pub struct UserSession {
    pub user_id: String,
    pub username: Option<String>,
    pub token: String,
}

/// The unlocked identity for the current session
///
/// Holds the only in-memory copy of the secret key. Dropped (and wiped) on
/// lock or logout.
pub struct Identity {
    pub user_id: String,
    keypair: KeyPair,
}

impl Identity {
    /// The public half, safe to publish
    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }

    /// Short fingerprint for verification UIs
    pub fn fingerprint(&self) -> String {
        self.keypair.fingerprint()
    }
}

/// Client application state
///
/// Owns the database pool, the backend client, and the (optional) unlocked
/// identity for the authenticated session.
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,

    /// Backend API client (directory + transport)
    api: ApiClient,

    /// Vault configuration for locking new packages
    vault: IdentityVault,

    /// Current user session (None if not authenticated)
    session: Option<UserSession>,

    /// Unlocked identity (None while the vault is locked)
    identity: Option<Identity>,
}

impl AppState {
    /// Create new application state with a database connection
    pub async fn new(db_path: &str, api_url: &str) -> AppResult<Self> {
        let pool = db::init_db(db_path).await?;
        Ok(Self::from_parts(pool, ApiClient::new(api_url), IdentityVault::new()))
    }

    /// Assemble state from already-built parts
    pub fn from_parts(db: SqlitePool, api: ApiClient, vault: IdentityVault) -> Self {
        Self {
            db,
            api,
            vault,
            session: None,
            identity: None,
        }
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Check if user is authenticated
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// Set user session after successful authentication
    pub fn set_session(&mut self, session: UserSession) {
        self.session = Some(session);
    }

    /// Clear session and destroy the in-memory identity
    pub fn logout(&mut self) {
        self.identity = None;
        self.session = None;
        tracing::info!("Session cleared");
    }

    /// Require authentication, returning error if not authenticated
    pub fn require_auth(&self) -> AppResult<&UserSession> {
        self.session.as_ref().ok_or(AppError::NotAuthenticated)
    }

    /// Require an unlocked identity
    pub fn require_identity(&self) -> AppResult<&Identity> {
        self.identity.as_ref().ok_or(AppError::IdentityLocked)
    }

    // ========================================================================
    // Identity Lifecycle
    // ========================================================================

    /// Generate a fresh identity and persist it locked under `pin`
    ///
    /// Refuses to overwrite an existing vault: replacing the key pair would
    /// orphan every message encrypted to the old one.
    pub async fn create_identity(&mut self, pin: &str) -> AppResult<()> {
        let session = self.require_auth()?;
        let user_id = session.user_id.clone();

        if db::load_vault(&self.db, &user_id).await?.is_some() {
            return Err(AppError::IdentityExists(user_id));
        }

        let keypair = KeyPair::generate();
        let stored = StoredIdentity::from_keypair(&user_id, &keypair);

        let blob = self.lock_to_blob(stored, pin.to_string()).await?;
        db::save_vault(&self.db, &user_id, &blob).await?;

        self.identity = Some(Identity { user_id: user_id.clone(), keypair });
        tracing::info!("Created identity for user: {}", user_id);
        Ok(())
    }

    /// Upload the public key to the directory
    pub async fn publish_identity(&self) -> AppResult<()> {
        let session = self.require_auth()?;
        let identity = self.require_identity()?;

        let entry = DirectoryEntry {
            user_id: identity.user_id.clone(),
            username: session.username.clone(),
            public_key: public_key_to_base64(identity.public_key()),
        };
        self.api.publish_key(&entry, &session.token).await?;

        tracing::info!("Published public key for user: {}", identity.user_id);
        Ok(())
    }

    /// Recover the identity from the stored vault on login
    pub async fn unlock_identity(&mut self, pin: &str) -> AppResult<()> {
        let session = self.require_auth()?;
        let user_id = session.user_id.clone();

        let blob = db::load_vault(&self.db, &user_id)
            .await?
            .ok_or_else(|| AppError::IdentityNotFound(user_id.clone()))?;

        let vault = self.vault.clone();
        let pin = pin.to_string();
        let mut plaintext = tokio::task::spawn_blocking(move || vault.unlock_blob(&blob, &pin))
            .await
            .map_err(|e| AppError::Internal(format!("Unlock task failed: {}", e)))??;

        let stored = StoredIdentity::from_json(&plaintext);
        plaintext.zeroize();
        let stored = stored?;
        let keypair = stored.to_keypair()?;

        self.identity = Some(Identity {
            user_id: stored.user_id.clone(),
            keypair,
        });
        tracing::info!("Unlocked identity for user: {}", user_id);
        Ok(())
    }

    /// Re-wrap the live identity under `pin` and drop it from memory
    ///
    /// The stored slot is overwritten wholesale with the new package.
    pub async fn lock_identity(&mut self, pin: &str) -> AppResult<()> {
        let identity = self.identity.take().ok_or(AppError::IdentityLocked)?;
        let user_id = identity.user_id.clone();
        let stored = StoredIdentity::from_keypair(&user_id, &identity.keypair);
        drop(identity);

        let blob = self.lock_to_blob(stored, pin.to_string()).await?;
        db::save_vault(&self.db, &user_id, &blob).await?;

        tracing::info!("Locked identity for user: {}", user_id);
        Ok(())
    }

    /// Delete the stored vault and message log, and drop the live identity
    pub async fn wipe_identity(&mut self) -> AppResult<()> {
        let session = self.require_auth()?;
        let user_id = session.user_id.clone();

        db::wipe_identity(&self.db, &user_id).await?;
        self.identity = None;

        tracing::info!("Wiped identity for user: {}", user_id);
        Ok(())
    }

    /// Run the PBKDF2 lock off the async runtime
    async fn lock_to_blob(&self, stored: StoredIdentity, pin: String) -> AppResult<String> {
        let vault = self.vault.clone();
        let package = tokio::task::spawn_blocking(move || {
            let mut json = stored.to_json()?;
            let package = vault.lock(&json, &pin);
            json.zeroize();
            package
        })
        .await
        .map_err(|e| AppError::Internal(format!("Lock task failed: {}", e)))??;

        Ok(package.to_json()?)
    }

    // ========================================================================
    // Messaging
    // ========================================================================

    /// Encrypt and send a message to a peer
    ///
    /// The plaintext is logged locally at send time; the sealed envelope
    /// cannot be reopened by its author.
    pub async fn send_message(&self, peer_id: &str, text: &str) -> AppResult<Envelope> {
        let session = self.require_auth()?;
        let identity = self.require_identity()?;

        let entry = self.api.lookup_key(peer_id, &session.token).await?;
        let their_public = public_key_from_base64(&entry.public_key)?;

        let msg = encrypt_message(text, identity.keypair.secret(), &their_public)?;
        let envelope = Envelope::seal(&identity.user_id, peer_id, &msg);
        let envelope = self.api.send_envelope(&envelope, &session.token).await?;

        db::log_message(
            &self.db,
            &MessageRecord {
                id: envelope.id.clone(),
                peer_id: peer_id.to_string(),
                outgoing: true,
                body: text.to_string(),
                created_at: envelope.created_at,
            },
        )
        .await?;

        tracing::info!("Sent message to peer: {}", peer_id);
        Ok(envelope)
    }

    /// Fetch and decrypt envelopes addressed to this session
    ///
    /// Each envelope is decrypted independently; an authentication failure
    /// yields a message with `body: None` instead of aborting the batch.
    /// Envelopes we authored ourselves are skipped (their plaintext already
    /// sits in the local log).
    pub async fn sync_messages(&self) -> AppResult<Vec<InboundMessage>> {
        let session = self.require_auth()?;
        let identity = self.require_identity()?;

        let envelopes = self
            .api
            .fetch_envelopes(&identity.user_id, &session.token)
            .await?;

        let mut sender_keys: HashMap<String, Option<PublicKey>> = HashMap::new();
        let mut inbound = Vec::with_capacity(envelopes.len());

        for envelope in envelopes {
            if envelope.sender_id == identity.user_id {
                continue;
            }

            let sender_key = match sender_keys.get(&envelope.sender_id) {
                Some(cached) => *cached,
                None => {
                    let key = match self.api.lookup_key(&envelope.sender_id, &session.token).await {
                        Ok(entry) => public_key_from_base64(&entry.public_key).ok(),
                        Err(e) => {
                            tracing::warn!(
                                "Directory lookup failed for {}: {}",
                                envelope.sender_id,
                                e
                            );
                            None
                        }
                    };
                    sender_keys.insert(envelope.sender_id.clone(), key);
                    key
                }
            };

            let body = sender_key.and_then(|key| {
                envelope
                    .to_message(key.as_bytes())
                    .and_then(|msg| decrypt_message(&msg, identity.keypair.secret(), &key))
                    .map_err(|e| {
                        tracing::warn!("Failed to decrypt envelope {}: {}", envelope.id, e);
                        e
                    })
                    .ok()
            });

            if let Some(text) = &body {
                db::log_message(
                    &self.db,
                    &MessageRecord {
                        id: envelope.id.clone(),
                        peer_id: envelope.sender_id.clone(),
                        outgoing: false,
                        body: text.clone(),
                        created_at: envelope.created_at,
                    },
                )
                .await?;
            }

            inbound.push(InboundMessage {
                envelope_id: envelope.id,
                sender_id: envelope.sender_id,
                created_at: envelope.created_at,
                body,
            });
        }

        Ok(inbound)
    }

    /// Read the logged conversation with a peer from local storage
    pub async fn message_history(&self, peer_id: &str, limit: i64) -> AppResult<Vec<MessageRecord>> {
        db::get_message_log(&self.db, peer_id, limit, 0).await
    }
}
