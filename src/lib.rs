//! Murmur client core
//!
//! Client-side core of the Murmur secure chat application. All key material
//! handling happens here: the backend only ever stores opaque encrypted
//! blobs and base64 public keys.
//!
//! - [`crypto`]: key pairs, authenticated message encryption, and the
//!   PIN-locked identity vault
//! - [`state`]: the session-scoped identity and the enroll/unlock/send/sync
//!   control flow
//! - [`db`]: local SQLite persistence for the vault blob and message log
//! - [`api`]: HTTP client for the public-key directory and message transport

pub mod api;
pub mod crypto;
pub mod db;
pub mod error;
pub mod models;
pub mod state;

/// Initialize logging for binaries and integration harnesses
///
/// Honors `RUST_LOG`, defaulting to info-level output for this crate.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur_core=info".into()),
        )
        .init();
}
