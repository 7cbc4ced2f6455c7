//! Database pool and query utilities
//!
//! Local persistence for exactly two things: the encrypted identity vault
//! (one opaque blob per identity, overwritten wholesale on every lock) and
//! the plaintext message log that lets the author of a one-way box read
//! their own sent messages back.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::MessageRecord;

/// Connect to the local SQLite database and run migrations
pub async fn init_db(db_path: &str) -> AppResult<SqlitePool> {
    let db_url = format!("sqlite:{}?mode=rwc", db_path);
    let pool = SqlitePool::connect(&db_url).await?;

    // WAL mode for concurrent access
    sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;
    sqlx::query("PRAGMA synchronous=NORMAL;").execute(&pool).await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database initialized with WAL mode at: {}", db_path);
    Ok(pool)
}

/// In-memory database for tests
///
/// Pinned to a single connection: each new `:memory:` connection would be a
/// fresh empty database.
#[cfg(test)]
pub async fn init_test_db() -> AppResult<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

// ============================================================================
// Vault Queries
// ============================================================================

/// Save the locked vault blob for an identity
///
/// The slot is overwritten wholesale; there is no partial update path.
pub async fn save_vault(pool: &SqlitePool, identity_id: &str, blob: &str) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO identity_vault (id, package, updated_at)
        VALUES ($1, $2, datetime('now'))
        ON CONFLICT(id) DO UPDATE SET
            package = excluded.package,
            updated_at = datetime('now')
        "#,
    )
    .bind(identity_id)
    .bind(blob)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the locked vault blob for an identity
pub async fn load_vault(pool: &SqlitePool, identity_id: &str) -> AppResult<Option<String>> {
    let result: Option<(String,)> =
        sqlx::query_as(r#"SELECT package FROM identity_vault WHERE id = $1"#)
            .bind(identity_id)
            .fetch_optional(pool)
            .await?;

    Ok(result.map(|(package,)| package))
}

/// Delete the vault blob and the message log for an identity
pub async fn wipe_identity(pool: &SqlitePool, identity_id: &str) -> AppResult<()> {
    sqlx::query(r#"DELETE FROM identity_vault WHERE id = $1"#)
        .bind(identity_id)
        .execute(pool)
        .await?;

    sqlx::query(r#"DELETE FROM message_log"#).execute(pool).await?;

    Ok(())
}

// ============================================================================
// Message Log Queries
// ============================================================================

/// Append a plaintext message to the local log
pub async fn log_message(pool: &SqlitePool, record: &MessageRecord) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO message_log (id, peer_id, outgoing, body, created_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&record.id)
    .bind(&record.peer_id)
    .bind(record.outgoing)
    .bind(&record.body)
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the logged conversation with a peer, oldest first
pub async fn get_message_log(
    pool: &SqlitePool,
    peer_id: &str,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<MessageRecord>> {
    let rows = sqlx::query_as::<_, (String, String, bool, String, String)>(
        r#"
        SELECT id, peer_id, outgoing, body, created_at
        FROM message_log
        WHERE peer_id = $1
        ORDER BY created_at ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(peer_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let records = rows
        .into_iter()
        .map(|(id, peer_id, outgoing, body, created_at)| MessageRecord {
            id,
            peer_id,
            outgoing,
            body,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_vault_slot_roundtrip() {
        let pool = init_test_db().await.unwrap();

        assert!(load_vault(&pool, "user-1").await.unwrap().is_none());

        save_vault(&pool, "user-1", "{\"version\":1}").await.unwrap();
        assert_eq!(
            load_vault(&pool, "user-1").await.unwrap().as_deref(),
            Some("{\"version\":1}")
        );
    }

    #[tokio::test]
    async fn test_vault_slot_is_overwritten() {
        let pool = init_test_db().await.unwrap();

        save_vault(&pool, "user-1", "old").await.unwrap();
        save_vault(&pool, "user-1", "new").await.unwrap();

        assert_eq!(load_vault(&pool, "user-1").await.unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_wipe_identity() {
        let pool = init_test_db().await.unwrap();

        save_vault(&pool, "user-1", "blob").await.unwrap();
        let record = MessageRecord {
            id: "m1".to_string(),
            peer_id: "peer".to_string(),
            outgoing: true,
            body: "hello".to_string(),
            created_at: Utc::now(),
        };
        log_message(&pool, &record).await.unwrap();

        wipe_identity(&pool, "user-1").await.unwrap();

        assert!(load_vault(&pool, "user-1").await.unwrap().is_none());
        assert!(get_message_log(&pool, "peer", 50, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_message_log_order_and_filter() {
        let pool = init_test_db().await.unwrap();

        for (id, peer, body, ts) in [
            ("m1", "bob", "first", "2026-01-01T10:00:00Z"),
            ("m2", "bob", "second", "2026-01-01T11:00:00Z"),
            ("m3", "carol", "other", "2026-01-01T10:30:00Z"),
        ] {
            let record = MessageRecord {
                id: id.to_string(),
                peer_id: peer.to_string(),
                outgoing: false,
                body: body.to_string(),
                created_at: DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc),
            };
            log_message(&pool, &record).await.unwrap();
        }

        let log = get_message_log(&pool, "bob", 50, 0).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].body, "first");
        assert_eq!(log[1].body, "second");
    }
}
