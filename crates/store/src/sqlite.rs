use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;

use crate::{StateScope, StateStore, StoreError};

pub type DbPool = sqlx::SqlitePool;

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

/// Durable backend. One row per (channel, conversation, user, slot); the
/// upsert makes the end-of-turn flush atomic per slot, so a crash before
/// flush leaves the previously committed row intact.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: DbPool,
}

impl SqliteStateStore {
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        timeout_secs: u64,
    ) -> Result<Self, sqlx::Error> {
        let pool = connect_with_settings(database_url, max_connections, timeout_secs).await?;
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

async fn ensure_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS conversation_state (
            channel_id      TEXT NOT NULL,
            conversation_id TEXT NOT NULL,
            user_id         TEXT NOT NULL,
            slot            TEXT NOT NULL,
            value           TEXT NOT NULL,
            updated_at      TEXT NOT NULL,
            PRIMARY KEY (channel_id, conversation_id, user_id, slot)
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, scope: &StateScope, slot: &str) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar::<_, String>(
            "SELECT value FROM conversation_state
             WHERE channel_id = ?1 AND conversation_id = ?2 AND user_id = ?3 AND slot = ?4",
        )
        .bind(&scope.channel_id)
        .bind(&scope.conversation_id)
        .bind(&scope.user_id)
        .bind(slot)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| StoreError::Backend(error.to_string()))
    }

    async fn set(&self, scope: &StateScope, slot: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO conversation_state
                 (channel_id, conversation_id, user_id, slot, value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (channel_id, conversation_id, user_id, slot)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(&scope.channel_id)
        .bind(&scope.conversation_id)
        .bind(&scope.user_id)
        .bind(slot)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|error| StoreError::Backend(error.to_string()))
    }

    async fn delete(&self, scope: &StateScope, slot: &str) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM conversation_state
             WHERE channel_id = ?1 AND conversation_id = ?2 AND user_id = ?3 AND slot = ?4",
        )
        .bind(&scope.channel_id)
        .bind(&scope.conversation_id)
        .bind(&scope.user_id)
        .bind(slot)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|error| StoreError::Backend(error.to_string()))
    }
}
