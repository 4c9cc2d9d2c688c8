//! String-keyed document storage.
//!
//! The quote store only needs `get` / `set` / `remove` on whole JSON documents,
//! so the durable backend is a single key/value table in SQLite. The session
//! scope (last viewed quote) lives in memory for the lifetime of the process.

use std::{collections::HashMap, str::FromStr};

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use tokio::sync::Mutex;

use crate::error::StorageError;

#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// SQLite primary result codes for a database that refuses writes.
const SQLITE_READONLY: i32 = 8;
const SQLITE_FULL: i32 = 13;

/// Separates "the backend won't take this write" from other database errors.
fn write_error(e: sqlx::Error) -> StorageError {
    let refused = e
        .as_database_error()
        .and_then(|db| db.code())
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, SQLITE_READONLY | SQLITE_FULL));

    if refused {
        StorageError::Rejected(e.to_string())
    } else {
        StorageError::Database(e)
    }
}

#[derive(Clone, Debug)]
pub struct SqliteStorage {
    db: Pool<Sqlite>,
}

impl SqliteStorage {
    /// Opens (creating if missing) the database at `url` and runs migrations.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        tracing::info!("initializing database connection...");
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        Self::from_pool(db).await
    }

    pub async fn from_pool(db: Pool<Sqlite>) -> Result<Self, StorageError> {
        tracing::info!("running migrations...");
        sqlx::migrate!("./migrations").run(&db).await?;
        tracing::info!("finished running migrations!");

        Ok(SqliteStorage { db })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    #[tracing::instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = sqlx::query_scalar::<_, String>(
            r#"
                SELECT
                    value
                FROM kv_store
                WHERE key = $1;
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, key = %key, "an error occurred when reading key"))?;

        Ok(value)
    }

    #[tracing::instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
                INSERT INTO
                    kv_store (key, value, updated_at)
                VALUES
                    ($1, $2, strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                ON CONFLICT (key)
                DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at;
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, key = %key, "an error occurred when writing key"))
        .map_err(write_error)?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
                DELETE FROM kv_store
                WHERE key = $1;
            "#,
        )
        .bind(key)
        .execute(&self.db)
        .await
        .inspect_err(|e| tracing::error!(err = ?e, key = %key, "an error occurred when removing key"))
        .map_err(write_error)?;

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().await.remove(key);

        Ok(())
    }
}
