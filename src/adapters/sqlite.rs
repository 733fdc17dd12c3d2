use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
};
use std::time::Duration;

use crate::adapters::{KeyModification, StateStore};
use crate::error::LedgerError;

/// SQLite store: current values in `world_state`, every write appended to
/// `key_history`.
///
/// Schema:
/// ```sql
/// CREATE TABLE world_state (
///     key TEXT PRIMARY KEY,
///     value BLOB NOT NULL
/// );
///
/// CREATE TABLE key_history (
///     seq INTEGER PRIMARY KEY AUTOINCREMENT,
///     key TEXT NOT NULL,
///     tx_id TEXT NOT NULL,
///     recorded_at TEXT NOT NULL,
///     is_delete INTEGER NOT NULL,
///     value BLOB
/// );
///
/// CREATE INDEX idx_key_history_key ON key_history(key, seq);
/// ```
pub struct SqliteStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteStore {
    /// Open (and create if missing) a file-backed database
    pub async fn new_file(path: &str) -> Result<Self, LedgerError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(Self { pool })
    }

    /// In-memory database. A single connection, since every sqlite memory
    /// connection is its own database.
    pub async fn new_memory() -> Result<Self, LedgerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<(), LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| LedgerError::Storage(err.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS world_state (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS key_history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL,
                tx_id TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                is_delete INTEGER NOT NULL,
                value BLOB
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_key_history_key ON key_history(key, seq)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(())
    }

    fn map_row_to_modification(row: SqliteRow) -> Result<KeyModification, LedgerError> {
        let tx_id = row
            .try_get::<String, _>("tx_id")
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let timestamp = row
            .try_get::<DateTime<Utc>, _>("recorded_at")
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let is_delete = row
            .try_get::<bool, _>("is_delete")
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        let value = row
            .try_get::<Option<Vec<u8>>, _>("value")
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(KeyModification {
            tx_id,
            timestamp,
            is_delete,
            value,
        })
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        let row = sqlx::query("SELECT value FROM world_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        match row {
            Some(r) => r
                .try_get::<Vec<u8>, _>("value")
                .map(Some)
                .map_err(|e| LedgerError::Storage(e.to_string())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        let modification = KeyModification::write(value);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO world_state (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(modification.value.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO key_history (key, tx_id, recorded_at, is_delete, value)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(key)
        .bind(&modification.tx_id)
        .bind(modification.timestamp)
        .bind(modification.value.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tracing::trace!(key, tx_id = %modification.tx_id, "sqlite put");
        Ok(())
    }

    async fn put_new(&self, key: &str, value: Vec<u8>) -> Result<bool, LedgerError> {
        let modification = KeyModification::write(value);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO world_state (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(modification.value.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?
        .rows_affected();

        if inserted == 0 {
            tx.rollback()
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO key_history (key, tx_id, recorded_at, is_delete, value)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(key)
        .bind(&modification.tx_id)
        .bind(modification.timestamp)
        .bind(modification.value.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tracing::trace!(key, tx_id = %modification.tx_id, "sqlite put_new");
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let removed = sqlx::query("DELETE FROM world_state WHERE key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?
            .rows_affected();

        if removed == 0 {
            tx.rollback()
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?;
            return Ok(false);
        }

        let modification = KeyModification::delete();
        sqlx::query(
            r#"
            INSERT INTO key_history (key, tx_id, recorded_at, is_delete, value)
            VALUES (?, ?, ?, 1, NULL)
            "#,
        )
        .bind(key)
        .bind(&modification.tx_id)
        .bind(modification.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        tracing::trace!(key, tx_id = %modification.tx_id, "sqlite delete");
        Ok(true)
    }

    async fn history_of(&self, key: &str) -> Result<Vec<KeyModification>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT tx_id, recorded_at, is_delete, value
            FROM key_history
            WHERE key = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(key)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        rows.into_iter().map(Self::map_row_to_modification).collect()
    }
}
