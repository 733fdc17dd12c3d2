use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};

use crate::adapters::{KeyModification, StateStore};
use crate::error::LedgerError;

/// PostgreSQL store
///
/// Schema:
/// ```sql
/// CREATE TABLE public.world_state (
///     key TEXT PRIMARY KEY,
///     value BYTEA NOT NULL
/// );
///
/// CREATE TABLE public.key_history (
///     seq BIGSERIAL PRIMARY KEY,
///     key TEXT NOT NULL,
///     tx_id TEXT NOT NULL,
///     recorded_at TIMESTAMPTZ NOT NULL,
///     is_delete BOOLEAN NOT NULL,
///     value BYTEA
/// );
///
/// -- history is always read per key in seq order
/// CREATE INDEX idx_key_history_key ON key_history(key, seq);
/// ```
pub struct PostgresStore {
    pub(crate) pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
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
            CREATE TABLE IF NOT EXISTS public.world_state (
                key TEXT PRIMARY KEY,
                value BYTEA NOT NULL
            );
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS public.key_history (
                seq BIGSERIAL PRIMARY KEY,
                key TEXT NOT NULL,
                tx_id TEXT NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL,
                is_delete BOOLEAN NOT NULL,
                value BYTEA
            );
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_key_history_key
                ON public.key_history(key, seq);
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

    fn map_row_to_modification(row: PgRow) -> Result<KeyModification, LedgerError> {
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
impl StateStore for PostgresStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        let row = sqlx::query("SELECT value FROM public.world_state WHERE key = $1")
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
            INSERT INTO public.world_state (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(modification.value.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO public.key_history (key, tx_id, recorded_at, is_delete, value)
            VALUES ($1, $2, $3, FALSE, $4)
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

        tracing::trace!(key, tx_id = %modification.tx_id, "postgres put");
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
            INSERT INTO public.world_state (key, value) VALUES ($1, $2)
            ON CONFLICT (key) DO NOTHING
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
            INSERT INTO public.key_history (key, tx_id, recorded_at, is_delete, value)
            VALUES ($1, $2, $3, FALSE, $4)
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

        tracing::trace!(key, tx_id = %modification.tx_id, "postgres put_new");
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, LedgerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        let removed = sqlx::query("DELETE FROM public.world_state WHERE key = $1")
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
            INSERT INTO public.key_history (key, tx_id, recorded_at, is_delete, value)
            VALUES ($1, $2, $3, TRUE, NULL)
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

        tracing::trace!(key, tx_id = %modification.tx_id, "postgres delete");
        Ok(true)
    }

    async fn history_of(&self, key: &str) -> Result<Vec<KeyModification>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT tx_id, recorded_at, is_delete, value
            FROM public.key_history
            WHERE key = $1
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
