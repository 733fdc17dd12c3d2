pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::LedgerError;

pub use memory::MemoryStore;

/// One write (or delete) of a key as logged by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyModification {
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    pub is_delete: bool,
    pub value: Option<Vec<u8>>,
}

impl KeyModification {
    pub(crate) fn write(value: Vec<u8>) -> Self {
        Self {
            tx_id: new_tx_id(),
            timestamp: Utc::now(),
            is_delete: false,
            value: Some(value),
        }
    }

    pub(crate) fn delete() -> Self {
        Self {
            tx_id: new_tx_id(),
            timestamp: Utc::now(),
            is_delete: true,
            value: None,
        }
    }
}

/// UUIDv7 strings sort by creation time, which keeps tx ids readable in
/// history listings.
pub(crate) fn new_tx_id() -> String {
    Uuid::now_v7().to_string()
}

/// -----------------------------
/// State store contract
/// -----------------------------
///
/// World state plus an append-only per-key modification log.
///
/// Implementors MUST:
/// 1. Apply `put`/`put_new`/`delete` and append its history row atomically
/// 2. Return `history_of` oldest-to-newest, in the order writes were applied
/// 3. Report I/O failures as `LedgerError::Storage`
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError>;

    /// Writes `value` only if `key` is absent, as one atomic step with its
    /// history row. Returns `false` and logs nothing when the key exists.
    async fn put_new(&self, key: &str, value: Vec<u8>) -> Result<bool, LedgerError>;

    /// Removes `key` from the world state and logs a delete marker.
    /// Returns `false` without logging anything if the key was absent.
    async fn delete(&self, key: &str) -> Result<bool, LedgerError>;

    async fn history_of(&self, key: &str) -> Result<Vec<KeyModification>, LedgerError>;
}

#[async_trait]
impl<S: StateStore + ?Sized> StateStore for Box<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        (**self).put(key, value).await
    }

    async fn put_new(&self, key: &str, value: Vec<u8>) -> Result<bool, LedgerError> {
        (**self).put_new(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<bool, LedgerError> {
        (**self).delete(key).await
    }

    async fn history_of(&self, key: &str) -> Result<Vec<KeyModification>, LedgerError> {
        (**self).history_of(key).await
    }
}
