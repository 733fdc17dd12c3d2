use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::adapters::{KeyModification, StateStore};
use crate::error::LedgerError;

#[derive(Default)]
struct MemoryState {
    world: HashMap<String, Vec<u8>>,
    history: HashMap<String, Vec<KeyModification>>,
}

/// In-process store. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, LedgerError> {
        self.inner
            .lock()
            .map_err(|_| LedgerError::Storage("memory store lock poisoned".to_string()))
    }

    /// Number of keys currently in the world state.
    pub fn len(&self) -> Result<usize, LedgerError> {
        Ok(self.lock()?.world.len())
    }

    pub fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        let state = self.lock()?;
        Ok(state.world.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        let modification = KeyModification::write(value.clone());
        tracing::trace!(key, tx_id = %modification.tx_id, "memory put");

        state.world.insert(key.to_string(), value);
        state
            .history
            .entry(key.to_string())
            .or_default()
            .push(modification);
        Ok(())
    }

    async fn put_new(&self, key: &str, value: Vec<u8>) -> Result<bool, LedgerError> {
        let mut state = self.lock()?;
        if state.world.contains_key(key) {
            return Ok(false);
        }

        let modification = KeyModification::write(value.clone());
        tracing::trace!(key, tx_id = %modification.tx_id, "memory put_new");

        state.world.insert(key.to_string(), value);
        state
            .history
            .entry(key.to_string())
            .or_default()
            .push(modification);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool, LedgerError> {
        let mut state = self.lock()?;
        if state.world.remove(key).is_none() {
            return Ok(false);
        }

        let modification = KeyModification::delete();
        tracing::trace!(key, tx_id = %modification.tx_id, "memory delete");
        state
            .history
            .entry(key.to_string())
            .or_default()
            .push(modification);
        Ok(true)
    }

    async fn history_of(&self, key: &str) -> Result<Vec<KeyModification>, LedgerError> {
        let state = self.lock()?;
        Ok(state.history.get(key).cloned().unwrap_or_default())
    }
}
