use crate::{StateStore, StoreEntry, StoreError, StoreResult};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// In-memory backend. The default for unit tests and single-process hosting;
/// clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemStateStore {
    entries: Arc<RwLock<HashMap<String, StoreEntry>>>,
}

impl std::fmt::Debug for MemStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStateStore")
            .field("entries", &self.entries.read().unwrap().len())
            .finish()
    }
}

impl MemStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

#[async_trait]
impl StateStore for MemStateStore {
    async fn create(&self, key: &str, entry: StoreEntry) -> StoreResult<()> {
        let mut guard = self.entries.write().unwrap();
        if guard.contains_key(key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        guard.insert(key.to_string(), entry);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoreEntry>> {
        Ok(self.entries.read().unwrap().get(key).cloned())
    }

    async fn update_state(&self, key: &str, state: Vec<u8>) -> StoreResult<()> {
        let mut guard = self.entries.write().unwrap();
        match guard.get_mut(key) {
            Some(entry) => {
                entry.state = state;
                Ok(())
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn complete(&self, key: &str) -> StoreResult<()> {
        let mut guard = self.entries.write().unwrap();
        match guard.get_mut(key) {
            Some(entry) => {
                entry.completed = true;
                Ok(())
            }
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut guard = self.entries.write().unwrap();
        match guard.remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }
}
