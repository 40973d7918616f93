//! In-memory completion store.
//!
//! Same contract as the durable store, held in process memory behind a
//! read/write lock. Used as a test double and for throwaway runs.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use super::CompletionStore;
use crate::error::{Error, Result};
use crate::model::TaskId;

#[derive(Debug, Default)]
pub struct MemoryStore {
    completed: RwLock<Vec<TaskId>>,
    add_calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with already-completed ids.
    pub fn with_completed(ids: impl IntoIterator<Item = TaskId>) -> Self {
        let store = Self::new();
        if let Ok(mut completed) = store.completed.write() {
            for id in ids {
                if !completed.contains(&id) {
                    completed.push(id);
                }
            }
        }
        store
    }

    /// How many times `add` was called, including no-op repeats.
    pub fn add_calls(&self) -> u64 {
        self.add_calls.load(Ordering::SeqCst)
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::StoreUnavailable("memory store lock poisoned".to_string())
}

#[async_trait]
impl CompletionStore for MemoryStore {
    async fn exists(&self, id: TaskId) -> Result<bool> {
        Ok(self.completed.read().map_err(poisoned)?.contains(&id))
    }

    async fn add(&self, id: TaskId) -> Result<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        let mut completed = self.completed.write().map_err(poisoned)?;
        if !completed.contains(&id) {
            completed.push(id);
        }
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<TaskId>> {
        Ok(self.completed.read().map_err(poisoned)?.clone())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.completed.read().map_err(poisoned)?.len() as u64)
    }

    async fn clear(&self) -> Result<()> {
        self.completed.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_is_idempotent_but_counted() {
        let store = MemoryStore::new();
        store.add(TaskId(7)).await.unwrap();
        store.add(TaskId(7)).await.unwrap();
        assert_eq!(store.entries().await.unwrap(), vec![TaskId(7)]);
        assert_eq!(store.add_calls(), 2);
    }

    #[tokio::test]
    async fn seeded_ids_exist() {
        let store = MemoryStore::with_completed([TaskId(1), TaskId(2)]);
        assert!(store.exists(TaskId(1)).await.unwrap());
        assert!(!store.exists(TaskId(3)).await.unwrap());
        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
