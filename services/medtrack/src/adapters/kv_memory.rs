//! services/medtrack/src/adapters/kv_memory.rs
//!
//! An in-process implementation of the `KeyValueStore` port. Nothing survives
//! the process; used for tests and ephemeral sessions.

use async_trait::async_trait;
use medtrack_core::ports::{KeyValueStore, PortResult};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Default)]
pub struct MemoryKvAdapter {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvAdapter {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn multi_remove(&self, keys: &[&str]) -> PortResult<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}
