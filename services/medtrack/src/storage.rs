//! services/medtrack/src/storage.rs
//!
//! Typed JSON access on top of a raw `KeyValueStore`. Values are serialized on
//! write and parsed on read; a stored blob that no longer parses is treated as
//! missing so one corrupt key never takes the rest of the application down.

use medtrack_core::ports::{KeyValueStore, PortError, PortResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// The fixed set of keys the application persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKey {
    UserProfile,
    Medications,
    InteractionHistory,
    ChatHistory,
    Onboarding,
    Settings,
}

impl StorageKey {
    pub const ALL: [StorageKey; 6] = [
        StorageKey::UserProfile,
        StorageKey::Medications,
        StorageKey::InteractionHistory,
        StorageKey::ChatHistory,
        StorageKey::Onboarding,
        StorageKey::Settings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::UserProfile => "@medtrack/user_profile",
            StorageKey::Medications => "@medtrack/medications",
            StorageKey::InteractionHistory => "@medtrack/interaction_history",
            StorageKey::ChatHistory => "@medtrack/chat_history",
            StorageKey::Onboarding => "@medtrack/onboarding_complete",
            StorageKey::Settings => "@medtrack/app_settings",
        }
    }
}

/// A cloneable handle to the key-value store with JSON (de)serialization.
#[derive(Clone)]
pub struct JsonStorage {
    store: Arc<dyn KeyValueStore>,
}

impl JsonStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Reads `key`, returning `default` when the key is absent or its JSON is malformed.
    ///
    /// Only a failure of the underlying store is reported as an error.
    pub async fn get_or<T: DeserializeOwned>(&self, key: StorageKey, default: T) -> PortResult<T> {
        let Some(raw) = self.store.get(key.as_str()).await? else {
            return Ok(default);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "Stored value is malformed; using default");
                Ok(default)
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: StorageKey, value: &T) -> PortResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| {
            PortError::Storage(format!("Failed to serialize '{}': {}", key.as_str(), e))
        })?;
        self.store.set(key.as_str(), &raw).await
    }

    pub async fn remove(&self, key: StorageKey) -> PortResult<()> {
        self.store.remove(key.as_str()).await
    }

    /// Removes every application key in one call.
    pub async fn clear_all(&self) -> PortResult<()> {
        let keys: Vec<&str> = StorageKey::ALL.iter().map(|key| key.as_str()).collect();
        self.store.multi_remove(&keys).await
    }
}
