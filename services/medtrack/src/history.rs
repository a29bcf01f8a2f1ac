//! services/medtrack/src/history.rs
//!
//! Bounded, persisted histories: interaction-check results (newest first) and
//! chat messages (oldest first). Entries are never edited; the only removal is
//! eviction on overflow or a bulk clear.

use crate::storage::{JsonStorage, StorageKey};
use chrono::Utc;
use medtrack_core::domain::generate_id;
use medtrack_core::ports::PortResult;
use medtrack_core::{ChatMessage, InteractionCheckResult};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

pub const INTERACTION_HISTORY_LIMIT: usize = 50;
pub const CHAT_HISTORY_LIMIT: usize = 100;

//=========================================================================================
// Interaction History
//=========================================================================================

#[derive(Clone)]
pub struct InteractionHistoryStore {
    storage: JsonStorage,
    // Serializes read-modify-write cycles issued through this handle.
    write_lock: Arc<Mutex<()>>,
}

impl InteractionHistoryStore {
    pub fn new(storage: JsonStorage) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Stores `result` under a fresh id and timestamp as the newest entry.
    pub async fn record(&self, mut result: InteractionCheckResult) -> PortResult<InteractionCheckResult> {
        let _guard = self.write_lock.lock().await;

        result.id = generate_id();
        result.checked_at = Utc::now();

        let mut entries = self.list().await?;
        entries.insert(0, result.clone());
        entries.truncate(INTERACTION_HISTORY_LIMIT);
        self.storage.set(StorageKey::InteractionHistory, &entries).await?;

        debug!(id = %result.id, total = entries.len(), "Recorded interaction check");
        Ok(result)
    }

    /// Every stored result, newest first.
    pub async fn list(&self) -> PortResult<Vec<InteractionCheckResult>> {
        self.storage
            .get_or(StorageKey::InteractionHistory, Vec::new())
            .await
    }

    pub async fn clear(&self) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(StorageKey::InteractionHistory).await
    }

    /// Blocks `record` and `clear` for as long as the guard is held.
    pub(crate) async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}

//=========================================================================================
// Chat History
//=========================================================================================

#[derive(Clone)]
pub struct ChatHistoryStore {
    storage: JsonStorage,
    write_lock: Arc<Mutex<()>>,
}

impl ChatHistoryStore {
    pub fn new(storage: JsonStorage) -> Self {
        Self {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Appends `message`, evicting the oldest entries beyond the limit.
    pub async fn append(&self, message: ChatMessage) -> PortResult<ChatMessage> {
        let _guard = self.write_lock.lock().await;

        let mut messages = self.list().await?;
        messages.push(message.clone());
        if messages.len() > CHAT_HISTORY_LIMIT {
            let overflow = messages.len() - CHAT_HISTORY_LIMIT;
            messages.drain(..overflow);
        }
        self.storage.set(StorageKey::ChatHistory, &messages).await?;
        Ok(message)
    }

    /// Every stored message, oldest first.
    pub async fn list(&self) -> PortResult<Vec<ChatMessage>> {
        self.storage.get_or(StorageKey::ChatHistory, Vec::new()).await
    }

    pub async fn clear(&self) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(StorageKey::ChatHistory).await
    }

    pub(crate) async fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryKvAdapter;
    use medtrack_core::{ChatRole, InteractionAnalysis};

    fn storage() -> JsonStorage {
        JsonStorage::new(Arc::new(MemoryKvAdapter::new()))
    }

    fn result(summary: &str) -> InteractionCheckResult {
        InteractionCheckResult::stamp(
            InteractionAnalysis::from_raw_text(summary),
            vec!["A".into(), "B".into()],
        )
    }

    #[tokio::test]
    async fn record_assigns_a_fresh_id() {
        let history = InteractionHistoryStore::new(storage());
        let original = result("first");
        let stored = history.record(original.clone()).await.unwrap();
        assert_ne!(stored.id, original.id);
        assert!(stored.checked_at >= original.checked_at);
        assert_eq!(history.list().await.unwrap(), vec![stored]);
    }

    #[tokio::test]
    async fn keeps_the_fifty_most_recent_newest_first() {
        let history = InteractionHistoryStore::new(storage());
        for i in 0..51 {
            history.record(result(&format!("check {}", i))).await.unwrap();
        }
        let entries = history.list().await.unwrap();
        assert_eq!(entries.len(), 50);
        assert_eq!(entries[0].summary, "check 50");
        assert_eq!(entries[49].summary, "check 1");
        assert!(entries.iter().all(|e| e.summary != "check 0"));
    }

    #[tokio::test]
    async fn empty_store_lists_nothing_and_clear_empties() {
        let history = InteractionHistoryStore::new(storage());
        assert!(history.list().await.unwrap().is_empty());
        history.record(result("x")).await.unwrap();
        history.clear().await.unwrap();
        assert!(history.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_history_evicts_oldest_past_one_hundred() {
        let chat = ChatHistoryStore::new(storage());
        for i in 0..105 {
            chat.append(ChatMessage::new(ChatRole::User, format!("m{}", i)))
                .await
                .unwrap();
        }
        let messages = chat.list().await.unwrap();
        assert_eq!(messages.len(), 100);
        assert_eq!(messages[0].content, "m5");
        assert_eq!(messages[99].content, "m104");
    }

    #[tokio::test]
    async fn chat_clear_empties_and_appends_start_over() {
        let chat = ChatHistoryStore::new(storage());
        chat.append(ChatMessage::new(ChatRole::User, "first")).await.unwrap();
        chat.clear().await.unwrap();
        assert!(chat.list().await.unwrap().is_empty());

        chat.append(ChatMessage::new(ChatRole::User, "again")).await.unwrap();
        let messages = chat.list().await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "again");
    }
}
