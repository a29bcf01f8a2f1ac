//! services/medtrack/src/state.rs
//!
//! The application state manager: the single in-memory source of truth for the
//! profile, medication list, onboarding flag, histories and settings.
//!
//! Every mutation writes through to storage first and only updates memory once
//! the write has succeeded. A failed write leaves memory untouched, records a
//! user-visible error and returns the error to the caller.

use crate::history::{ChatHistoryStore, InteractionHistoryStore};
use crate::storage::{JsonStorage, StorageKey};
use medtrack_core::ports::{PortError, PortResult};
use medtrack_core::{
    AppSettings, ChatMessage, ColorScheme, InteractionCheckResult, Medication, MedicationUpdate,
    NewMedication, ProfileUpdate, SettingsUpdate, ThemeMode, UserProfile,
};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

//=========================================================================================
// Snapshot
//=========================================================================================

/// Everything the UI renders from, as one cloneable value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppSnapshot {
    pub profile: UserProfile,
    pub medications: Vec<Medication>,
    pub onboarding_complete: bool,
    pub interaction_history: Vec<InteractionCheckResult>,
    pub chat_history: Vec<ChatMessage>,
    pub settings: AppSettings,
}

impl AppSnapshot {
    pub fn active_medications(&self) -> Vec<Medication> {
        self.medications.iter().filter(|m| m.is_active).cloned().collect()
    }

    pub fn inactive_medications(&self) -> Vec<Medication> {
        self.medications.iter().filter(|m| !m.is_active).cloned().collect()
    }
}

#[derive(Debug, Default)]
struct Inner {
    snapshot: AppSnapshot,
    error: Option<String>,
    loading: bool,
    ready: bool,
}

/// Records `err` as the process-wide error and hands it back.
fn fail(inner: &mut Inner, context: &str, err: PortError) -> PortError {
    error!(error = %err, "{}", context);
    inner.error = Some(format!("{}: {}", context, err));
    err
}

//=========================================================================================
// AppStateManager
//=========================================================================================

pub struct AppStateManager {
    storage: JsonStorage,
    interaction_history: InteractionHistoryStore,
    chat_history: ChatHistoryStore,
    inner: RwLock<Inner>,
}

impl AppStateManager {
    /// Creates an empty, not-yet-initialized manager over `storage`.
    pub fn new(storage: JsonStorage) -> Self {
        Self {
            interaction_history: InteractionHistoryStore::new(storage.clone()),
            chat_history: ChatHistoryStore::new(storage.clone()),
            storage,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn interaction_history_store(&self) -> InteractionHistoryStore {
        self.interaction_history.clone()
    }

    pub fn chat_history_store(&self) -> ChatHistoryStore {
        self.chat_history.clone()
    }

    /// Loads all persisted collections concurrently.
    ///
    /// Each load is isolated: a failing key falls back to its default and is
    /// reported through `error()`, while the others still load.
    pub async fn initialize(&self) {
        self.inner.write().await.loading = true;

        let (profile, medications, onboarding, history, chat, settings) = tokio::join!(
            self.storage.get_or(StorageKey::UserProfile, UserProfile::default()),
            self.storage.get_or(StorageKey::Medications, Vec::<Medication>::new()),
            self.storage.get_or(StorageKey::Onboarding, false),
            self.interaction_history.list(),
            self.chat_history.list(),
            self.storage.get_or(StorageKey::Settings, AppSettings::default()),
        );

        let mut failures = Vec::new();
        let snapshot = AppSnapshot {
            profile: loaded(StorageKey::UserProfile, profile, &mut failures),
            medications: loaded(StorageKey::Medications, medications, &mut failures),
            onboarding_complete: loaded(StorageKey::Onboarding, onboarding, &mut failures),
            interaction_history: loaded(StorageKey::InteractionHistory, history, &mut failures),
            chat_history: loaded(StorageKey::ChatHistory, chat, &mut failures),
            settings: loaded(StorageKey::Settings, settings, &mut failures),
        };

        let mut inner = self.inner.write().await;
        info!(
            medications = snapshot.medications.len(),
            history = snapshot.interaction_history.len(),
            failed_loads = failures.len(),
            "Application state loaded"
        );
        inner.snapshot = snapshot;
        if !failures.is_empty() {
            inner.error = Some(format!("Failed to load: {}", failures.join(", ")));
        }
        inner.loading = false;
        inner.ready = true;
    }

    /// Drops all cached state. The manager must be initialized again before use.
    pub async fn teardown(&self) {
        let mut inner = self.inner.write().await;
        *inner = Inner::default();
    }

    // --- Medications ---

    pub async fn add_medication(&self, input: NewMedication) -> PortResult<Medication> {
        let mut inner = self.inner.write().await;
        if input.name.trim().is_empty() {
            return Err(fail(
                &mut inner,
                "Failed to add medication",
                PortError::Validation("medication name is required".to_string()),
            ));
        }

        let medication = Medication::create(input);
        let mut next = inner.snapshot.medications.clone();
        next.push(medication.clone());
        if let Err(e) = self.storage.set(StorageKey::Medications, &next).await {
            return Err(fail(&mut inner, "Failed to add medication", e));
        }
        inner.snapshot.medications = next;
        info!(id = %medication.id, name = %medication.name, "Medication added");
        Ok(medication)
    }

    /// Applies `update` to the medication with `id`. An unknown id changes nothing.
    pub async fn update_medication(&self, id: &str, update: MedicationUpdate) -> PortResult<Medication> {
        let mut inner = self.inner.write().await;
        let Some(index) = inner.snapshot.medications.iter().position(|m| m.id == id) else {
            warn!(id, "Update requested for unknown medication");
            return Err(PortError::NotFound(format!("Medication {} not found", id)));
        };

        let mut next = inner.snapshot.medications.clone();
        next[index].apply(update);
        let updated = next[index].clone();
        if let Err(e) = self.storage.set(StorageKey::Medications, &next).await {
            return Err(fail(&mut inner, "Failed to update medication", e));
        }
        inner.snapshot.medications = next;
        Ok(updated)
    }

    pub async fn delete_medication(&self, id: &str) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.snapshot.medications.iter().any(|m| m.id == id) {
            warn!(id, "Delete requested for unknown medication");
            return Err(PortError::NotFound(format!("Medication {} not found", id)));
        }

        let next: Vec<Medication> = inner
            .snapshot
            .medications
            .iter()
            .filter(|m| m.id != id)
            .cloned()
            .collect();
        if let Err(e) = self.storage.set(StorageKey::Medications, &next).await {
            return Err(fail(&mut inner, "Failed to delete medication", e));
        }
        inner.snapshot.medications = next;
        info!(id, "Medication deleted");
        Ok(())
    }

    // --- Profile, onboarding and settings ---

    pub async fn update_profile(&self, update: ProfileUpdate) -> PortResult<UserProfile> {
        let mut inner = self.inner.write().await;
        let mut next = inner.snapshot.profile.clone();
        next.merge(update);
        if let Err(e) = self.storage.set(StorageKey::UserProfile, &next).await {
            return Err(fail(&mut inner, "Failed to update profile", e));
        }
        inner.snapshot.profile = next.clone();
        Ok(next)
    }

    pub async fn complete_onboarding(&self) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        if let Err(e) = self.storage.set(StorageKey::Onboarding, &true).await {
            return Err(fail(&mut inner, "Failed to complete onboarding", e));
        }
        inner.snapshot.onboarding_complete = true;
        Ok(())
    }

    pub async fn update_settings(&self, update: SettingsUpdate) -> PortResult<AppSettings> {
        let mut inner = self.inner.write().await;
        self.save_settings(&mut inner, update).await
    }

    async fn save_settings(&self, inner: &mut Inner, update: SettingsUpdate) -> PortResult<AppSettings> {
        let mut next = inner.snapshot.settings.clone();
        next.merge(update);
        if let Err(e) = self.storage.set(StorageKey::Settings, &next).await {
            return Err(fail(inner, "Failed to save settings", e));
        }
        inner.snapshot.settings = next.clone();
        Ok(next)
    }

    pub async fn set_theme_mode(&self, mode: ThemeMode) -> PortResult<AppSettings> {
        self.update_settings(SettingsUpdate {
            theme_mode: Some(mode),
            ..Default::default()
        })
        .await
    }

    /// Flips light and dark relative to what is currently shown.
    pub async fn toggle_theme(&self, system: ColorScheme) -> PortResult<ThemeMode> {
        let mut inner = self.inner.write().await;
        let next = inner.snapshot.settings.theme_mode.toggled(system);
        let update = SettingsUpdate {
            theme_mode: Some(next),
            ..Default::default()
        };
        self.save_settings(&mut inner, update).await?;
        Ok(next)
    }

    pub async fn resolved_theme(&self, system: ColorScheme) -> ColorScheme {
        self.inner.read().await.snapshot.settings.theme_mode.resolve(system)
    }

    // --- Histories ---

    pub async fn refresh_interaction_history(&self) -> PortResult<Vec<InteractionCheckResult>> {
        match self.interaction_history.list().await {
            Ok(entries) => {
                self.inner.write().await.snapshot.interaction_history = entries.clone();
                Ok(entries)
            }
            Err(e) => Err(fail(
                &mut *self.inner.write().await,
                "Failed to load interaction history",
                e,
            )),
        }
    }

    pub async fn refresh_chat_history(&self) -> PortResult<Vec<ChatMessage>> {
        match self.chat_history.list().await {
            Ok(messages) => {
                self.inner.write().await.snapshot.chat_history = messages.clone();
                Ok(messages)
            }
            Err(e) => Err(fail(
                &mut *self.inner.write().await,
                "Failed to load chat history",
                e,
            )),
        }
    }

    /// Removes every persisted key and resets memory to defaults.
    pub async fn clear_all_data(&self) -> PortResult<()> {
        let mut inner = self.inner.write().await;
        let _history = self.interaction_history.lock_writes().await;
        let _chat = self.chat_history.lock_writes().await;
        if let Err(e) = self.storage.clear_all().await {
            return Err(fail(&mut inner, "Failed to clear data", e));
        }
        inner.snapshot = AppSnapshot::default();
        inner.error = None;
        info!("All application data cleared");
        Ok(())
    }

    // --- Accessors ---

    pub async fn snapshot(&self) -> AppSnapshot {
        self.inner.read().await.snapshot.clone()
    }

    pub async fn medications(&self) -> Vec<Medication> {
        self.inner.read().await.snapshot.medications.clone()
    }

    pub async fn active_medications(&self) -> Vec<Medication> {
        self.inner.read().await.snapshot.active_medications()
    }

    pub async fn inactive_medications(&self) -> Vec<Medication> {
        self.inner.read().await.snapshot.inactive_medications()
    }

    pub async fn profile(&self) -> UserProfile {
        self.inner.read().await.snapshot.profile.clone()
    }

    pub async fn settings(&self) -> AppSettings {
        self.inner.read().await.snapshot.settings.clone()
    }

    pub async fn has_completed_onboarding(&self) -> bool {
        self.inner.read().await.snapshot.onboarding_complete
    }

    pub async fn interaction_history(&self) -> Vec<InteractionCheckResult> {
        self.inner.read().await.snapshot.interaction_history.clone()
    }

    pub async fn chat_history(&self) -> Vec<ChatMessage> {
        self.inner.read().await.snapshot.chat_history.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.inner.read().await.error.clone()
    }

    pub async fn clear_error(&self) {
        self.inner.write().await.error = None;
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.read().await.loading
    }

    pub async fn is_ready(&self) -> bool {
        self.inner.read().await.ready
    }
}

fn loaded<T: Default>(key: StorageKey, result: PortResult<T>, failures: &mut Vec<&'static str>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            error!(key = key.as_str(), error = %e, "Failed to load persisted value");
            failures.push(key.as_str());
            T::default()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::MemoryKvAdapter;
    use async_trait::async_trait;
    use medtrack_core::ports::KeyValueStore;
    use medtrack_core::{Frequency, MedicationForm};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// A memory store whose writes (and selected reads) can be made to fail.
    #[derive(Default)]
    pub(crate) struct FlakyStore {
        pub(crate) inner: MemoryKvAdapter,
        pub(crate) fail_writes: AtomicBool,
        pub(crate) broken_key: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> PortResult<Option<String>> {
            let broken = self.broken_key.lock().unwrap().clone();
            if broken.as_deref() == Some(key) {
                return Err(PortError::Storage(format!("cannot read {}", key)));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> PortResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PortError::Storage("disk full".to_string()));
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> PortResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PortError::Storage("disk full".to_string()));
            }
            self.inner.remove(key).await
        }

        async fn multi_remove(&self, keys: &[&str]) -> PortResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(PortError::Storage("disk full".to_string()));
            }
            self.inner.multi_remove(keys).await
        }
    }

    async fn manager() -> (Arc<FlakyStore>, AppStateManager) {
        let store = Arc::new(FlakyStore::default());
        let manager = AppStateManager::new(JsonStorage::new(store.clone()));
        manager.initialize().await;
        (store, manager)
    }

    fn new_med(name: &str) -> NewMedication {
        NewMedication::new(name, "10", "mg", MedicationForm::Tablet, Frequency::OnceDaily)
    }

    #[tokio::test]
    async fn add_assigns_unique_ids_and_defaults() {
        let (_, manager) = manager().await;
        let first = manager.add_medication(new_med("Aspirin")).await.unwrap();
        let second = manager.add_medication(new_med("Aspirin")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert!(first.is_active);
        assert_eq!(manager.medications().await.len(), 2);
    }

    #[tokio::test]
    async fn mutations_persist_across_managers() {
        let (store, manager) = manager().await;
        let med = manager.add_medication(new_med("Metformin")).await.unwrap();
        manager
            .update_profile(ProfileUpdate {
                name: Some("Sam".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        manager.complete_onboarding().await.unwrap();

        let reloaded = AppStateManager::new(JsonStorage::new(store));
        reloaded.initialize().await;
        assert_eq!(reloaded.medications().await, vec![med]);
        assert_eq!(reloaded.profile().await.name.as_deref(), Some("Sam"));
        assert!(reloaded.has_completed_onboarding().await);
        assert!(reloaded.is_ready().await);
        assert!(!reloaded.is_loading().await);
    }

    #[tokio::test]
    async fn update_unknown_id_is_a_no_op() {
        let (store, manager) = manager().await;
        manager.add_medication(new_med("Aspirin")).await.unwrap();
        let before = store.inner.get(StorageKey::Medications.as_str()).await.unwrap();

        let err = manager
            .update_medication("nope", MedicationUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
        let after = store.inner.get(StorageKey::Medications.as_str()).await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn failed_write_leaves_memory_untouched() {
        let (store, manager) = manager().await;
        let med = manager.add_medication(new_med("Aspirin")).await.unwrap();
        store.fail_writes.store(true, Ordering::SeqCst);

        assert!(manager.add_medication(new_med("Ibuprofen")).await.is_err());
        assert!(manager
            .update_medication(
                &med.id,
                MedicationUpdate {
                    is_active: Some(false),
                    ..Default::default()
                }
            )
            .await
            .is_err());
        assert!(manager.delete_medication(&med.id).await.is_err());
        assert!(manager.set_theme_mode(ThemeMode::Dark).await.is_err());

        assert_eq!(manager.medications().await, vec![med]);
        assert_eq!(manager.settings().await.theme_mode, ThemeMode::System);
        assert!(manager.error().await.unwrap().contains("disk full"));
    }

    #[tokio::test]
    async fn active_and_inactive_views_partition_the_list() {
        let (_, manager) = manager().await;
        let a = manager.add_medication(new_med("Aspirin")).await.unwrap();
        let b = manager.add_medication(new_med("Warfarin")).await.unwrap();
        manager
            .update_medication(
                &b.id,
                MedicationUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let active: Vec<String> = manager.active_medications().await.into_iter().map(|m| m.id).collect();
        let inactive: Vec<String> = manager.inactive_medications().await.into_iter().map(|m| m.id).collect();
        assert_eq!(active, vec![a.id]);
        assert_eq!(inactive, vec![b.id]);
    }

    #[tokio::test]
    async fn delete_removes_and_unknown_delete_fails() {
        let (_, manager) = manager().await;
        let med = manager.add_medication(new_med("Aspirin")).await.unwrap();
        manager.delete_medication(&med.id).await.unwrap();
        assert!(manager.medications().await.is_empty());
        assert!(matches!(
            manager.delete_medication(&med.id).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn one_broken_key_does_not_block_the_rest() {
        let store = Arc::new(FlakyStore::default());
        let storage = JsonStorage::new(store.clone());
        storage
            .set(StorageKey::Settings, &AppSettings {
                theme_mode: ThemeMode::Dark,
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .inner
            .set(StorageKey::UserProfile.as_str(), "{{{ garbage")
            .await
            .unwrap();
        *store.broken_key.lock().unwrap() = Some(StorageKey::Medications.as_str().to_string());

        let manager = AppStateManager::new(storage);
        manager.initialize().await;
        assert!(manager.is_ready().await);
        assert_eq!(manager.settings().await.theme_mode, ThemeMode::Dark);
        assert_eq!(manager.profile().await, UserProfile::default());
        assert!(manager.medications().await.is_empty());
        assert!(manager
            .error()
            .await
            .unwrap()
            .contains(StorageKey::Medications.as_str()));
    }

    #[tokio::test]
    async fn toggle_theme_from_system_dark() {
        let (_, manager) = manager().await;
        assert_eq!(manager.resolved_theme(ColorScheme::Dark).await, ColorScheme::Dark);
        assert_eq!(manager.toggle_theme(ColorScheme::Dark).await.unwrap(), ThemeMode::Light);
        assert_eq!(manager.resolved_theme(ColorScheme::Dark).await, ColorScheme::Light);
        assert_eq!(manager.toggle_theme(ColorScheme::Dark).await.unwrap(), ThemeMode::Dark);
    }

    #[tokio::test]
    async fn clear_all_resets_everything() {
        let (store, manager) = manager().await;
        manager.add_medication(new_med("Aspirin")).await.unwrap();
        manager.complete_onboarding().await.unwrap();
        manager.clear_all_data().await.unwrap();
        assert_eq!(manager.snapshot().await, AppSnapshot::default());
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let (_, manager) = manager().await;
        let err = manager.add_medication(new_med("  ")).await.unwrap_err();
        assert!(matches!(err, PortError::Validation(_)));
        assert!(manager.medications().await.is_empty());
    }

    #[tokio::test]
    async fn concurrent_toggles_alternate() {
        let (_, manager) = manager().await;
        let (first, second) = tokio::join!(
            manager.toggle_theme(ColorScheme::Light),
            manager.toggle_theme(ColorScheme::Light)
        );
        let mut modes = vec![first.unwrap(), second.unwrap()];
        modes.sort_by_key(|m| format!("{:?}", m));
        assert_eq!(modes, vec![ThemeMode::Dark, ThemeMode::Light]);
        assert_eq!(manager.resolved_theme(ColorScheme::Light).await, ColorScheme::Light);
    }

    #[tokio::test]
    async fn clear_all_waits_for_pending_history_writes() {
        let (_, manager) = manager().await;
        let manager = Arc::new(manager);
        let history = manager.interaction_history_store();
        let held = history.lock_writes().await;

        let clearing = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.clear_all_data().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!clearing.is_finished());

        drop(held);
        clearing.await.unwrap().unwrap();
        assert!(history.list().await.unwrap().is_empty());
    }
}
