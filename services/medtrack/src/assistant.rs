//! services/medtrack/src/assistant.rs
//!
//! The AI orchestration layer. Each operation builds a prompt, sends it to the
//! configured `ResponseGenerator`, normalizes the reply and, where relevant,
//! writes it to history and refreshes the application state. Loading and error
//! status is tracked here for the UI; generation failures are never retried.

use crate::history::{ChatHistoryStore, InteractionHistoryStore};
use crate::state::AppStateManager;
use medtrack_core::normalize::{
    insufficient_medications, normalize_answer, normalize_info, normalize_interactions,
    normalize_suggestions,
};
use medtrack_core::ports::{PortError, PortResult, ResponseGenerator};
use medtrack_core::prompts;
use medtrack_core::{
    ChatMessage, ChatRole, InteractionCheckResult, Medication, MedicationInfo,
    MedicationSuggestions,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const CHAT_ERROR_REPLY: &str =
    "Sorry, I couldn't answer that right now. Please check your connection and try again.";

/// The most recent failure, tagged with the operation that produced it.
#[derive(Debug, Clone)]
struct StatusError {
    context: &'static str,
    message: String,
}

/// Counts one request as in flight until dropped, including when the caller
/// abandons the future.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MedicationAssistant {
    generator: Arc<dyn ResponseGenerator>,
    state: Arc<AppStateManager>,
    interaction_history: InteractionHistoryStore,
    chat_history: ChatHistoryStore,
    in_flight: AtomicUsize,
    error: RwLock<Option<StatusError>>,
    /// Token shared by every request started since the last `cancel_pending`.
    cancel: Mutex<CancellationToken>,
}

impl MedicationAssistant {
    pub fn new(generator: Arc<dyn ResponseGenerator>, state: Arc<AppStateManager>) -> Self {
        Self {
            interaction_history: state.interaction_history_store(),
            chat_history: state.chat_history_store(),
            generator,
            state,
            in_flight: AtomicUsize::new(0),
            error: RwLock::new(None),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// The last failure still waiting to be acknowledged with `clear_error`.
    pub async fn last_error(&self) -> Option<String> {
        self.error.read().await.as_ref().map(|e| e.message.clone())
    }

    pub async fn clear_error(&self) {
        *self.error.write().await = None;
    }

    /// Aborts every in-flight request; they resolve with `PortError::Cancelled`.
    pub async fn cancel_pending(&self) {
        let mut token = self.cancel.lock().await;
        token.cancel();
        *token = CancellationToken::new();
        info!("Pending generation requests cancelled");
    }

    async fn set_error(&self, context: &'static str, message: String) {
        *self.error.write().await = Some(StatusError { context, message });
    }

    /// A success only clears an error left by the same kind of operation.
    async fn resolve_error(&self, context: &'static str) {
        let mut error = self.error.write().await;
        if error.as_ref().is_some_and(|e| e.context == context) {
            *error = None;
        }
    }

    /// Sends one prompt, tracking loading and error status around the call.
    async fn generate(&self, context: &'static str, prompt: String) -> PortResult<String> {
        let token = self.cancel.lock().await.clone();
        let _in_flight = InFlight::enter(&self.in_flight);

        let started = Instant::now();
        let outcome = tokio::select! {
            _ = token.cancelled() => Err(PortError::Cancelled),
            result = self.generator.generate(&prompt) => result,
        };

        match &outcome {
            Ok(text) => {
                info!(
                    generator = self.generator.name(),
                    elapsed = ?started.elapsed(),
                    response_len = text.len(),
                    "{} finished",
                    context
                );
                self.resolve_error(context).await;
            }
            Err(PortError::Cancelled) => info!("{} cancelled", context),
            Err(e) => {
                warn!(generator = self.generator.name(), error = %e, "{} failed", context);
                self.set_error(context, format!("{} failed: {}", context, e))
                    .await;
            }
        }
        outcome
    }

    // --- Interaction checks ---

    /// Checks `medications` for interactions and records the result in history.
    ///
    /// Fewer than two medications short-circuit without contacting the generator.
    pub async fn check_interactions(&self, medications: &[Medication]) -> PortResult<InteractionCheckResult> {
        let names: Vec<String> = medications.iter().map(|m| m.name.clone()).collect();
        if medications.len() < 2 {
            return Ok(InteractionCheckResult::stamp(insufficient_medications(), names));
        }

        let prompt = prompts::interaction_check_prompt(medications);
        let raw = self.generate("Interaction check", prompt).await?;
        let result = InteractionCheckResult::stamp(normalize_interactions(&raw), names);

        match self.interaction_history.record(result.clone()).await {
            Ok(stored) => {
                if let Err(e) = self.state.refresh_interaction_history().await {
                    warn!(error = %e, "Could not refresh interaction history");
                }
                Ok(stored)
            }
            Err(e) => {
                warn!(error = %e, "Interaction check succeeded but could not be saved");
                self.set_error("Save interaction check", format!("Could not save interaction check: {}", e))
                    .await;
                Ok(result)
            }
        }
    }

    /// Checks the user's currently active medications.
    pub async fn check_active_interactions(&self) -> PortResult<InteractionCheckResult> {
        let active = self.state.active_medications().await;
        self.check_interactions(&active).await
    }

    // --- Lookups ---

    pub async fn medication_info(&self, medication: &Medication) -> PortResult<MedicationInfo> {
        let raw = self
            .generate("Medication info", prompts::medication_info_prompt(medication))
            .await?;
        Ok(normalize_info(&raw))
    }

    pub async fn suggestions(&self, medication: &Medication) -> PortResult<MedicationSuggestions> {
        let raw = self
            .generate("Suggestions", prompts::suggestions_prompt(medication))
            .await?;
        Ok(normalize_suggestions(&raw))
    }

    // --- Chat ---

    /// Answers a free-text question with the user's active medications as context.
    ///
    /// Both the question and the reply (or an error message) are appended to chat history.
    pub async fn ask_question(&self, question: &str) -> PortResult<ChatMessage> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PortError::Validation("question is empty".to_string()));
        }

        let names: Vec<String> = self
            .state
            .active_medications()
            .await
            .into_iter()
            .map(|m| m.name)
            .collect();

        self.append_chat(ChatMessage::new(ChatRole::User, question)).await;
        let outcome = self
            .generate("Question", prompts::question_prompt(question, &names))
            .await;

        let reply = match outcome {
            Ok(raw) => Ok(ChatMessage::new(ChatRole::Assistant, normalize_answer(&raw))),
            Err(PortError::Cancelled) => Err(PortError::Cancelled),
            Err(e) => {
                self.append_chat(ChatMessage::new(ChatRole::Error, CHAT_ERROR_REPLY))
                    .await;
                Err(e)
            }
        };
        if let Ok(message) = &reply {
            self.append_chat(message.clone()).await;
        }

        if let Err(e) = self.state.refresh_chat_history().await {
            warn!(error = %e, "Could not refresh chat history");
        }
        reply
    }

    async fn append_chat(&self, message: ChatMessage) {
        if let Err(e) = self.chat_history.append(message).await {
            warn!(error = %e, "Could not save chat message");
            self.set_error("Save chat message", format!("Could not save chat message: {}", e))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryKvAdapter, MockGeneratorAdapter};
    use crate::storage::JsonStorage;
    use async_trait::async_trait;
    use medtrack_core::normalize::NOT_ENOUGH_MEDICATIONS_SUMMARY;
    use medtrack_core::{Frequency, MedicationForm, NewMedication, Severity};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    struct CountingGenerator {
        calls: AtomicUsize,
        reply: PortResult<String>,
    }

    #[async_trait]
    impl ResponseGenerator for CountingGenerator {
        async fn generate(&self, _prompt: &str) -> PortResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    struct StalledGenerator;

    #[async_trait]
    impl ResponseGenerator for StalledGenerator {
        async fn generate(&self, _prompt: &str) -> PortResult<String> {
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    async fn setup(generator: Arc<dyn ResponseGenerator>) -> (Arc<AppStateManager>, MedicationAssistant) {
        let state = Arc::new(AppStateManager::new(JsonStorage::new(Arc::new(
            MemoryKvAdapter::new(),
        ))));
        state.initialize().await;
        let assistant = MedicationAssistant::new(generator, state.clone());
        (state, assistant)
    }

    async fn add(state: &AppStateManager, name: &str) -> Medication {
        state
            .add_medication(NewMedication::new(
                name,
                "100",
                "mg",
                MedicationForm::Tablet,
                Frequency::OnceDaily,
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fewer_than_two_medications_never_calls_the_generator() {
        let generator = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
            reply: Ok("{}".into()),
        });
        let (state, assistant) = setup(generator.clone()).await;

        let none = assistant.check_interactions(&[]).await.unwrap();
        let one = add(&state, "Aspirin").await;
        let single = assistant.check_interactions(&[one]).await.unwrap();

        for result in [none, single] {
            assert!(!result.has_interactions);
            assert!(result.interactions.is_empty());
            assert_eq!(result.summary, NOT_ENOUGH_MEDICATIONS_SUMMARY);
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert!(state.interaction_history().await.is_empty());
    }

    #[tokio::test]
    async fn mock_check_is_recorded_and_reflected_in_state() {
        let (state, assistant) = setup(Arc::new(MockGeneratorAdapter::instant())).await;
        add(&state, "Aspirin").await;
        add(&state, "Ibuprofen").await;

        let result = assistant.check_active_interactions().await.unwrap();
        assert!(result.has_interactions);
        assert_eq!(result.medications_checked, vec!["Aspirin", "Ibuprofen"]);
        let moderate: Vec<_> = result
            .interactions
            .iter()
            .filter(|r| r.severity == Severity::Moderate)
            .collect();
        assert_eq!(moderate.len(), 1);
        assert_eq!(moderate[0].medications, vec!["Aspirin", "Ibuprofen"]);

        let history = state.interaction_history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, result.id);
        assert!(!assistant.is_loading());
    }

    #[tokio::test]
    async fn unknown_drugs_display_as_no_interactions() {
        let (state, assistant) = setup(Arc::new(MockGeneratorAdapter::instant())).await;
        let a = add(&state, "Vitamin D").await;
        let b = add(&state, "Omeprazole").await;

        let result = assistant.check_interactions(&[a, b]).await.unwrap();
        assert_eq!(result.interactions.len(), 1);
        assert_eq!(result.interactions[0].severity, Severity::None);
        assert!(!result.has_interactions);
        assert!(!result.has_reportable_interactions());
    }

    #[tokio::test]
    async fn generation_failure_sets_error_without_retrying() {
        let generator = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
            reply: Err(PortError::Generation("status 503".into())),
        });
        let (state, assistant) = setup(generator.clone()).await;
        let meds = vec![add(&state, "Aspirin").await, add(&state, "Warfarin").await];

        let err = assistant.check_interactions(&meds).await.unwrap_err();
        assert!(matches!(err, PortError::Generation(_)));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(assistant.last_error().await.unwrap().contains("status 503"));
        assert!(!assistant.is_loading());
        assert!(state.interaction_history().await.is_empty());
    }

    #[tokio::test]
    async fn questions_are_logged_to_chat_history() {
        let (state, assistant) = setup(Arc::new(MockGeneratorAdapter::instant())).await;
        add(&state, "Metformin").await;

        let reply = assistant.ask_question("Should I take it with food?").await.unwrap();
        assert_eq!(reply.role, ChatRole::Assistant);
        assert!(reply.content.contains("Metformin"));

        let chat = state.chat_history().await;
        assert_eq!(chat.len(), 2);
        assert_eq!(chat[0].role, ChatRole::User);
        assert_eq!(chat[1], reply);
    }

    #[tokio::test]
    async fn failed_question_appends_an_error_message() {
        let generator = Arc::new(CountingGenerator {
            calls: AtomicUsize::new(0),
            reply: Err(PortError::Generation("offline".into())),
        });
        let (state, assistant) = setup(generator).await;

        assert!(assistant.ask_question("Hello?").await.is_err());
        let roles: Vec<ChatRole> = state.chat_history().await.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::Error]);
    }

    #[tokio::test]
    async fn lookups_normalize_mock_output() {
        let (state, assistant) = setup(Arc::new(MockGeneratorAdapter::instant())).await;
        let warfarin = add(&state, "Warfarin").await;

        let info = assistant.medication_info(&warfarin).await.unwrap();
        assert_eq!(info.drug_class, "Anticoagulant (vitamin K antagonist)");
        assert!(info.raw_info.is_none());

        let suggestions = assistant.suggestions(&warfarin).await.unwrap();
        assert!(!suggestions.tips.is_empty());
        assert!(suggestions.raw_suggestions.is_none());
    }

    #[tokio::test]
    async fn cancel_pending_aborts_in_flight_requests() {
        let (state, assistant) = setup(Arc::new(StalledGenerator)).await;
        let meds = vec![add(&state, "Aspirin").await, add(&state, "Ibuprofen").await];
        let assistant = Arc::new(assistant);

        let task = {
            let assistant = assistant.clone();
            tokio::spawn(async move { assistant.check_interactions(&meds).await })
        };
        while !assistant.is_loading() {
            tokio::task::yield_now().await;
        }
        assistant.cancel_pending().await;

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, Err(PortError::Cancelled)));
        assert!(!assistant.is_loading());
        assert!(assistant.last_error().await.is_none());
    }

    /// Fails medication-info prompts while `failing` is set; answers everything else.
    struct InfoOutage {
        failing: AtomicBool,
    }

    #[async_trait]
    impl ResponseGenerator for InfoOutage {
        async fn generate(&self, prompt: &str) -> PortResult<String> {
            tokio::task::yield_now().await;
            if prompt.contains("detailed information") && self.failing.load(Ordering::SeqCst) {
                Err(PortError::Generation("status 503".into()))
            } else {
                Ok("{}".into())
            }
        }

        fn name(&self) -> &'static str {
            "info-outage"
        }
    }

    #[tokio::test]
    async fn abandoned_request_does_not_leave_loading_set() {
        let (state, assistant) = setup(Arc::new(StalledGenerator)).await;
        let meds = vec![add(&state, "Aspirin").await, add(&state, "Ibuprofen").await];

        let outcome =
            tokio::time::timeout(Duration::from_millis(50), assistant.check_interactions(&meds)).await;
        assert!(outcome.is_err());
        assert!(!assistant.is_loading());
        assert!(assistant.last_error().await.is_none());
    }

    #[tokio::test]
    async fn failure_survives_a_concurrent_success() {
        let generator = Arc::new(InfoOutage {
            failing: AtomicBool::new(true),
        });
        let (state, assistant) = setup(generator.clone()).await;
        let warfarin = add(&state, "Warfarin").await;

        let (info, tips) = tokio::join!(
            assistant.medication_info(&warfarin),
            assistant.suggestions(&warfarin)
        );
        assert!(info.is_err());
        assert!(tips.is_ok());
        assert!(assistant.last_error().await.unwrap().contains("Medication info"));

        assistant.suggestions(&warfarin).await.unwrap();
        assert!(assistant.last_error().await.is_some());

        generator.failing.store(false, Ordering::SeqCst);
        assistant.medication_info(&warfarin).await.unwrap();
        assert!(assistant.last_error().await.is_none());
    }

    #[tokio::test]
    async fn clear_error_acknowledges_a_failure() {
        let generator = Arc::new(InfoOutage {
            failing: AtomicBool::new(true),
        });
        let (state, assistant) = setup(generator).await;
        let warfarin = add(&state, "Warfarin").await;

        assert!(assistant.medication_info(&warfarin).await.is_err());
        assistant.clear_error().await;
        assert!(assistant.last_error().await.is_none());
    }
}
