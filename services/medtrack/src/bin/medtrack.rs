//! services/medtrack/src/bin/medtrack.rs

use medtrack_lib::{
    adapters::{FileKvAdapter, GeminiAdapter, MockGeneratorAdapter},
    assistant::MedicationAssistant,
    config::{Config, GeneratorMode},
    error::AppError,
    state::AppStateManager,
    storage::JsonStorage,
};
use medtrack_core::ResponseGenerator;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting medtrack...");

    // --- 2. Open Storage ---
    info!(path = %config.data_dir.display(), "Opening data directory...");
    let store = Arc::new(FileKvAdapter::open(&config.data_dir).await?);
    let storage = JsonStorage::new(store);

    // --- 3. Select the Text Generator ---
    let generator: Arc<dyn ResponseGenerator> = match config.generator_mode {
        GeneratorMode::Live => Arc::new(GeminiAdapter::from_config(&config)?),
        GeneratorMode::Mock => Arc::new(MockGeneratorAdapter::new(config.mock_delay)),
    };
    info!(generator = generator.name(), "Text generator ready");

    // --- 4. Load Application State ---
    let state = Arc::new(AppStateManager::new(storage));
    state.initialize().await;
    if let Some(error) = state.error().await {
        warn!("Started with errors: {}", error);
    }

    let snapshot = state.snapshot().await;
    info!(
        active = snapshot.active_medications().len(),
        inactive = snapshot.inactive_medications().len(),
        checks = snapshot.interaction_history.len(),
        messages = snapshot.chat_history.len(),
        onboarded = snapshot.onboarding_complete,
        theme = ?snapshot.settings.theme_mode,
        "Application state ready"
    );

    // --- 5. Run an Interaction Check over Active Medications ---
    let assistant = MedicationAssistant::new(generator, state.clone());
    if snapshot.active_medications().len() >= 2 {
        let result = assistant.check_active_interactions().await?;
        info!(
            warnings = result.reportable_interactions().count(),
            highest = %result.highest_severity(),
            "{}",
            result.summary
        );
    } else {
        info!("Fewer than two active medications; skipping interaction check.");
    }

    state.teardown().await;
    Ok(())
}
