//! crates/medtrack_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, so the core
//! stays independent of the concrete storage backend and generator vendor.

use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The text generation endpoint failed or returned an unusable envelope.
    #[error("Generation failed: {0}")]
    Generation(String),
    /// A read, write or serialization failure against the key-value store.
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("The request was cancelled")]
    Cancelled,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A string-keyed, string-valued persistent store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value, or `None` if the key was never written.
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> PortResult<()>;

    async fn multi_remove(&self, keys: &[&str]) -> PortResult<()>;
}

/// Turns a prompt into generated text.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> PortResult<String>;

    /// A short backend name for logs.
    fn name(&self) -> &'static str;
}
