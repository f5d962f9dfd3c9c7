use async_trait::async_trait;

use crate::domain::{ChatMessage, ChatOptions, DomainError};

/// An interface for one chat round-trip against an LLM backend.
///
/// Implementors encapsulate transport, serialization, and vendor-specific API
/// details. Consumers (e.g. [`crate::ChatSession`]) remain decoupled from any
/// particular provider or HTTP client library. Failures of the round-trip
/// itself surface as [`DomainError::Transport`] and are never retried by the
/// structured-output recovery loop.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send the full ordered message sequence to `model` and return the
    /// assistant's raw response text.
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, DomainError>;
}
