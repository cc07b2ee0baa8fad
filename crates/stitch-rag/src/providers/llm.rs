//! Language model trait for chat and plain completions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Chat message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Trait for language model completion
///
/// Implementations:
/// - `OpenAiChat`: OpenAI-compatible `/chat/completions` endpoint
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run a chat completion and return the assistant's reply
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Single-prompt completion, sent as one user message
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.chat(&[ChatMessage::user(prompt)]).await
    }

    /// Completion that never fails: errors are logged and yield `None`.
    ///
    /// Used only by the plain-completion endpoints; the RAG answer path
    /// propagates errors instead.
    async fn complete_lenient(&self, prompt: &str) -> Option<String> {
        match self.complete(prompt).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!("{} completion failed: {}", self.name(), e);
                None
            }
        }
    }

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
