//! LLM Provider Abstraction Layer
//!
//! This module provides a common interface over the chat backends: the hosted
//! OpenAI-compatible API, the self-hosted "local brain" and the alternate local
//! runtime (Ollama). All three speak `POST {base}/chat/completions`.
//! The `ChatProvider` trait is the contract the router works against.

use async_trait::async_trait;
use sdk::types::{Backend, ChatTurn, Role};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod local_brain;
pub mod ollama;
pub mod openai;
pub mod router;

pub use local_brain::LocalBrainProvider;
pub use ollama::{ConnectionStatus, OllamaProvider};
pub use openai::HostedProvider;
pub use router::{ProviderRequest, ProviderRouter, RouteOutcome, RouteState};

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur while calling one backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Request rejected ({status}): {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// A failed call, tagged with the backend that failed
#[derive(Debug, Clone, thiserror::Error)]
#[error("{} failed: {cause}", .backend.display_name())]
pub struct ProviderError {
    pub backend: Backend,
    #[source]
    pub cause: LLMError,
}

impl ProviderError {
    pub fn new(backend: Backend, cause: LLMError) -> Self {
        Self { backend, cause }
    }

    /// True when the backend could not be reached at all
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self.cause,
            LLMError::ProviderUnavailable(_) | LLMError::NetworkError(_) | LLMError::Timeout
        )
    }
}

/// A successful completion.
///
/// `Empty` is a degenerate success: the body parsed but carried no text, and
/// the adapter substituted its placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderReply {
    Completed(String),
    Empty(String),
}

impl ProviderReply {
    /// Text shown to the caller either way
    pub fn text(&self) -> &str {
        match self {
            ProviderReply::Completed(text) | ProviderReply::Empty(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ProviderReply::Completed(text) | ProviderReply::Empty(text) => text,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ProviderReply::Empty(_))
    }
}

/// Message in a provider request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

impl From<&ChatTurn> for Message {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.role, self.content)
    }
}

/// Chat backend trait that all adapters implement
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Which backend this adapter talks to
    fn backend(&self) -> Backend;

    /// Returns the name of the provider (e.g., "hosted", "ollama")
    fn name(&self) -> &str {
        self.backend().name()
    }

    /// Returns true if the backend runs on operator-controlled hardware
    fn is_local(&self) -> bool {
        self.backend().is_local()
    }

    /// Send one ordered conversation and return the completion.
    ///
    /// # Returns
    /// * `Ok(ProviderReply::Completed)` - non-empty completion text
    /// * `Ok(ProviderReply::Empty)` - parsed body without text; carries the placeholder
    /// * `Err(ProviderError)` - network, timeout, status, body or credential failure
    async fn complete(&self, messages: &[Message]) -> Result<ProviderReply>;

    /// Check if the provider is currently usable.
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, Role::User);
        assert_eq!(user_msg.content, "Hello");

        let assistant_msg = Message::assistant("Hi there");
        assert_eq!(assistant_msg.role, Role::Assistant);

        let system_msg = Message::system("You are a helpful assistant");
        assert_eq!(system_msg.role, Role::System);
    }

    #[test]
    fn test_message_from_turn() {
        let turn = ChatTurn {
            id: 7,
            role: Role::Assistant,
            content: "hi there".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(Message::from(&turn), Message::assistant("hi there"));
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_string(&Message::user("test")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"test"}"#);
    }

    #[test]
    fn test_reply_text() {
        assert_eq!(ProviderReply::Completed("a".into()).text(), "a");
        let empty = ProviderReply::Empty("placeholder".into());
        assert!(empty.is_empty());
        assert_eq!(empty.into_text(), "placeholder");
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::new(Backend::Ollama, LLMError::Timeout);
        assert_eq!(err.to_string(), "Ollama failed: Timeout");
        assert!(err.is_connection_failure());

        let err = ProviderError::new(Backend::Hosted, LLMError::RateLimitExceeded);
        assert!(!err.is_connection_failure());
    }
}
