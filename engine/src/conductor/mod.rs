//! Conductor System
//!
//! Orchestrates one chat exchange: persist the inbound turn, assemble context,
//! route to a backend, persist the reply.
//!
//! The store is the only shared mutable state; everything here is immutable
//! after construction and shared across requests behind an `Arc`.

pub mod context;
pub mod prompts;

pub use context::ContextAssembler;

use crate::config::ChatConfig;
use crate::db::ConversationStore;
use crate::llm::{Message, ProviderRequest, ProviderRouter, RouteOutcome};
use sdk::errors::EngineError;
use sdk::types::{Backend, ChatTurn, ProviderPreference, PublicPromptResponse, Role};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Placeholder for an empty reply on the public endpoint
pub const PUBLIC_EMPTY_PLACEHOLDER: &str = "No response from AI.";

/// Reply to one chat exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// Text stored as the assistant turn and returned to the caller
    pub text: String,

    /// Backend that produced (or failed to produce) the text
    pub backend: Backend,

    /// True when `text` is a placeholder or the fixed local-brain error
    pub degraded: bool,
}

/// Windows and prompts used by the orchestrator
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub interactive_window: usize,
    pub external_window: usize,
    pub history_limit: usize,
    pub system_prompt: String,
    pub external_system_prompt: String,
    pub identity_prompt: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for ChatSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            interactive_window: config.interactive_window,
            external_window: config.external_window,
            history_limit: config.history_limit,
            system_prompt: config.system_prompt().to_string(),
            external_system_prompt: config.external_system_prompt().to_string(),
            identity_prompt: config.identity_prompt().to_string(),
        }
    }
}

pub struct ChatOrchestrator {
    store: Arc<dyn ConversationStore>,
    router: Arc<ProviderRouter>,
    assembler: ContextAssembler,
    settings: ChatSettings,
}

impl ChatOrchestrator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        router: Arc<ProviderRouter>,
        settings: ChatSettings,
    ) -> Self {
        Self {
            assembler: ContextAssembler::new(Arc::clone(&store)),
            store,
            router,
            settings,
        }
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    /// Interactive chat.
    ///
    /// The user turn is stored before any provider call and stays stored if
    /// the hosted backend turns out to be unavailable.
    #[instrument(skip(self, message), fields(chars = message.len()))]
    pub async fn send(
        &self,
        message: &str,
        preference: ProviderPreference,
    ) -> Result<ChatReply, EngineError> {
        require_text(message, "Message must not be empty")?;

        self.store.append(Role::User, message).await?;

        let messages = self
            .assembler
            .assemble(
                &self.settings.system_prompt,
                message,
                self.settings.interactive_window,
            )
            .await?;

        let outcome = self
            .router
            .route(&ProviderRequest::new(messages, preference))
            .await;

        let reply = reply_from_outcome(outcome)?;
        self.store.append(Role::Assistant, &reply.text).await?;

        info!(backend = reply.backend.name(), degraded = reply.degraded, "Chat turn completed");
        Ok(reply)
    }

    /// Chat for a caller authenticated by API key.
    ///
    /// Hosted backend only, shorter window. Both turns are stored after the
    /// reply arrives, the user turn tagged with the key's name.
    #[instrument(skip(self, message), fields(chars = message.len()))]
    pub async fn send_external(
        &self,
        caller: &str,
        message: &str,
    ) -> Result<ChatReply, EngineError> {
        require_text(message, "Message must not be empty")?;

        let messages = self
            .assembler
            .assemble(
                &self.settings.external_system_prompt,
                message,
                self.settings.external_window,
            )
            .await?;

        let reply = reply_from_outcome(self.router.route_hosted(&messages).await)?;

        self.store
            .append(Role::User, &format!("[API:{}] {}", caller, message))
            .await?;
        self.store.append(Role::Assistant, &reply.text).await?;

        Ok(reply)
    }

    /// Single-shot prompt for the public endpoint. No history is sent.
    #[instrument(skip(self, prompt), fields(chars = prompt.len()))]
    pub async fn send_public(&self, prompt: &str) -> Result<PublicPromptResponse, EngineError> {
        require_text(prompt, "No prompt provided")?;

        let messages = vec![
            Message::system(self.settings.identity_prompt.as_str()),
            Message::user(prompt),
        ];

        let reply = match self.router.route_hosted(&messages).await {
            RouteOutcome::Empty { .. } => PUBLIC_EMPTY_PLACEHOLDER.to_string(),
            outcome => reply_from_outcome(outcome)?.text,
        };

        self.store
            .append(Role::User, &format!("[PUBLIC_API] {}", prompt))
            .await?;
        self.store.append(Role::Assistant, &reply).await?;

        Ok(PublicPromptResponse {
            system: prompts::PUBLIC_SYSTEM_NAME.to_string(),
            reply,
        })
    }

    /// Last `limit` turns, oldest first
    pub async fn history(&self, limit: usize) -> Result<Vec<ChatTurn>, EngineError> {
        let mut turns = self.store.recent(limit).await?;
        turns.reverse();
        Ok(turns)
    }

    /// Delete the whole conversation
    pub async fn clear(&self) -> Result<(), EngineError> {
        self.store.clear_all().await?;
        info!("Conversation cleared");
        Ok(())
    }
}

fn require_text(text: &str, error: &str) -> Result<(), EngineError> {
    if text.trim().is_empty() {
        return Err(EngineError::Validation(error.to_string()));
    }
    Ok(())
}

fn reply_from_outcome(outcome: RouteOutcome) -> Result<ChatReply, EngineError> {
    match outcome {
        RouteOutcome::Completed { backend, text } => Ok(ChatReply {
            text,
            backend,
            degraded: false,
        }),
        RouteOutcome::Empty {
            backend,
            placeholder,
        } => Ok(ChatReply {
            text: placeholder,
            backend,
            degraded: true,
        }),
        RouteOutcome::LocalBrainUnreachable { text } => Ok(ChatReply {
            text,
            backend: Backend::LocalBrain,
            degraded: true,
        }),
        RouteOutcome::Unavailable { backend, error } => {
            warn!("No backend produced a reply: {}", error);
            Err(EngineError::provider_unavailable(backend.display_name(), error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text() {
        assert!(require_text("hello", "x").is_ok());
        assert!(matches!(
            require_text("   \n", "empty"),
            Err(EngineError::Validation(msg)) if msg == "empty"
        ));
    }

    #[test]
    fn test_reply_from_outcome() {
        let reply = reply_from_outcome(RouteOutcome::Empty {
            backend: Backend::Hosted,
            placeholder: "I am processing your request.".to_string(),
        })
        .unwrap();
        assert!(reply.degraded);
        assert_eq!(reply.text, "I am processing your request.");

        let err = reply_from_outcome(RouteOutcome::Unavailable {
            backend: Backend::Hosted,
            error: "Hosted AI failed: Timeout".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::ProviderUnavailable { .. }));
    }

    #[test]
    fn test_settings_from_config() {
        let settings = ChatSettings::default();
        assert_eq!(settings.interactive_window, 10);
        assert_eq!(settings.external_window, 5);
        assert!(settings.system_prompt.contains("IDENTITY & PERSONALITY PROTOCOL"));
        assert!(settings.external_system_prompt.contains("EXTERNAL INTERFACE PROTOCOL"));
    }
}
