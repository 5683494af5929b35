//! Context Assembler
//!
//! Builds the message list for one provider call:
//! `[system prompt] ++ last N turns (oldest first) ++ [new user message]`.
//! Reads the store, never writes it.

use crate::db::ConversationStore;
use crate::llm::Message;
use sdk::errors::EngineError;
use sdk::types::ChatTurn;
use std::sync::Arc;

pub struct ContextAssembler {
    store: Arc<dyn ConversationStore>,
}

impl ContextAssembler {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Assemble at most `window + 2` messages for `message`.
    ///
    /// Fewer than `window` stored turns means all of them are used.
    pub async fn assemble(
        &self,
        system_prompt: &str,
        message: &str,
        window: usize,
    ) -> Result<Vec<Message>, EngineError> {
        let recent = self.store.recent(window).await?;
        Ok(compose(system_prompt, &recent, message))
    }
}

/// Compose from turns as the store returns them (newest first)
pub fn compose(
    system_prompt: &str,
    recent_newest_first: &[ChatTurn],
    message: &str,
) -> Vec<Message> {
    build_messages(
        system_prompt,
        recent_newest_first.iter().rev().map(Message::from),
        message,
    )
}

/// Compose from history that is already oldest first
pub fn build_messages<I>(system_prompt: &str, history: I, message: &str) -> Vec<Message>
where
    I: IntoIterator<Item = Message>,
{
    let history = history.into_iter();
    let mut messages = Vec::with_capacity(history.size_hint().0 + 2);

    messages.push(Message::system(system_prompt));
    messages.extend(history);
    messages.push(Message::user(message));

    messages
}
