//! Local AI Brain provider
//!
//! A self-hosted OpenAI-compatible server configured through `LOCAL_AI_BRAIN_URL`.
//! The server ignores credentials but expects a bearer header, so a fixed
//! `local-brain` token is sent.

use super::openai::CompletionClient;
use super::{ChatProvider, Message, ProviderReply, Result};
use crate::config::LocalBrainConfig;
use crate::secrets::SecretString;
use async_trait::async_trait;
use sdk::types::Backend;

/// Placeholder returned when the local brain answers without text
pub const LOCAL_BRAIN_EMPTY_PLACEHOLDER: &str = "Local AI Brain failed to respond.";

pub struct LocalBrainProvider {
    inner: CompletionClient,
}

impl LocalBrainProvider {
    /// Create a provider for the server rooted at `root_url` (`/v1` is appended)
    pub fn new(root_url: &str, model: &str) -> Self {
        Self {
            inner: CompletionClient::new(
                Backend::LocalBrain,
                format!("{}/v1", root_url.trim_end_matches('/')),
                model,
                Some(SecretString::from("local-brain")),
                LOCAL_BRAIN_EMPTY_PLACEHOLDER,
            ),
        }
    }

    /// Build from config; `None` when no URL is configured
    pub fn from_config(config: &LocalBrainConfig) -> Option<Self> {
        config
            .base_url
            .as_deref()
            .map(|url| Self::new(url, &config.model))
    }

    pub fn endpoint(&self) -> &str {
        self.inner.base_url()
    }
}

#[async_trait]
impl ChatProvider for LocalBrainProvider {
    fn backend(&self) -> Backend {
        Backend::LocalBrain
    }

    async fn complete(&self, messages: &[Message]) -> Result<ProviderReply> {
        self.inner.complete(messages).await
    }
}
