//! Ollama LLM Provider
//!
//! This module implements the ChatProvider trait for Ollama, a local LLM runtime.
//! Ollama runs models locally on the user's machine, typically at http://localhost:11434,
//! and exposes an OpenAI-compatible endpoint under `/v1`.
//!
//! Key features:
//! - Local execution (no API keys required; a fixed `ollama` bearer is sent
//!   to the server-side alternate backend)
//! - Connectivity probe against `/api/tags` for the client-only variant

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use sdk::types::Backend;
use serde::Serialize;
use std::time::Duration;

use super::openai::CompletionClient;
use super::{ChatProvider, Message, ProviderReply, Result};
use crate::config::{LocalConfig, OllamaConfig};
use crate::secrets::SecretString;

/// Placeholder used by the server-side alternate backend
pub const OLLAMA_EMPTY_PLACEHOLDER: &str = "Ollama failed to respond.";

/// Placeholder used by the client-only local variant
pub const LOCAL_VARIANT_EMPTY_PLACEHOLDER: &str = "No response from Ollama";

/// Result of the last connectivity probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub reachable: bool,
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionStatus {
    /// Status before the first probe
    pub fn unknown() -> Self {
        Self {
            reachable: false,
            last_checked: None,
            error: None,
        }
    }

    pub fn reachable() -> Self {
        Self {
            reachable: true,
            last_checked: Some(Utc::now()),
            error: None,
        }
    }

    pub fn unreachable(error: impl Into<String>) -> Self {
        Self {
            reachable: false,
            last_checked: Some(Utc::now()),
            error: Some(error.into()),
        }
    }
}

/// Ollama provider
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    /// Server root (typically http://localhost:11434)
    root_url: String,

    inner: CompletionClient,

    /// HTTP client for probes
    client: Client,
}

impl OllamaProvider {
    /// Create the server-side alternate backend
    ///
    /// # Arguments
    /// * `root_url` - Server root (e.g., "http://localhost:11434"); `/v1` is appended
    /// * `model` - Model name to use (e.g., "llama3")
    pub fn new(root_url: &str, model: &str) -> Self {
        Self::build(
            root_url,
            model,
            Some(SecretString::from("ollama")),
            OLLAMA_EMPTY_PLACEHOLDER,
        )
    }

    /// Create the adapter used by the client-only local variant
    pub fn local_variant(config: &LocalConfig) -> Self {
        Self::build(
            &config.base_url,
            &config.model,
            None,
            LOCAL_VARIANT_EMPTY_PLACEHOLDER,
        )
    }

    /// Build from config; `None` when no URL is configured
    pub fn from_config(config: &OllamaConfig) -> Option<Self> {
        config
            .base_url
            .as_deref()
            .map(|url| Self::new(url, &config.model))
    }

    fn build(
        root_url: &str,
        model: &str,
        api_key: Option<SecretString>,
        placeholder: &str,
    ) -> Self {
        let root_url = root_url.trim_end_matches('/').to_string();
        Self {
            inner: CompletionClient::new(
                Backend::Ollama,
                format!("{}/v1", root_url),
                model,
                api_key,
                placeholder,
            ),
            root_url,
            client: Client::new(),
        }
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }

    /// Probe `GET {root}/api/tags` within `timeout`.
    ///
    /// Never fails: an unreachable server is reported in the status.
    pub async fn check_connection(&self, timeout: Duration) -> ConnectionStatus {
        let url = format!("{}/api/tags", self.root_url);

        match self.client.get(&url).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => ConnectionStatus::reachable(),
            Ok(response) => {
                tracing::debug!("Ollama probe returned {}", response.status());
                ConnectionStatus::unreachable("Ollama not responding")
            }
            Err(e) if e.is_timeout() => ConnectionStatus::unreachable(
                "Connection timeout - Ollama may be slow or not running",
            ),
            Err(e) => {
                tracing::debug!("Ollama probe failed: {}", e);
                ConnectionStatus::unreachable(format!(
                    "Cannot connect to Ollama at {}. Start it with: ollama serve",
                    self.root_url
                ))
            }
        }
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn backend(&self) -> Backend {
        Backend::Ollama
    }

    async fn check_health(&self) -> bool {
        self.check_connection(Duration::from_secs(5)).await.reachable
    }

    async fn complete(&self, messages: &[Message]) -> Result<ProviderReply> {
        self.inner.complete(messages).await
    }
}
