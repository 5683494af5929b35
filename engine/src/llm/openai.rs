//! OpenAI-compatible chat completions client and the hosted provider
//!
//! Every backend exposes the same `POST {base}/chat/completions` endpoint, so
//! the request/response handling lives here and the adapters differ only in
//! base URL, model, credential and empty-reply placeholder.

use super::{ChatProvider, LLMError, Message, ProviderError, ProviderReply, Result};
use crate::config::HostedConfig;
use crate::secrets::{scrub, SecretString};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use sdk::types::Backend;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Placeholder returned when the hosted API answers without text
pub const HOSTED_EMPTY_PLACEHOLDER: &str = "I am processing your request.";

const MAX_ERROR_BODY: usize = 512;

/// Request body for `/chat/completions`
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

/// Shared HTTP plumbing for OpenAI-compatible endpoints
#[derive(Debug, Clone)]
pub(crate) struct CompletionClient {
    backend: Backend,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    placeholder: String,
    client: Client,
}

impl CompletionClient {
    pub(crate) fn new(
        backend: Backend,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<SecretString>,
        placeholder: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            placeholder: placeholder.into(),
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .unwrap_or_default(),
        }
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    pub(crate) fn has_credentials(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.is_empty())
    }

    fn fail(&self, cause: LLMError) -> ProviderError {
        ProviderError::new(self.backend, cause)
    }

    pub(crate) async fn complete(&self, messages: &[Message]) -> Result<ProviderReply> {
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(
            backend = self.backend.name(),
            model = %self.model,
            messages = messages.len(),
            total_chars = messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "Sending chat completion request"
        );

        let payload = CompletionRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&payload);

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key.unsecure()));
        }

        let start = Instant::now();
        let response = request.send().await.map_err(|e| {
            self.fail(if e.is_timeout() {
                LLMError::Timeout
            } else if e.is_connect() {
                LLMError::ProviderUnavailable(format!("Cannot connect to {}", self.base_url))
            } else {
                LLMError::NetworkError(scrub(&e.to_string()))
            })
        })?;

        tracing::debug!(
            backend = self.backend.name(),
            status = %response.status(),
            "Response received in {:.1}s",
            start.elapsed().as_secs_f64()
        );

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = truncate(&scrub(&body), MAX_ERROR_BODY);

            return Err(self.fail(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    LLMError::AuthenticationFailed(body)
                }
                StatusCode::TOO_MANY_REQUESTS => LLMError::RateLimitExceeded,
                _ => LLMError::HttpStatus {
                    status: status.as_u16(),
                    body,
                },
            }));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.fail(LLMError::ParseError(e.to_string())))?;

        parse_completion(&data, &self.placeholder).map_err(|e| self.fail(e))
    }
}

/// Extract the reply from a `/chat/completions` body.
///
/// A missing `choices[0].message` is malformed. A present message whose
/// `content` is null or empty is an empty success.
pub(crate) fn parse_completion(
    data: &serde_json::Value,
    placeholder: &str,
) -> std::result::Result<ProviderReply, LLMError> {
    let choice = data
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| LLMError::ParseError("No choices in response".to_string()))?;

    let message = choice
        .get("message")
        .filter(|m| m.is_object())
        .ok_or_else(|| LLMError::ParseError("No message in choice".to_string()))?;

    match message.get("content").and_then(|c| c.as_str()) {
        Some(content) if !content.is_empty() => Ok(ProviderReply::Completed(content.to_string())),
        _ => Ok(ProviderReply::Empty(placeholder.to_string())),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Hosted OpenAI-compatible provider (the default backend)
pub struct HostedProvider {
    inner: CompletionClient,
}

impl HostedProvider {
    pub fn new(config: &HostedConfig) -> Self {
        Self::with_endpoint(&config.base_url, &config.model, config.api_key.clone())
    }

    /// Construct against an explicit endpoint (`base_url` includes `/v1`)
    pub fn with_endpoint(base_url: &str, model: &str, api_key: Option<SecretString>) -> Self {
        Self {
            inner: CompletionClient::new(
                Backend::Hosted,
                base_url,
                model,
                api_key,
                HOSTED_EMPTY_PLACEHOLDER,
            ),
        }
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }
}

#[async_trait]
impl ChatProvider for HostedProvider {
    fn backend(&self) -> Backend {
        Backend::Hosted
    }

    async fn check_health(&self) -> bool {
        self.inner.has_credentials()
    }

    async fn complete(&self, messages: &[Message]) -> Result<ProviderReply> {
        if !self.inner.has_credentials() {
            return Err(ProviderError::new(
                Backend::Hosted,
                LLMError::MissingCredentials(
                    "AI_INTEGRATIONS_OPENAI_API_KEY is not set".to_string(),
                ),
            ));
        }
        self.inner.complete(messages).await
    }
}
