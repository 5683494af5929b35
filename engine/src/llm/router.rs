//! Provider Router
//!
//! Picks the backend for one request from the caller's preference, applies the
//! fallback policy and folds every adapter failure into a single `RouteOutcome`.
//!
//! | State | Calls | On failure |
//! |---|---|---|
//! | `PreferLocalBrain` | local brain | fixed error text, hosted never called |
//! | `PreferAlternateLocal` | Ollama | hosted, exactly once |
//! | `Default` | hosted | `Unavailable` |
//!
//! A preference whose adapter is not configured routes as `Default`.
//! If both preferences are set, the local brain wins.

use super::local_brain::LocalBrainProvider;
use super::ollama::OllamaProvider;
use super::openai::HostedProvider;
use super::{ChatProvider, LLMError, Message, ProviderError, ProviderReply};
use crate::config::LLMConfig;
use sdk::types::{Backend, ProviderPreference};
use std::sync::Arc;
use std::time::Duration;

/// Final text when the local brain was requested and failed
pub const LOCAL_BRAIN_UNREACHABLE: &str = "Error: Could not connect to the local AI Brain server.";

/// One routed request
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub messages: Vec<Message>,
    pub preference: ProviderPreference,
}

impl ProviderRequest {
    pub fn new(messages: Vec<Message>, preference: ProviderPreference) -> Self {
        Self {
            messages,
            preference,
        }
    }
}

/// Routing decision for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    PreferLocalBrain,
    PreferAlternateLocal,
    Default,
}

/// Result of a single adapter attempt
#[derive(Debug, Clone)]
pub enum ProviderResult {
    Success(ProviderReply),
    Failure {
        error: ProviderError,
        fallback_permitted: bool,
    },
}

/// Terminal result of routing one request
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// A backend produced text
    Completed { backend: Backend, text: String },

    /// A backend answered without text; `placeholder` stands in for it
    Empty { backend: Backend, placeholder: String },

    /// The local brain was requested and failed
    LocalBrainUnreachable { text: String },

    /// The hosted backend failed and nothing is left to try
    Unavailable { backend: Backend, error: String },
}

impl RouteOutcome {
    /// Text to store and return, if the request produced any
    pub fn text(&self) -> Option<&str> {
        match self {
            RouteOutcome::Completed { text, .. } => Some(text),
            RouteOutcome::Empty { placeholder, .. } => Some(placeholder),
            RouteOutcome::LocalBrainUnreachable { text } => Some(text),
            RouteOutcome::Unavailable { .. } => None,
        }
    }

    /// Backend whose answer (or failure) ended the request
    pub fn backend(&self) -> Backend {
        match self {
            RouteOutcome::Completed { backend, .. }
            | RouteOutcome::Empty { backend, .. }
            | RouteOutcome::Unavailable { backend, .. } => *backend,
            RouteOutcome::LocalBrainUnreachable { .. } => Backend::LocalBrain,
        }
    }

    fn from_reply(backend: Backend, reply: ProviderReply) -> Self {
        match reply {
            ProviderReply::Completed(text) => RouteOutcome::Completed { backend, text },
            ProviderReply::Empty(placeholder) => RouteOutcome::Empty {
                backend,
                placeholder,
            },
        }
    }
}

/// Router over the configured chat backends.
///
/// Immutable after construction; share it behind an `Arc`.
pub struct ProviderRouter {
    hosted: Arc<dyn ChatProvider>,
    local_brain: Option<Arc<dyn ChatProvider>>,
    alternate_local: Option<Arc<dyn ChatProvider>>,
    hosted_timeout: Duration,
    local_timeout: Duration,
}

impl ProviderRouter {
    /// Create a router with only the hosted backend
    pub fn new(hosted: Arc<dyn ChatProvider>) -> Self {
        Self {
            hosted,
            local_brain: None,
            alternate_local: None,
            hosted_timeout: Duration::from_secs(60),
            local_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_local_brain(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.local_brain = Some(provider);
        self
    }

    pub fn with_alternate_local(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.alternate_local = Some(provider);
        self
    }

    pub fn with_timeouts(mut self, hosted: Duration, local: Duration) -> Self {
        self.hosted_timeout = hosted;
        self.local_timeout = local;
        self
    }

    /// Build every adapter the configuration enables
    pub fn from_config(config: &LLMConfig) -> Self {
        let mut router = Self::new(Arc::new(HostedProvider::new(&config.hosted))).with_timeouts(
            Duration::from_secs(config.hosted_timeout_secs),
            Duration::from_secs(config.local_timeout_secs),
        );

        if let Some(provider) = LocalBrainProvider::from_config(&config.local_brain) {
            tracing::info!("Local AI Brain configured at {}", provider.endpoint());
            router = router.with_local_brain(Arc::new(provider));
        }
        if let Some(provider) = OllamaProvider::from_config(&config.ollama) {
            tracing::info!("Ollama configured at {}", provider.root_url());
            router = router.with_alternate_local(Arc::new(provider));
        }

        router
    }

    /// Backends that can currently be routed to, hosted first
    pub fn configured_backends(&self) -> Vec<Backend> {
        let mut backends = vec![self.hosted.backend()];
        if let Some(p) = &self.local_brain {
            backends.push(p.backend());
        }
        if let Some(p) = &self.alternate_local {
            backends.push(p.backend());
        }
        backends
    }

    /// Decide the routing state for a preference
    pub fn state_for(&self, preference: ProviderPreference) -> RouteState {
        match preference {
            ProviderPreference::LocalBrain if self.local_brain.is_some() => {
                RouteState::PreferLocalBrain
            }
            ProviderPreference::AlternateLocal if self.alternate_local.is_some() => {
                RouteState::PreferAlternateLocal
            }
            _ => RouteState::Default,
        }
    }

    /// Route one request to completion. Adapter failures never escape.
    pub async fn route(&self, request: &ProviderRequest) -> RouteOutcome {
        let state = self.state_for(request.preference);
        tracing::debug!(?state, preference = ?request.preference, "Routing chat request");

        match (state, &self.local_brain, &self.alternate_local) {
            (RouteState::PreferLocalBrain, Some(local_brain), _) => {
                match self.attempt(local_brain.as_ref(), &request.messages, false).await {
                    ProviderResult::Success(reply) => {
                        RouteOutcome::from_reply(Backend::LocalBrain, reply)
                    }
                    ProviderResult::Failure { .. } => RouteOutcome::LocalBrainUnreachable {
                        text: LOCAL_BRAIN_UNREACHABLE.to_string(),
                    },
                }
            }
            (RouteState::PreferAlternateLocal, _, Some(alternate)) => {
                match self.attempt(alternate.as_ref(), &request.messages, true).await {
                    ProviderResult::Success(reply) => {
                        RouteOutcome::from_reply(alternate.backend(), reply)
                    }
                    ProviderResult::Failure {
                        fallback_permitted: true,
                        ..
                    } => {
                        tracing::info!("Falling back to hosted backend");
                        self.route_hosted(&request.messages).await
                    }
                    ProviderResult::Failure { error, .. } => RouteOutcome::Unavailable {
                        backend: error.backend,
                        error: error.to_string(),
                    },
                }
            }
            _ => self.route_hosted(&request.messages).await,
        }
    }

    /// Send straight to the hosted backend, with no fallback
    pub async fn route_hosted(&self, messages: &[Message]) -> RouteOutcome {
        match self.attempt(self.hosted.as_ref(), messages, false).await {
            ProviderResult::Success(reply) => RouteOutcome::from_reply(Backend::Hosted, reply),
            ProviderResult::Failure { error, .. } => RouteOutcome::Unavailable {
                backend: error.backend,
                error: error.to_string(),
            },
        }
    }

    /// One bounded adapter call. Failures are logged here.
    ///
    /// `fallback_permitted` comes from the route state, not from the backend
    /// kind, so any provider placed in the alternate-local slot falls back.
    async fn attempt(
        &self,
        provider: &dyn ChatProvider,
        messages: &[Message],
        fallback_permitted: bool,
    ) -> ProviderResult {
        let backend = provider.backend();
        let timeout = if provider.is_local() {
            self.local_timeout
        } else {
            self.hosted_timeout
        };

        tracing::debug!(
            "Attempting provider: {} (timeout: {}s)",
            provider.name(),
            timeout.as_secs()
        );

        let error = match tokio::time::timeout(timeout, provider.complete(messages)).await {
            Ok(Ok(reply)) => {
                tracing::info!(
                    "Provider {} succeeded{}",
                    provider.name(),
                    if reply.is_empty() { " (empty reply)" } else { "" }
                );
                return ProviderResult::Success(reply);
            }
            Ok(Err(e)) => e,
            Err(_) => ProviderError::new(backend, LLMError::Timeout),
        };

        tracing::warn!("Provider {} failed: {}", provider.name(), error);

        ProviderResult::Failure {
            fallback_permitted,
            error,
        }
    }

    /// Check the health of all configured providers
    /// Returns a list of (backend, is_healthy)
    pub async fn check_health(&self) -> Vec<(Backend, bool)> {
        let mut results = Vec::new();
        let providers = std::iter::once(&self.hosted)
            .chain(self.local_brain.iter())
            .chain(self.alternate_local.iter());
        for provider in providers {
            results.push((provider.backend(), provider.check_health().await));
        }
        results
    }
}
