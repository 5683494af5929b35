//! Client-only local variant
//!
//! Chat without the server store: turns live in a JSON file and every message
//! goes straight to a local Ollama. There is no fallback; at most one adapter
//! call is made per message.

pub mod history;

pub use history::{LocalHistory, LocalMessage};

use crate::conductor::context::build_messages;
use crate::config::LocalConfig;
use crate::llm::{ChatProvider, ConnectionStatus, LLMError, Message, OllamaProvider, ProviderError};
use sdk::errors::EngineError;
use sdk::types::{Backend, Role};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct LocalChat {
    provider: Arc<dyn ChatProvider>,
    probe: OllamaProvider,
    history: Mutex<LocalHistory>,
    status: watch::Sender<ConnectionStatus>,
    system_prompt: String,
    context_window: usize,
    probe_timeout: Duration,
    request_timeout: Duration,
}

impl LocalChat {
    /// Open the local variant described by `config`
    pub async fn open(config: &LocalConfig, system_prompt: impl Into<String>) -> Self {
        let provider = OllamaProvider::local_variant(config);
        let history = LocalHistory::load(&config.history_file, config.retention_limit).await;

        Self::with_provider(Arc::new(provider.clone()), provider, history, system_prompt)
            .with_context_window(config.context_window)
            .with_probe_timeout(Duration::from_secs(config.probe_timeout_secs))
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs))
    }

    /// Assemble from parts; `probe` is used only for connectivity checks
    pub fn with_provider(
        provider: Arc<dyn ChatProvider>,
        probe: OllamaProvider,
        history: LocalHistory,
        system_prompt: impl Into<String>,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::unknown());
        Self {
            provider,
            probe,
            history: Mutex::new(history),
            status,
            system_prompt: system_prompt.into(),
            context_window: 10,
            probe_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_context_window(mut self, window: usize) -> Self {
        self.context_window = window;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Bound on each chat call; an elapsed call counts as unreachable
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Send one message.
    ///
    /// Context is the stored turns before this message. The user turn is
    /// saved before the call and kept if the call fails. The history lock is
    /// not held while Ollama is working.
    pub async fn send(&self, message: &str) -> Result<String, EngineError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(EngineError::Validation(
                "Message cannot be empty".to_string(),
            ));
        }

        let context = {
            let mut history = self.history.lock().await;
            let context = build_messages(
                &self.system_prompt,
                history
                    .recent(self.context_window)
                    .iter()
                    .map(|m| Message {
                        role: m.role,
                        content: m.content.clone(),
                    }),
                message,
            );
            history.push(LocalMessage::new(Role::User, message)).await?;
            context
        };

        let result = match tokio::time::timeout(
            self.request_timeout,
            self.provider.complete(&context),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::new(Backend::Ollama, LLMError::Timeout)),
        };

        match result {
            Ok(reply) => {
                let text = reply.into_text();
                self.history
                    .lock()
                    .await
                    .push(LocalMessage::new(Role::Assistant, text.as_str()))
                    .await?;
                Ok(text)
            }
            Err(e) => {
                warn!("Local Ollama call failed: {}", e);
                if e.is_connection_failure() {
                    self.status
                        .send_replace(ConnectionStatus::unreachable(e.cause.to_string()));
                }
                Err(EngineError::provider_unavailable(
                    e.backend.display_name(),
                    e.cause,
                ))
            }
        }
    }

    /// Stored turns, oldest first
    pub async fn history(&self) -> Vec<LocalMessage> {
        self.history.lock().await.messages().to_vec()
    }

    /// Empty the log and delete its file
    pub async fn clear(&self) -> Result<(), EngineError> {
        self.history.lock().await.clear().await?;
        info!("Local history cleared");
        Ok(())
    }

    /// Probe Ollama now and publish the result
    pub async fn check_connection(&self) -> ConnectionStatus {
        let status = self.probe.check_connection(self.probe_timeout).await;
        debug!(reachable = status.reachable, "Ollama probe finished");
        self.status.send_replace(status.clone());
        status
    }

    /// Latest published status
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Receive every status update
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Probe immediately, then every `interval`, until the monitor is dropped
    pub fn start_monitor(self: &Arc<Self>, interval: Duration) -> ConnectionMonitor {
        let chat = Arc::clone(self);
        let receiver = self.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                chat.check_connection().await;
            }
        });

        ConnectionMonitor { handle, receiver }
    }
}

/// Background connectivity polling; stops when dropped
pub struct ConnectionMonitor {
    handle: JoinHandle<()>,
    receiver: watch::Receiver<ConnectionStatus>,
}

impl ConnectionMonitor {
    /// Wait for the next published status
    pub async fn changed(&mut self) -> Option<ConnectionStatus> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    pub fn latest(&self) -> ConnectionStatus {
        self.receiver.borrow().clone()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for ConnectionMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
