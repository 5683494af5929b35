//! On-disk chat log for the client-only local variant
//!
//! A single JSON array of turns. Unreadable or corrupt files load as empty,
//! and the log is trimmed to `retention_limit` turns on every write.

use chrono::Utc;
use sdk::errors::EngineError;
use sdk::types::Role;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// One stored turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Unix milliseconds
    pub timestamp: i64,
}

impl LocalMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: format!("{}-{}", role, Uuid::new_v4()),
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug)]
pub struct LocalHistory {
    path: PathBuf,
    retention_limit: usize,
    messages: Vec<LocalMessage>,
}

impl LocalHistory {
    /// Load the log at `path`, starting empty if it is missing or unreadable
    pub async fn load(path: impl Into<PathBuf>, retention_limit: usize) -> Self {
        let path = path.into();
        let messages = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Ignoring unreadable local history {}: {}", path.display(), e);
                Vec::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Failed to read local history {}: {}", path.display(), e);
                Vec::new()
            }
        };

        let mut history = Self {
            path,
            retention_limit: retention_limit.max(1),
            messages,
        };
        history.enforce_retention();
        history
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored turns, oldest first
    pub fn messages(&self) -> &[LocalMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> &[LocalMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Append a turn and persist the log
    pub async fn push(&mut self, message: LocalMessage) -> Result<(), EngineError> {
        self.messages.push(message);
        self.enforce_retention();
        self.save().await
    }

    /// Empty the log and delete its file
    pub async fn clear(&mut self) -> Result<(), EngineError> {
        self.messages.clear();
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::Persistence(format!(
                "Failed to delete local history: {}",
                e
            ))),
        }
    }

    async fn save(&self) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                EngineError::Persistence(format!("Failed to create history directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.messages)
            .map_err(|e| EngineError::Persistence(format!("Failed to encode history: {}", e)))?;

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| EngineError::Persistence(format!("Failed to write local history: {}", e)))
    }

    fn enforce_retention(&mut self) {
        if self.messages.len() > self.retention_limit {
            let excess = self.messages.len() - self.retention_limit;
            self.messages.drain(..excess);
        }
    }
}
