//! Conversation and HTTP wire types
//!
//! These types are shared between the engine and any client talking to the
//! chat HTTP API. Field names follow the JSON contract of the web client
//! (`useOllama`, `createdAt`, ...), hence the serde renames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a conversational turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Operator or API caller
    User,

    /// Model reply
    Assistant,

    /// Persona / protocol instructions
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// One persisted conversational turn
///
/// `id` and `timestamp` are assigned by the conversation store. Turns are
/// immutable once written and ordered by `timestamp`, then `id`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub id: i64,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Chat completion backends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Remote hosted completion API
    Hosted,

    /// Privately hosted OpenAI-compatible model
    LocalBrain,

    /// Alternate local runtime (Ollama)
    Ollama,
}

impl Backend {
    /// Stable identifier used in logs and status output
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Hosted => "hosted",
            Backend::LocalBrain => "local_brain",
            Backend::Ollama => "ollama",
        }
    }

    /// Human-facing provider name
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Hosted => "Hosted AI",
            Backend::LocalBrain => "Local AI Brain",
            Backend::Ollama => "Ollama",
        }
    }

    pub fn is_local(&self) -> bool {
        !matches!(self, Backend::Hosted)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which non-default backend the caller would like for one request
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPreference {
    #[default]
    None,
    LocalBrain,
    AlternateLocal,
}

impl ProviderPreference {
    /// Derive the preference from the web client's two flags.
    ///
    /// When both flags are set the local brain wins.
    pub fn from_flags(use_local_brain: bool, use_ollama: bool) -> Self {
        if use_local_brain {
            ProviderPreference::LocalBrain
        } else if use_ollama {
            ProviderPreference::AlternateLocal
        } else {
            ProviderPreference::None
        }
    }
}

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_ollama: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_local_brain: Option<bool>,
}

impl ChatRequest {
    pub fn preference(&self) -> ProviderPreference {
        ProviderPreference::from_flags(
            self.use_local_brain.unwrap_or(false),
            self.use_ollama.unwrap_or(false),
        )
    }
}

/// Reply of `POST /api/chat` and of the external API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}

/// Body of the external API chat endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalChatRequest {
    pub message: String,
}

/// Body of the public `/alkulous/sys/ai/01` endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicPromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Reply of the public `/alkulous/sys/ai/01` endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicPromptResponse {
    pub system: String,
    pub reply: String,
}

/// `{ "success": true }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Credential for callers of the external chat API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /api/admin/keys`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
}

/// Reply of `GET /api/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub providers: Vec<Backend>,
}
