//! Configuration management
//!
//! This module handles loading, validation, and management of the Alkulous configuration.
//! Configuration is stored in TOML format at ~/.alkulous/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **server**: Bind address, operator session token, CORS origins
//! - **llm**: Hosted, local-brain and Ollama backends plus call timeouts
//! - **chat**: Context windows, history page size, prompt overrides
//! - **local**: Client-only local variant (Ollama URL, model, history file)
//!
//! # Environment Overrides
//!
//! Applied after the file is parsed and before validation:
//!
//! | Variable | Field |
//! |---|---|
//! | `AI_INTEGRATIONS_OPENAI_API_KEY` | `llm.hosted.api_key` (never written to disk) |
//! | `AI_INTEGRATIONS_OPENAI_BASE_URL` | `llm.hosted.base_url` |
//! | `LOCAL_AI_BRAIN_URL` | `llm.local_brain.base_url` |
//! | `OLLAMA_BASE_URL` | `llm.ollama.base_url` |
//! | `ALKULOUS_BIND_ADDR` | `server.bind_addr` |
//!
//! # Examples
//!
//! ```no_run
//! use alkulous_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//!
//! println!("Data dir: {:?}", config.core.data_dir);
//! println!("Hosted model: {}", config.llm.hosted.model);
//! # Ok(())
//! # }
//! ```

use crate::conductor::prompts;
use crate::secrets::SecretString;
use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const ENV_HOSTED_API_KEY: &str = "AI_INTEGRATIONS_OPENAI_API_KEY";
pub const ENV_HOSTED_BASE_URL: &str = "AI_INTEGRATIONS_OPENAI_BASE_URL";
pub const ENV_LOCAL_BRAIN_URL: &str = "LOCAL_AI_BRAIN_URL";
pub const ENV_OLLAMA_BASE_URL: &str = "OLLAMA_BASE_URL";
pub const ENV_BIND_ADDR: &str = "ALKULOUS_BIND_ADDR";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM backend configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Chat orchestration settings
    #[serde(default)]
    pub chat: ChatConfig,

    /// Client-only local variant
    #[serde(default)]
    pub local: LocalConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Fixed operator session token. Generated at startup when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_token: Option<String>,

    /// Allowed CORS origins. Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// LLM backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default)]
    pub hosted: HostedConfig,

    #[serde(default)]
    pub local_brain: LocalBrainConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Upper bound for one hosted call (seconds)
    #[serde(default = "default_hosted_timeout")]
    pub hosted_timeout_secs: u64,

    /// Upper bound for one local-brain or Ollama call (seconds)
    #[serde(default = "default_local_timeout")]
    pub local_timeout_secs: u64,
}

/// Hosted OpenAI-compatible backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedConfig {
    /// Base URL including the `/v1` suffix
    #[serde(default = "default_hosted_base_url")]
    pub base_url: String,

    #[serde(default = "default_hosted_model")]
    pub model: String,

    // Only ever read from the environment
    #[serde(skip)]
    pub api_key: Option<SecretString>,
}

/// Self-hosted "local brain" server. Disabled unless `base_url` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalBrainConfig {
    /// Server root; `/v1` is appended when calling it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_local_brain_model")]
    pub model: String,
}

/// Alternate local runtime (Ollama). Disabled unless `base_url` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Server root; `/v1` is appended when calling it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// Chat orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Prior turns included for `/api/chat`
    #[serde(default = "default_interactive_window")]
    pub interactive_window: usize,

    /// Prior turns included for `/api/v1/chat`
    #[serde(default = "default_external_window")]
    pub external_window: usize,

    /// Turns returned by the history endpoint
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_system_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_prompt: Option<String>,
}

impl ChatConfig {
    pub fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(prompts::INTERACTIVE_SYSTEM_PROMPT)
    }

    pub fn external_system_prompt(&self) -> &str {
        self.external_system_prompt
            .as_deref()
            .unwrap_or(prompts::EXTERNAL_SYSTEM_PROMPT)
    }

    pub fn identity_prompt(&self) -> &str {
        self.identity_prompt
            .as_deref()
            .unwrap_or(prompts::IDENTITY_PROMPT)
    }
}

/// Client-only local variant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_local_base_url")]
    pub base_url: String,

    #[serde(default = "default_local_model")]
    pub model: String,

    /// Prior turns sent with each message
    #[serde(default = "default_interactive_window")]
    pub context_window: usize,

    /// Turns kept on disk; oldest are dropped first
    #[serde(default = "default_retention_limit")]
    pub retention_limit: usize,

    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Upper bound on one chat call to Ollama
    #[serde(default = "default_local_timeout")]
    pub request_timeout_secs: u64,

    /// JSON history file (supports ~ expansion)
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.alkulous")
}

fn default_bind_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_hosted_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_hosted_model() -> String {
    "gpt-4o".to_string()
}

fn default_local_brain_model() -> String {
    "local-brain".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

fn default_hosted_timeout() -> u64 {
    60
}

fn default_local_timeout() -> u64 {
    120
}

fn default_interactive_window() -> usize {
    10
}

fn default_external_window() -> usize {
    5
}

fn default_history_limit() -> usize {
    50
}

fn default_local_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_local_model() -> String {
    "gemma3:4b".to_string()
}

fn default_retention_limit() -> usize {
    200
}

fn default_probe_interval() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

fn default_history_file() -> PathBuf {
    PathBuf::from("~/.alkulous/local_history.json")
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            operator_token: None,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            hosted: HostedConfig::default(),
            local_brain: LocalBrainConfig::default(),
            ollama: OllamaConfig::default(),
            hosted_timeout_secs: default_hosted_timeout(),
            local_timeout_secs: default_local_timeout(),
        }
    }
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            base_url: default_hosted_base_url(),
            model: default_hosted_model(),
            api_key: None,
        }
    }
}

impl Default for LocalBrainConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: default_local_brain_model(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: default_ollama_model(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            interactive_window: default_interactive_window(),
            external_window: default_external_window(),
            history_limit: default_history_limit(),
            system_prompt: None,
            external_system_prompt: None,
            identity_prompt: None,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_url: default_local_base_url(),
            model: default_local_model(),
            context_window: default_interactive_window(),
            retention_limit: default_retention_limit(),
            probe_interval_secs: default_probe_interval(),
            probe_timeout_secs: default_probe_timeout(),
            request_timeout_secs: default_local_timeout(),
            history_file: default_history_file(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.alkulous/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    /// Environment overrides are applied, then the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails (bad log level, URL scheme, zero window or timeout)
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml_str(&contents)?;

        config.apply_env(|name| std::env::var(name).ok());
        config.validate_and_process()?;

        Ok(config)
    }

    /// Parse a configuration without touching the environment or the filesystem
    pub fn from_toml_str(contents: &str) -> Result<Self, EngineError> {
        toml::from_str(contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default();

        // Written before env overrides so nothing from the environment lands on disk
        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        let mut config = config;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate_and_process()?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.alkulous/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".alkulous").join("config.toml"))
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Blank values are ignored. Taking the lookup as a closure keeps tests
    /// independent of the process environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(key) = get(ENV_HOSTED_API_KEY) {
            self.llm.hosted.api_key = Some(SecretString::from(key));
        }
        if let Some(url) = get(ENV_HOSTED_BASE_URL) {
            self.llm.hosted.base_url = url;
        }
        if let Some(url) = get(ENV_LOCAL_BRAIN_URL) {
            self.llm.local_brain.base_url = Some(url);
        }
        if let Some(url) = get(ENV_OLLAMA_BASE_URL) {
            self.llm.ollama.base_url = Some(url);
        }
        if let Some(addr) = get(ENV_BIND_ADDR) {
            self.server.bind_addr = addr;
        }
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates log level, URLs, windows and timeouts
    /// - Strips trailing slashes from base URLs
    /// - Expands ~ in paths
    /// - Creates the data directory if it doesn't exist
    pub fn validate_and_process(&mut self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if self.llm.hosted.model.trim().is_empty() {
            return Err(EngineError::Config(
                "llm.hosted.model must not be empty".to_string(),
            ));
        }

        self.llm.hosted.base_url = normalize_url("llm.hosted.base_url", &self.llm.hosted.base_url)?;
        if let Some(url) = &self.llm.local_brain.base_url {
            self.llm.local_brain.base_url = Some(normalize_url("llm.local_brain.base_url", url)?);
        }
        if let Some(url) = &self.llm.ollama.base_url {
            self.llm.ollama.base_url = Some(normalize_url("llm.ollama.base_url", url)?);
        }
        self.local.base_url = normalize_url("local.base_url", &self.local.base_url)?;

        if self.llm.hosted_timeout_secs == 0 || self.llm.local_timeout_secs == 0 {
            return Err(EngineError::Config(
                "LLM timeouts must be greater than zero".to_string(),
            ));
        }

        if self.chat.interactive_window == 0
            || self.chat.external_window == 0
            || self.chat.history_limit == 0
        {
            return Err(EngineError::Config(
                "chat windows and history_limit must be greater than zero".to_string(),
            ));
        }

        if self.local.context_window == 0 || self.local.retention_limit == 0 {
            return Err(EngineError::Config(
                "local.context_window and local.retention_limit must be greater than zero"
                    .to_string(),
            ));
        }

        if self.local.probe_interval_secs == 0
            || self.local.probe_timeout_secs == 0
            || self.local.request_timeout_secs == 0
        {
            return Err(EngineError::Config(
                "local probe interval and timeouts must be greater than zero".to_string(),
            ));
        }

        self.server
            .bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| {
                EngineError::Config(format!(
                    "Invalid bind address '{}': {}",
                    self.server.bind_addr, e
                ))
            })?;

        self.core.data_dir = expand_path(&self.core.data_dir)?;
        self.local.history_file = expand_path(&self.local.history_file)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }

    /// SQLite database file inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.core.data_dir.join("alkulous.db")
    }
}

fn normalize_url(field: &str, url: &str) -> Result<String, EngineError> {
    let trimmed = url.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(EngineError::Config(format!(
            "{} must start with http:// or https:// (got '{}')",
            field, url
        )));
    }
    Ok(trimmed.to_string())
}

/// Expand ~ in path to user's home directory
///
/// # Examples
///
/// ```ignore
/// let path = PathBuf::from("~/.alkulous");
/// let expanded = expand_path(&path)?;
/// // expanded is now /home/user/.alkulous (on Unix)
/// ```
pub fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}
