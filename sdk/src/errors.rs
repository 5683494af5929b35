//! Error types and handling
//!
//! This module provides the error types used throughout the Alkulous engine.
//! All errors implement the `AlkulousErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error messages never include API keys or session tokens. Provider causes
//! may contain upstream response bodies, so HTTP handlers surface the hint
//! rather than the raw message for provider failures.

use thiserror::Error;

/// Trait for Alkulous error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait AlkulousErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain secrets
    /// or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors typically require manual intervention.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Validation**: empty or malformed input, rejected before any side effect
/// - **Persistence**: the conversation store is unavailable; fatal to the request
/// - **Provider**: no completion backend could answer and no fallback remained
/// - **Auth**: missing or invalid session / API key
/// - **Configuration**: invalid or missing configuration
///
/// # Examples
///
/// ```
/// use sdk::errors::{AlkulousErrorExt, EngineError};
///
/// let error = EngineError::Validation("Message cannot be empty".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal = EngineError::Persistence("database is locked".to_string());
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Input errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Storage errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    // Completion backend errors
    #[error("Provider {backend} unavailable: {cause}")]
    ProviderUnavailable { backend: String, cause: String },

    // Auth errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn provider_unavailable(backend: impl Into<String>, cause: impl ToString) -> Self {
        Self::ProviderUnavailable {
            backend: backend.into(),
            cause: cause.to_string(),
        }
    }
}

impl AlkulousErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Validation(_) => "Check the request and try again",
            Self::Persistence(_) => "Conversation storage is unavailable. Try again later",
            Self::ProviderUnavailable { .. } => {
                "AI provider unavailable. Check provider configuration and network"
            }
            Self::Unauthorized(_) => "Authentication required",
            Self::NotFound(_) => "The requested resource does not exist",
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // A non-durable chat turn cannot be papered over
            Self::Persistence(_) | Self::Config(_) => false,

            _ => true,
        }
    }
}
