//! Alkulous SDK
//!
//! Shared library providing the wire types and error taxonomy for Alkulous
//! components. This crate is used by the engine and by external clients of
//! the chat HTTP API.

/// Error types and handling
pub mod errors;

/// Conversation and HTTP wire types
pub mod types;

// Re-export commonly used types
pub use errors::{AlkulousErrorExt, EngineError};
pub use types::{
    ApiKey, Backend, ChatRequest, ChatResponse, ChatTurn, CreateApiKeyRequest,
    ExternalChatRequest, ProviderPreference, PublicPromptRequest, PublicPromptResponse, Role,
    StatusResponse, SuccessResponse,
};
