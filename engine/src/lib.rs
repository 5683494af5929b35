//! Alkulous Engine Library
//!
//! This library provides the core functionality of the Alkulous chat engine.
//! It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Secret handling and log scrubbing
pub mod secrets;

/// Database persistence module
pub mod db;

/// Completion backends and the fallback router
pub mod llm;

/// Conductor orchestration module
pub mod conductor;

/// Client-only chat against a local Ollama
pub mod local;

/// HTTP API
pub mod api;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
