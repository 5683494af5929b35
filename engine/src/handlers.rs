//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - chat / history / clear: drive the orchestrator against the local database
//! - keys: manage API keys for external callers
//! - status: report configured providers and their health
//! - local: client-only chat with a local Ollama

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::conductor::{ChatOrchestrator, ChatSettings};
use crate::config::Config;
use crate::db::{ConversationStore, Database};
use crate::llm::{ConnectionStatus, ProviderRouter};
use crate::local::LocalChat;
use sdk::types::ProviderPreference;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

async fn open_database(config: &Config) -> Result<Database> {
    Database::new(&config.database_path())
        .await
        .context("Failed to open database")
}

fn orchestrator(config: &Config, database: &Database) -> ChatOrchestrator {
    let store: Arc<dyn ConversationStore> = Arc::new(database.messages());
    ChatOrchestrator::new(
        store,
        Arc::new(ProviderRouter::from_config(&config.llm)),
        ChatSettings::from(&config.chat),
    )
}

/// Send one message and print the reply
pub async fn handle_chat(
    message: String,
    preference: ProviderPreference,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let database = open_database(config).await?;
    let result = orchestrator(config, &database)
        .send(&message, preference)
        .await;
    database.close().await?;

    let reply = result.context("Chat failed")?;

    match format {
        OutputFormat::Text => println!("{}", reply.text),
        OutputFormat::Json => {
            let output = json!({
                "response": reply.text,
                "backend": reply.backend,
                "degraded": reply.degraded
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Show the last `limit` turns, oldest first
pub async fn handle_history(limit: usize, config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    let turns = orchestrator(config, &database)
        .history(limit)
        .await
        .context("Failed to fetch conversation history")?;
    database.close().await?;

    match format {
        OutputFormat::Text => {
            if turns.is_empty() {
                println!("No messages in history");
                return Ok(());
            }

            for turn in turns {
                println!(
                    "[{}] {:<9} {}",
                    turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    format!("{}:", turn.role),
                    turn.content
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&turns)?);
        }
    }

    Ok(())
}

pub async fn handle_clear(config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    orchestrator(config, &database)
        .clear()
        .await
        .context("Failed to clear conversation")?;
    database.close().await?;

    print_success(format, "Conversation cleared")
}

pub async fn handle_keys_list(config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    let keys = database
        .api_keys()
        .list()
        .await
        .context("Failed to list API keys")?;
    database.close().await?;

    match format {
        OutputFormat::Text => {
            if keys.is_empty() {
                println!("No API keys");
                return Ok(());
            }

            println!("API Keys ({}):", keys.len());
            for key in keys {
                println!(
                    "  {:>4}  {:<20} {}  created {}",
                    key.id,
                    key.name,
                    key.key,
                    key.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&keys)?);
        }
    }

    Ok(())
}

pub async fn handle_keys_create(name: String, config: &Config, format: OutputFormat) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Key name must not be empty");
    }

    let database = open_database(config).await?;
    let key = database
        .api_keys()
        .create(name)
        .await
        .context("Failed to create API key")?;
    database.close().await?;

    match format {
        OutputFormat::Text => {
            println!("Created API key '{}' (id {})", key.name, key.id);
            println!("  {}", key.key);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&key)?);
        }
    }

    Ok(())
}

pub async fn handle_keys_revoke(id: i64, config: &Config, format: OutputFormat) -> Result<()> {
    let database = open_database(config).await?;
    let removed = database
        .api_keys()
        .delete(id)
        .await
        .context("Failed to revoke API key")?;
    database.close().await?;

    if removed {
        print_success(format, &format!("Revoked API key {}", id))
    } else {
        print_success(format, &format!("No API key with id {}", id))
    }
}

/// Report configured providers and whether each one answers a health check
pub async fn handle_status(config: &Config, format: OutputFormat) -> Result<()> {
    let router = ProviderRouter::from_config(&config.llm);
    let health = router.check_health().await;

    match format {
        OutputFormat::Text => {
            println!(
                "Alkulous v{} ({} - {})",
                env!("CARGO_PKG_VERSION"),
                env!("GIT_COMMIT_HASH"),
                env!("BUILD_TIMESTAMP")
            );
            println!();
            println!("  {:<18} {}", "Bind address:", config.server.bind_addr);
            println!(
                "  {:<18} {}",
                "Database:",
                config.database_path().display()
            );
            println!();
            println!("Providers:");
            for (backend, healthy) in &health {
                println!(
                    "  {:<18} {}",
                    format!("{}:", backend.display_name()),
                    if *healthy { "available" } else { "unavailable" }
                );
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "version": env!("CARGO_PKG_VERSION"),
                "commit": env!("GIT_COMMIT_HASH"),
                "bind_addr": config.server.bind_addr,
                "providers": health.iter().map(|(backend, healthy)| {
                    json!({
                        "name": backend,
                        "available": healthy
                    })
                }).collect::<Vec<_>>()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

async fn open_local(config: &Config) -> LocalChat {
    LocalChat::open(&config.local, config.chat.system_prompt()).await
}

pub async fn handle_local_send(
    message: String,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let chat = open_local(config).await;
    let reply = chat.send(&message).await.context("Local chat failed")?;

    match format {
        OutputFormat::Text => println!("{}", reply),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "response": reply }))?);
        }
    }

    Ok(())
}

pub async fn handle_local_history(config: &Config, format: OutputFormat) -> Result<()> {
    let chat = open_local(config).await;
    let messages = chat.history().await;

    match format {
        OutputFormat::Text => {
            if messages.is_empty() {
                println!("No local messages");
                return Ok(());
            }
            for message in messages {
                println!("{:<10} {}", format!("{}:", message.role), message.content);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&messages)?);
        }
    }

    Ok(())
}

pub async fn handle_local_clear(config: &Config, format: OutputFormat) -> Result<()> {
    open_local(config)
        .await
        .clear()
        .await
        .context("Failed to clear local history")?;
    print_success(format, "Local history cleared")
}

/// Probe Ollama once, or keep probing until Ctrl-C when `watch` is set
pub async fn handle_local_probe(watch: bool, config: &Config, format: OutputFormat) -> Result<()> {
    let chat = Arc::new(open_local(config).await);

    if !watch {
        let status = chat.check_connection().await;
        return print_connection(format, &config.local.base_url, &status);
    }

    let mut monitor =
        chat.start_monitor(Duration::from_secs(config.local.probe_interval_secs));
    loop {
        tokio::select! {
            status = monitor.changed() => match status {
                Some(status) => print_connection(format, &config.local.base_url, &status)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    monitor.stop();
    Ok(())
}

fn print_connection(format: OutputFormat, base_url: &str, status: &ConnectionStatus) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if status.reachable {
                println!("✓ Ollama reachable at {}", base_url);
            } else {
                println!(
                    "⚠ Ollama unreachable at {}: {}",
                    base_url,
                    status.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(status)?);
        }
    }
    Ok(())
}

fn print_success(format: OutputFormat, message: &str) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", message),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({ "success": true, "message": message }))?
            );
        }
    }
    Ok(())
}
