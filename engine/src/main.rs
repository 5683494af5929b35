// Alkulous chat orchestration engine
// Main entry point for the alkulous binary

use alkulous_engine::cli::{Cli, Command, KeyAction, LocalAction};
use alkulous_engine::config::Config;
use alkulous_engine::handlers::{
    handle_chat, handle_clear, handle_history, handle_keys_create, handle_keys_list,
    handle_keys_revoke, handle_local_clear, handle_local_history, handle_local_probe,
    handle_local_send, handle_status, OutputFormat,
};
use alkulous_engine::telemetry::init_telemetry_with_level;
use clap::Parser;
use sdk::types::ProviderPreference;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config level; RUST_LOG wins over both
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    tracing::info!(
        "Alkulous Engine v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Serve => {
            tracing::info!("Starting API server...");
            alkulous_engine::api::serve(&config).await
        }

        Command::Chat {
            message,
            local_brain,
            ollama,
        } => {
            let preference = ProviderPreference::from_flags(local_brain, ollama);
            tracing::debug!(?preference, "Sending chat message");
            handle_chat(message, preference, &config, format).await
        }

        Command::History { limit } => handle_history(limit, &config, format).await,

        Command::Clear => handle_clear(&config, format).await,

        Command::Keys { action } => match action {
            KeyAction::List => handle_keys_list(&config, format).await,
            KeyAction::Create { name } => handle_keys_create(name, &config, format).await,
            KeyAction::Revoke { id } => handle_keys_revoke(id, &config, format).await,
        },

        Command::Status => handle_status(&config, format).await,

        Command::Local { action } => match action {
            LocalAction::Send { message } => handle_local_send(message, &config, format).await,
            LocalAction::History => handle_local_history(&config, format).await,
            LocalAction::Clear => handle_local_clear(&config, format).await,
            LocalAction::Probe { watch } => handle_local_probe(watch, &config, format).await,
        },
    }
}
