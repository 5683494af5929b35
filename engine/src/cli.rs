//! CLI interface for Alkulous
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for running the chat server and
//! talking to it from a terminal.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Alkulous chat orchestration engine
///
/// Serves the ALKLOUS.SYS.AI.01 chat API: persists the conversation, builds
/// context for each message, and routes it to the hosted model or a local one.
#[derive(Parser, Debug)]
#[command(name = "alkulous")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API server
    Serve,

    /// Send one message through the orchestrator
    Chat {
        /// The message to send
        message: String,

        /// Route to the local AI brain (no fallback)
        #[arg(long)]
        local_brain: bool,

        /// Route to Ollama, falling back to the hosted model once
        #[arg(long, conflicts_with = "local_brain")]
        ollama: bool,
    },

    /// Show the stored conversation
    History {
        /// Number of turns to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Delete the stored conversation
    Clear,

    /// Manage API keys for external callers
    Keys {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Show configured providers and their health
    Status,

    /// Client-only chat against a local Ollama
    Local {
        #[command(subcommand)]
        action: LocalAction,
    },
}

/// API key management actions
#[derive(Subcommand, Debug)]
pub enum KeyAction {
    /// List all keys, newest first
    List,

    /// Create a new key
    Create {
        /// Label recorded with messages sent using this key
        name: String,
    },

    /// Revoke a key
    Revoke {
        /// Key id
        id: i64,
    },
}

/// Local variant actions
#[derive(Subcommand, Debug)]
pub enum LocalAction {
    /// Send one message to the local model
    Send {
        /// The message to send
        message: String,
    },

    /// Show the local history file
    History,

    /// Delete the local history file
    Clear,

    /// Check whether Ollama is reachable
    Probe {
        /// Keep probing on the configured interval until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_chat_flags() {
        let cli = Cli::try_parse_from(["alkulous", "chat", "hello", "--ollama"]).unwrap();
        match cli.command {
            Command::Chat {
                message,
                local_brain,
                ollama,
            } => {
                assert_eq!(message, "hello");
                assert!(!local_brain);
                assert!(ollama);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(
            Cli::try_parse_from(["alkulous", "chat", "hi", "--ollama", "--local-brain"]).is_err()
        );
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from([
            "alkulous",
            "--json",
            "--config",
            "/tmp/alkulous.toml",
            "keys",
            "revoke",
            "3",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/alkulous.toml")));
        assert!(matches!(
            cli.command,
            Command::Keys {
                action: KeyAction::Revoke { id: 3 }
            }
        ));
    }
}
