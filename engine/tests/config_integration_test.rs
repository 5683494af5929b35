//! Integration tests for configuration loading
//!
//! Loads TOML files from disk, applies overrides and checks validation.

use alkulous_engine::config::Config;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_load_full_config_from_file() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let path = write_config(
        &dir,
        &format!(
            r#"
[core]
log_level = "debug"
data_dir = '{}'

[server]
bind_addr = "0.0.0.0:8080"
operator_token = "operator-secret"
cors_origins = ["http://localhost:3000"]

[llm]
hosted_timeout_secs = 30

[llm.hosted]
model = "gpt-4o-mini"

[llm.local_brain]
base_url = "http://brain.lan:8000/"

[chat]
interactive_window = 6
external_window = 3

[local]
model = "llama3.2"
"#,
            data_dir.display()
        ),
    );

    let config = Config::load_from_path(&path).unwrap();

    assert_eq!(config.core.log_level, "debug");
    assert!(data_dir.exists(), "data directory is created on load");
    assert_eq!(config.database_path(), data_dir.join("alkulous.db"));
    assert_eq!(config.server.operator_token.as_deref(), Some("operator-secret"));
    assert_eq!(config.server.cors_origins, vec!["http://localhost:3000"]);
    assert_eq!(config.llm.hosted.model, "gpt-4o-mini");
    assert_eq!(config.llm.hosted_timeout_secs, 30);
    assert_eq!(config.llm.local_timeout_secs, 120);
    assert_eq!(
        config.llm.local_brain.base_url.as_deref(),
        Some("http://brain.lan:8000")
    );
    assert_eq!(config.chat.interactive_window, 6);
    assert_eq!(config.chat.external_window, 3);
    assert_eq!(config.chat.history_limit, 50);
    assert_eq!(config.local.model, "llama3.2");
    assert_eq!(config.local.base_url, "http://localhost:11434");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!(
            "[core]\ndata_dir = '{}'\n",
            dir.path().join("data").display()
        ),
    );

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.chat.interactive_window, 10);
    assert_eq!(config.chat.external_window, 5);
    assert!(config.chat.system_prompt().contains("IDENTITY & PERSONALITY PROTOCOL"));
}

#[test]
fn test_invalid_configs_are_rejected() {
    let dir = TempDir::new().unwrap();
    let core = format!("[core]\ndata_dir = '{}'\n", dir.path().join("data").display());

    let cases = [
        format!("{}log_level = \"loud\"\n", core),
        format!("{}[llm.hosted]\nmodel = \"\"\n", core),
        format!("{}[llm.ollama]\nbase_url = \"localhost:11434\"\n", core),
        format!("{}[chat]\ninteractive_window = 0\n", core),
        format!("{}[server]\nbind_addr = \"not an address\"\n", core),
        format!("{}[llm]\nlocal_timeout_secs = 0\n", core),
    ];

    for body in cases {
        let path = write_config(&dir, &body);
        assert!(
            Config::load_from_path(&path).is_err(),
            "expected rejection for: {}",
            body
        );
    }
}

#[test]
fn test_unparseable_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "this is = = not toml");

    let err = Config::load_from_path(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config"));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let err = Config::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_env_overrides_layer_on_file_values() {
    let mut config = Config::from_toml_str(
        r#"
[llm.hosted]
base_url = "https://api.openai.com/v1"

[llm.ollama]
base_url = "http://ollama.lan:11434"
"#,
    )
    .unwrap();

    config.apply_env(|name| match name {
        "AI_INTEGRATIONS_OPENAI_BASE_URL" => Some("https://proxy.example.com/v1/".to_string()),
        "AI_INTEGRATIONS_OPENAI_API_KEY" => Some("sk-from-env".to_string()),
        "OLLAMA_BASE_URL" => Some("   ".to_string()),
        _ => None,
    });

    assert_eq!(config.llm.hosted.base_url, "https://proxy.example.com/v1/");
    assert_eq!(
        config.llm.hosted.api_key.as_ref().map(|k| k.unsecure()),
        Some("sk-from-env")
    );
    // Blank values leave the file setting alone
    assert_eq!(
        config.llm.ollama.base_url.as_deref(),
        Some("http://ollama.lan:11434")
    );
}

#[test]
fn test_api_key_never_serialized() {
    let mut config = Config::default();
    config.apply_env(|name| {
        (name == "AI_INTEGRATIONS_OPENAI_API_KEY").then(|| "sk-should-not-leak".to_string())
    });

    let serialized = toml::to_string_pretty(&config).unwrap();
    assert!(!serialized.contains("sk-should-not-leak"));
}
