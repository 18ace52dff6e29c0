//! Integration tests for configuration management
//!
//! Loads full and partial TOML files from disk and checks validation,
//! defaults and data directory handling.

use reel_engine::config::Config;
use sdk::errors::EngineError;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_config_toml_parsing() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    let body = format!(
        r#"
[core]
log_level = "debug"
data_dir = "{data}"

[llm]
default_provider = "ollama"
timeout_secs = 90

[llm.ollama]
base_url = "http://localhost:11434"
model = "llama3.1:8b"

[llm.openai]
model = "gpt-4o-mini"

[catalog]
base_url = "https://catalog.example"
search_limit = 3
people_limit = 7
review_limit = 4

[encyclopedia]
enabled = false

[index]
enabled = true
collection = "films"
distance_threshold = 0.75

[bot]
history_limit = 8
allowed_users = [1, 2, 3]
recommendation_limit = 3

[agent]
plan_retries = 1
verbose = true
"#,
        data = data_dir.display()
    );
    let path = write_config(&dir, &body);

    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.core.log_level, "debug");
    assert_eq!(config.core.data_dir, data_dir);
    assert!(data_dir.exists());
    assert_eq!(config.llm.default_provider, "ollama");
    assert_eq!(config.llm.timeout_secs, 90);
    assert_eq!(config.catalog.base_url, "https://catalog.example");
    assert_eq!(config.catalog.people_limit, 7);
    assert!(!config.encyclopedia.enabled);
    assert!(config.index.enabled);
    assert_eq!(config.index.collection, "films");
    assert_eq!(config.bot.allowed_users, vec![1, 2, 3]);
    assert_eq!(config.bot.api_base, "https://api.telegram.org");
    assert_eq!(config.agent.plan_retries, 1);
    assert!(config.agent.verbose);
    assert_eq!(config.database_path(), data_dir.join("reel.db"));
}

#[test]
fn test_minimal_config_with_defaults() {
    let dir = TempDir::new().unwrap();
    let body = format!("[core]\ndata_dir = \"{}\"\n", dir.path().join("d").display());
    let config = Config::load_from_path(&write_config(&dir, &body)).unwrap();

    assert_eq!(config.core.log_level, "info");
    assert_eq!(config.llm.default_provider, "openai");
    assert_eq!(config.catalog.search_limit, 5);
    assert_eq!(config.catalog.review_limit, 5);
    assert!(config.encyclopedia.enabled);
    assert!(config.index.enabled);
    assert_eq!(config.index.distance_threshold, 0.9);
    assert_eq!(config.bot.history_limit, 5);
    assert!(config.bot.allowed_users.is_empty());
    assert_eq!(config.agent.plan_retries, 2);
}

#[test]
fn test_invalid_log_level_detection() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[core]\nlog_level = \"loud\"\n");
    assert!(matches!(
        Config::load_from_path(&path),
        Err(EngineError::Config(msg)) if msg.contains("log level")
    ));
}

#[test]
fn test_invalid_provider_detection() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[llm]\ndefault_provider = \"anthropic\"\n");
    assert!(matches!(
        Config::load_from_path(&path),
        Err(EngineError::Config(_))
    ));
}

#[test]
fn test_threshold_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[index]\ndistance_threshold = 2.5\n");
    assert!(Config::load_from_path(&path).is_err());
}

#[test]
fn test_malformed_toml_is_config_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[bot\nhistory_limit = ");
    assert!(matches!(
        Config::load_from_path(&path),
        Err(EngineError::Config(msg)) if msg.contains("parse")
    ));
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    assert!(Config::load_from_path(&dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    config.core.data_dir = dir.path().join("data");
    config.bot.allowed_users = vec![99];
    config.save(&path).unwrap();

    let loaded = Config::load_from_path(&path).unwrap();
    assert_eq!(loaded.bot.allowed_users, vec![99]);
    assert_eq!(loaded.core.data_dir, dir.path().join("data"));
}

#[test]
fn test_http_timeouts_default_and_validate() {
    let dir = TempDir::new().unwrap();
    let body = format!("[core]\ndata_dir = \"{}\"\n", dir.path().join("d").display());
    let config = Config::load_from_path(&write_config(&dir, &body)).unwrap();
    assert_eq!(config.encyclopedia.timeout_secs, 30);
    assert_eq!(config.index.timeout_secs, 30);

    let path = write_config(&dir, "[encyclopedia]\ntimeout_secs = 0\n");
    assert!(matches!(
        Config::load_from_path(&path),
        Err(EngineError::Config(msg)) if msg.contains("timeouts")
    ));
}
