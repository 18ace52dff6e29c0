//! Configuration management
//!
//! This module handles loading, validation, and management of the Reel configuration.
//! Configuration is stored in TOML format at ~/.reel/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **llm**: LLM provider settings and request timeout
//! - **catalog**: Movie catalog API endpoint and result limits
//! - **encyclopedia**: Person lookup through the encyclopedia
//! - **index**: Vector index used for plot-based search
//! - **bot**: Chat front end behaviour
//! - **agent**: Planner retry budget and verbosity
//!
//! API keys never live in this file. They are resolved by
//! [`crate::secrets::SecretManager`] from the environment or the OS keychain.
//!
//! # Examples
//!
//! ```no_run
//! use reel_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Default provider: {}", config.llm.default_provider);
//! println!("History window: {}", config.bot.history_limit);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LLMConfig,

    /// Movie catalog API configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Encyclopedia lookup configuration
    #[serde(default)]
    pub encyclopedia: EncyclopediaConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Chat bot configuration
    #[serde(default)]
    pub bot: BotConfig,

    /// Planner/executor configuration
    #[serde(default)]
    pub agent: AgentConfig,
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

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Default LLM provider (openai, ollama)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Per-provider request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// OpenAI-compatible provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for the chat completions API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Chat model name
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Embedding model used by the vector index
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    // Note: API key stored in OS keychain or environment, not in config
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// Movie catalog API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// API root, without the version segment
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,

    /// Result limit for filtered movie searches
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,

    /// Result limit for person searches
    #[serde(default = "default_people_limit")]
    pub people_limit: u32,

    /// Number of top reviews passed to the summariser
    #[serde(default = "default_review_limit")]
    pub review_limit: usize,

    /// HTTP timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

/// Encyclopedia configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncyclopediaConfig {
    /// Use the encyclopedia for name-based person lookups
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// MediaWiki API endpoint
    #[serde(default = "default_encyclopedia_base_url")]
    pub base_url: String,

    /// HTTP timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Register the semantic search tool
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Index server URL
    #[serde(default = "default_index_base_url")]
    pub base_url: String,

    /// Collection holding movie descriptions
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Nearest hits farther than this are treated as "not found"
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f64,

    /// HTTP timeout in seconds, embedding calls included
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

/// Chat bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram Bot API root
    #[serde(default = "default_bot_api_base")]
    pub api_base: String,

    /// Number of most recent messages used to build conversation state
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Telegram user ids allowed to talk to the bot (empty = everyone)
    #[serde(default)]
    pub allowed_users: Vec<i64>,

    /// Movies per recommendation message
    #[serde(default = "default_recommendation_limit")]
    pub recommendation_limit: usize,
}

/// Planner/executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Clarification rounds after a malformed plan
    #[serde(default = "default_plan_retries")]
    pub plan_retries: u32,

    /// Log prompts and intermediate fragments at debug level
    #[serde(default)]
    pub verbose: bool,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.reel")
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_catalog_base_url() -> String {
    "https://api.kinopoisk.dev".to_string()
}

fn default_search_limit() -> u32 {
    5
}

fn default_people_limit() -> u32 {
    10
}

fn default_review_limit() -> usize {
    5
}

fn default_http_timeout() -> u64 {
    30
}

fn default_encyclopedia_base_url() -> String {
    "https://ru.wikipedia.org/w/api.php".to_string()
}

fn default_index_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_collection() -> String {
    "movies".to_string()
}

fn default_distance_threshold() -> f64 {
    0.9
}

fn default_bot_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_history_limit() -> usize {
    5
}

fn default_recommendation_limit() -> usize {
    5
}

fn default_plan_retries() -> u32 {
    2
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            timeout_secs: default_llm_timeout(),
            openai: OpenAIConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            embedding_model: default_embedding_model(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            search_limit: default_search_limit(),
            people_limit: default_people_limit(),
            review_limit: default_review_limit(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for EncyclopediaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_encyclopedia_base_url(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_index_base_url(),
            collection: default_collection(),
            distance_threshold: default_distance_threshold(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_base: default_bot_api_base(),
            history_limit: default_history_limit(),
            allowed_users: Vec::new(),
            recommendation_limit: default_recommendation_limit(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            plan_retries: default_plan_retries(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.reel/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    /// Validates the configuration after loading and returns descriptive errors
    /// if validation fails.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails (out-of-range values, unknown provider)
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml_str(&contents)?;
        config.validate_and_process()?;

        Ok(config)
    }

    /// Parse configuration from TOML text without touching the filesystem
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
        config.save(path)?;

        let mut processed = config;
        processed.validate_and_process()?;
        Ok(processed)
    }

    /// Serialize this configuration to `path` as pretty TOML
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))
    }

    /// Get the default configuration file path (~/.reel/config.toml)
    pub fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".reel").join("config.toml"))
    }

    /// Path of the SQLite database inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.core.data_dir.join("reel.db")
    }

    /// Check value ranges without touching the filesystem
    pub fn validate(&self) -> Result<(), EngineError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_providers = ["openai", "ollama"];
        if !valid_providers.contains(&self.llm.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                valid_providers.join(", ")
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(EngineError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.index.distance_threshold) {
            return Err(EngineError::Config(
                "index.distance_threshold must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.bot.history_limit == 0 {
            return Err(EngineError::Config(
                "bot.history_limit must be at least 1".to_string(),
            ));
        }

        if self.catalog.timeout_secs == 0
            || self.encyclopedia.timeout_secs == 0
            || self.index.timeout_secs == 0
        {
            return Err(EngineError::Config(
                "HTTP timeouts must be greater than 0".to_string(),
            ));
        }

        if self.catalog.search_limit == 0 || self.catalog.people_limit == 0 {
            return Err(EngineError::Config(
                "catalog limits must be at least 1".to_string(),
            ));
        }

        if self.bot.recommendation_limit == 0 {
            return Err(EngineError::Config(
                "bot.recommendation_limit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate and process configuration
    ///
    /// Runs [`Config::validate`], expands `~` in the data directory and
    /// creates it if missing.
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        self.validate()?;

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
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
