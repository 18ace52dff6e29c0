//! Command handlers for CLI operations
//!
//! Each handler builds the [`Services`] it needs from the loaded config and
//! prints either human-readable text or pretty JSON.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use crate::agent::Agent;
use crate::bot::{DialogueService, TelegramBot};
use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::db::Database;
use crate::encyclopedia::EncyclopediaClient;
use crate::index::{populate::populate_top250, ChromaIndex, VectorIndex, META_MOVIE_DATA, META_MOVIE_NAME};
use crate::llm::ollama::OllamaProvider;
use crate::llm::openai::{OpenAIEmbeddings, OpenAIProvider};
use crate::llm::router::LLMRouter;
use crate::llm::LLMProvider;
use crate::recommend::{Delivery, Notifier, RecommendationTask};
use crate::secrets::{
    SecretCache, SecretManager, SecretString, CATALOG_API_KEY, KNOWN_SECRETS, OPENAI_API_KEY,
    SERVICE_NAME, TELEGRAM_TOKEN,
};
use crate::tools::{ToolDeps, ToolRegistry};
use sdk::errors::{EngineError, ReelErrorExt};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Everything the pipeline, the bot and the recommender share
pub struct Services {
    pub config: Config,
    pub secrets: Arc<SecretManager>,
    pub db: Arc<Database>,
    pub router: Arc<LLMRouter>,
    pub catalog: Arc<CatalogClient>,
    pub index: Option<Arc<dyn VectorIndex>>,
    pub agent: Arc<Agent>,
    pub dialogue: Arc<DialogueService>,
    pub recommender: Arc<RecommendationTask>,
}

impl Services {
    pub async fn build(config: &Config) -> Result<Self> {
        let secrets = Arc::new(SecretManager::new(SERVICE_NAME));
        let cache = Arc::new(SecretCache::new(Arc::clone(&secrets)));

        let db = Arc::new(
            Database::new(&config.database_path())
                .await
                .context("Failed to open database")?,
        );

        let mut providers: Vec<Box<dyn LLMProvider>> = Vec::new();
        if secrets.has_secret(OPENAI_API_KEY) {
            providers.push(Box::new(OpenAIProvider::new(
                config.llm.openai.clone(),
                Arc::clone(&cache),
            )));
        }
        // Ollama needs no key, so there is always at least one provider
        providers.push(Box::new(OllamaProvider::new(
            config.llm.ollama.base_url.clone(),
            config.llm.ollama.model.clone(),
        )));
        let router = Arc::new(LLMRouter::new(providers, Arc::new(config.llm.clone())));

        let catalog = Arc::new(CatalogClient::new(&config.catalog, Arc::clone(&cache)));

        let encyclopedia = config
            .encyclopedia
            .enabled
            .then(|| Arc::new(EncyclopediaClient::new(&config.encyclopedia)));

        let index: Option<Arc<dyn VectorIndex>> = if !config.index.enabled {
            None
        } else if !secrets.has_secret(OPENAI_API_KEY) {
            tracing::warn!("Vector index is enabled but no OpenAI key is stored for embeddings; semantic search disabled");
            None
        } else {
            Some(Arc::new(ChromaIndex::new(
                &config.index,
                OpenAIEmbeddings::new(&config.llm.openai, Arc::clone(&cache)),
            )))
        };

        let registry = Arc::new(ToolRegistry::standard(ToolDeps {
            router: Arc::clone(&router),
            catalog: Arc::clone(&catalog),
            preferences: db.preferences(),
            encyclopedia,
            index: index.clone(),
            review_limit: config.catalog.review_limit,
            distance_threshold: config.index.distance_threshold,
        }));
        tracing::info!("{} tools registered", registry.len());

        let agent = Arc::new(
            Agent::new(Arc::clone(&router), registry, config.agent.plan_retries)
                .verbose(config.agent.verbose),
        );
        let dialogue = Arc::new(DialogueService::new(
            Arc::clone(&db),
            Arc::clone(&agent),
            config.bot.history_limit,
        ));
        let recommender = Arc::new(RecommendationTask::new(
            Arc::clone(&router),
            Arc::clone(&catalog),
            db.users(),
            db.preferences(),
            config.bot.recommendation_limit,
        ));

        Ok(Self {
            config: config.clone(),
            secrets,
            db,
            router,
            catalog,
            index,
            agent,
            dialogue,
            recommender,
        })
    }
}

/// Prints recommendations instead of sending them
struct StdoutNotifier {
    format: OutputFormat,
}

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), EngineError> {
        match self.format {
            OutputFormat::Text => println!("--- chat {} ---\n{}\n", chat_id, text),
            OutputFormat::Json => {
                let line = json!({"chat_id": chat_id, "text": text});
                println!("{}", line);
            }
        }
        Ok(())
    }
}

/// Run the Telegram bot until the process is stopped
pub async fn handle_bot(config: &Config) -> Result<()> {
    let services = Services::build(config).await?;
    let token = services
        .secrets
        .get_secret(TELEGRAM_TOKEN)
        .map_err(|e| anyhow::anyhow!("{}. {}", e, e.user_hint()))?;

    let bot = TelegramBot::new(
        &config.bot,
        SecretString::new(token),
        Arc::clone(&services.dialogue),
    )
    .with_recommender(Arc::clone(&services.recommender));

    println!("Reel bot is running. Press Ctrl+C to stop.");
    tokio::select! {
        result = bot.start_polling() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            services.db.flush_wal().await.ok();
            Ok(())
        }
    }
}

/// Ask one question through the full pipeline
pub async fn handle_ask(question: String, chat_id: i64, config: &Config, format: OutputFormat) -> Result<()> {
    let services = Services::build(config).await?;

    match services.dialogue.answer(chat_id, "Terminal", &question).await {
        Ok(answer) => {
            match format {
                OutputFormat::Text => println!("{}", answer),
                OutputFormat::Json => print_json(&json!({
                    "status": "completed",
                    "chat_id": chat_id,
                    "question": question,
                    "answer": answer
                }))?,
            }
            Ok(())
        }
        Err(e) => {
            if let OutputFormat::Json = format {
                print_json(&json!({
                    "status": "failed",
                    "error": e.to_string(),
                    "hint": e.user_hint()
                }))?;
            } else {
                println!("✗ {}", e.user_hint());
            }
            Err(e.into())
        }
    }
}

/// Show the last `limit` stored messages of a chat
pub async fn handle_history(chat_id: i64, limit: usize, config: &Config, format: OutputFormat) -> Result<()> {
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;

    let Some(user) = database.users().get_by_chat_id(chat_id).await? else {
        match format {
            OutputFormat::Text => println!("No conversation for chat {}", chat_id),
            OutputFormat::Json => print_json(&json!({"chat_id": chat_id, "messages": [], "count": 0}))?,
        }
        return Ok(());
    };

    let messages = database
        .messages()
        .recent_for_user(user.id, limit)
        .await
        .context("Failed to fetch message history")?;

    match format {
        OutputFormat::Text => {
            if messages.is_empty() {
                println!("No messages for {}", user.full_name);
                return Ok(());
            }
            println!("Conversation with {} (last {} messages):", user.full_name, limit);
            println!();
            for message in &messages {
                println!("[{}] {}:", format_timestamp(message.created_at), message.kind);
                println!("  {}", message.content.replace('\n', "\n  "));
                println!();
            }
        }
        OutputFormat::Json => print_json(&json!({
            "chat_id": chat_id,
            "messages": messages,
            "count": messages.len(),
            "limit": limit
        }))?,
    }

    Ok(())
}

/// List the preferences remembered for a chat
pub async fn handle_preferences(chat_id: i64, config: &Config, format: OutputFormat) -> Result<()> {
    let database = Database::new(&config.database_path())
        .await
        .context("Failed to open database")?;

    let preferences = match database.users().get_by_chat_id(chat_id).await? {
        Some(user) => database.preferences().list_for_user(user.id).await?,
        None => Vec::new(),
    };

    match format {
        OutputFormat::Text => {
            if preferences.is_empty() {
                println!("No preferences stored for chat {}", chat_id);
            }
            for preference in &preferences {
                let id = preference
                    .catalog_id
                    .map(|id| format!(" (catalog id {})", id))
                    .unwrap_or_default();
                println!("  - {}{}", preference.sentence(), id);
            }
        }
        OutputFormat::Json => print_json(&json!({
            "chat_id": chat_id,
            "preferences": preferences,
            "count": preferences.len()
        }))?,
    }

    Ok(())
}

/// Run the recommendation task and print what would be sent
pub async fn handle_recommend(chat_id: Option<i64>, config: &Config, format: OutputFormat) -> Result<()> {
    let services = Services::build(config).await?;
    let notifier = StdoutNotifier { format };

    match chat_id {
        Some(chat_id) => {
            let outcome = services.recommender.run_for_chat(&notifier, chat_id).await?;
            if let OutputFormat::Text = format {
                match outcome {
                    Delivery::Sent => {}
                    Delivery::Nothing => println!("Nothing new to recommend to chat {}", chat_id),
                    Delivery::UnknownChat => println!("No active user for chat {}", chat_id),
                }
            }
        }
        None => {
            let sent = services.recommender.run(&notifier).await?;
            if let OutputFormat::Text = format {
                println!("{} recommendation(s) prepared", sent);
            }
        }
    }
    Ok(())
}

/// Fill the vector index from the catalog's top-250 list
pub async fn handle_index_populate(limit: usize, config: &Config, format: OutputFormat) -> Result<()> {
    let services = Services::build(config).await?;
    let index = services
        .index
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Vector index is disabled. Set [index] enabled = true and store an OpenAI key."))?;

    let added = populate_top250(&services.catalog, index.as_ref(), limit).await?;
    match format {
        OutputFormat::Text => println!("✓ Added {} movies to '{}'", added, config.index.collection),
        OutputFormat::Json => print_json(&json!({
            "collection": config.index.collection,
            "added": added
        }))?,
    }
    Ok(())
}

/// Print the nearest index entry for a description
pub async fn handle_index_query(text: String, config: &Config, format: OutputFormat) -> Result<()> {
    let services = Services::build(config).await?;
    let index = services
        .index
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Vector index is disabled"))?;

    let hit = index.query(&text, 1).await?.into_iter().next();
    let threshold = config.index.distance_threshold;

    match format {
        OutputFormat::Text => match hit {
            Some(hit) => {
                let name = hit.metadata.get(META_MOVIE_NAME).map(String::as_str).unwrap_or("?");
                let verdict = if hit.distance <= threshold { "match" } else { "too far" };
                println!("{} (distance {:.3}, {})", name, hit.distance, verdict);
                if let Some(card) = hit.metadata.get(META_MOVIE_DATA) {
                    println!();
                    println!("{}", card);
                }
            }
            None => println!("Index is empty"),
        },
        OutputFormat::Json => print_json(&json!({
            "query": text,
            "threshold": threshold,
            "hit": hit.map(|h| json!({"distance": h.distance, "metadata": h.metadata}))
        }))?,
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Interactive setup: store secrets in the keychain and write the config
pub async fn handle_setup(config_path: Option<&Path>) -> Result<()> {
    println!("Reel setup");
    println!();

    let secret_manager = SecretManager::new(SERVICE_NAME);

    println!("Configure API keys (press Enter to keep the current value):");
    for (key, label) in [
        (OPENAI_API_KEY, "  OpenAI API key: "),
        (CATALOG_API_KEY, "  Movie catalog API key: "),
        (TELEGRAM_TOKEN, "  Telegram bot token: "),
    ] {
        let value = prompt(label)?;
        if !value.is_empty() {
            secret_manager
                .set_secret(key, &value)
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("    Stored in keychain.");
        }
    }

    let mut config = Config::default();
    println!();
    let provider = prompt("Default LLM provider (openai/ollama) [openai]: ")?;
    if !provider.is_empty() {
        config.llm.default_provider = provider;
    }
    let users = prompt("Telegram user ids allowed to chat, comma separated (empty = everyone): ")?;
    config.bot.allowed_users = users
        .split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect();
    config.validate()?;

    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_config_path()?,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    config.save(&path)?;
    println!();
    println!("Configuration written to {}", path.display());

    let config = Config::load_from_path(&path)?;
    let db_path = config.database_path();
    if !db_path.exists() {
        Database::new(&db_path).await?.close().await?;
        println!("Database created at {}", db_path.display());
    }

    println!();
    println!("Setup complete! Run 'reel doctor' to verify your configuration.");
    Ok(())
}

/// Run system diagnostics
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(String, String)> = Vec::new();

    checks.push(("Configuration".into(), "Valid".into()));

    let db_path = config.database_path();
    match Database::new(&db_path).await {
        Ok(db) => {
            let users = db.users().list_active().await.map(|u| u.len()).unwrap_or(0);
            checks.push(("Database".into(), format!("OK ({} active users)", users)));
        }
        Err(e) => {
            checks.push(("Database".into(), "Failed".into()));
            issues.push(format!("Cannot open database at {}: {:#}", db_path.display(), e));
        }
    }

    let secrets = SecretManager::new(SERVICE_NAME);
    for key in KNOWN_SECRETS {
        if secrets.has_secret(key) {
            checks.push((key.to_string(), "Configured".into()));
        } else {
            checks.push((key.to_string(), "Missing".into()));
            issues.push(format!("Secret '{}' is not set. Run 'reel setup'.", key));
        }
    }

    let services = Services::build(config).await;
    match &services {
        Ok(services) => {
            for (name, healthy) in services.router.check_health().await {
                let state = if healthy { "Available" } else { "Not available" };
                checks.push((format!("LLM {}", name), state.into()));
                if !healthy && name == config.llm.default_provider {
                    issues.push(format!("Default provider '{}' is not reachable", name));
                }
            }
            let index_state = match (config.index.enabled, services.index.is_some()) {
                (false, _) => "Disabled",
                (true, true) => "Enabled",
                (true, false) => "Enabled but unusable",
            };
            checks.push(("Vector index".into(), index_state.into()));
        }
        Err(e) => issues.push(format!("Cannot build services: {:#}", e)),
    }

    checks.push((
        "Encyclopedia".into(),
        if config.encyclopedia.enabled { "Enabled" } else { "Disabled" }.into(),
    ));

    match format {
        OutputFormat::Text => {
            println!("Reel diagnostics");
            println!();
            for (name, state) in &checks {
                println!("  {:<24} {}", name, state);
            }
            println!();
            if issues.is_empty() {
                println!("✓ No issues found");
            } else {
                println!("Issues:");
                for issue in &issues {
                    println!("  - {}", issue);
                }
            }
        }
        OutputFormat::Json => print_json(&json!({
            "checks": checks
                .iter()
                .map(|(name, state)| json!({"name": name, "status": state}))
                .collect::<Vec<_>>(),
            "issues": issues,
            "healthy": issues.is_empty()
        }))?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
    }

    #[tokio::test]
    async fn test_stdout_notifier_never_fails() {
        let notifier = StdoutNotifier {
            format: OutputFormat::Json,
        };
        assert!(notifier.notify(1, "Watch Alien").await.is_ok());
    }
}
