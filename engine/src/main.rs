// Reel conversational movie assistant
// Main entry point for the reel binary

use clap::Parser;
use reel_engine::cli::{Cli, Command, IndexAction};
use reel_engine::config::Config;
use reel_engine::handlers::{
    handle_ask, handle_bot, handle_doctor, handle_history, handle_index_populate,
    handle_index_query, handle_preferences, handle_recommend, handle_setup, OutputFormat,
};
use reel_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup runs before any config exists
    if let Command::Setup = cli.command {
        init_telemetry_with_level(cli.log.as_deref().unwrap_or("warn"));
        return handle_setup(cli.config.as_deref()).await;
    }

    let config = match &cli.config {
        Some(config_path) => Config::load_from_path(config_path)?,
        None => Config::load_or_create()?,
    };

    // --log wins over the config file; RUST_LOG wins over both
    init_telemetry_with_level(cli.log.as_deref().unwrap_or(&config.core.log_level));

    tracing::info!(
        "Reel v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    match cli.command {
        Command::Setup => Ok(()),

        Command::Bot => {
            tracing::info!("Starting Telegram bot...");
            handle_bot(&config).await
        }

        Command::Ask { question, chat_id } => {
            tracing::info!("Answering question for chat {}", chat_id);
            handle_ask(question, chat_id, &config, format).await
        }

        Command::History { chat_id, limit } => handle_history(chat_id, limit, &config, format).await,

        Command::Preferences { chat_id } => handle_preferences(chat_id, &config, format).await,

        Command::Recommend { chat_id } => {
            tracing::info!("Running recommendations (chat: {:?})", chat_id);
            handle_recommend(chat_id, &config, format).await
        }

        Command::Index { action } => match action {
            IndexAction::Populate { limit } => {
                tracing::info!("Populating vector index with up to {} movies", limit);
                handle_index_populate(limit, &config, format).await
            }
            IndexAction::Query { text } => handle_index_query(text, &config, format).await,
        },

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
