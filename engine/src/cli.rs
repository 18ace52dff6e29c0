//! CLI interface for Reel
//!
//! Command-line surface built with clap's derive API. Every command runs in
//! the foreground; `reel bot` is the long-running one.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reel, a conversational movie assistant
///
/// Answers questions about movies, series and the people who make them,
/// remembers what each user likes and sends personal recommendations.
#[derive(Parser, Debug)]
#[command(name = "reel")]
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

/// Chat used by commands run from the terminal
pub const LOCAL_CHAT_ID: i64 = 0;

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store API keys in the OS keychain and write a default config
    Setup,

    /// Run the Telegram bot (long polling)
    Bot,

    /// Ask one question as a chat user
    Ask {
        /// The question
        question: String,

        /// Chat whose history and preferences are used
        #[arg(long, default_value_t = LOCAL_CHAT_ID)]
        chat_id: i64,
    },

    /// Show the stored conversation of a chat
    History {
        #[arg(long, default_value_t = LOCAL_CHAT_ID)]
        chat_id: i64,

        /// Number of messages to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the preferences remembered for a chat
    Preferences {
        #[arg(long, default_value_t = LOCAL_CHAT_ID)]
        chat_id: i64,
    },

    /// Send recommendations to every active user, or to one chat
    Recommend {
        #[arg(long)]
        chat_id: Option<i64>,
    },

    /// Manage the vector index used for description search
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Run system diagnostics
    Doctor,
}

/// Vector index actions
#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Load top-rated catalog movies into the index
    Populate {
        /// Maximum number of movies to add
        #[arg(short, long, default_value = "250")]
        limit: usize,
    },

    /// Print the nearest movie for a description
    Query {
        /// Free-text plot description
        text: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["reel", "ask", "Who directed Alien?"]);
        match cli.command {
            Command::Ask { question, chat_id } => {
                assert_eq!(question, "Who directed Alien?");
                assert_eq!(chat_id, LOCAL_CHAT_ID);
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["reel", "--json", "--log", "debug", "doctor"]);
        assert!(cli.json);
        assert_eq!(cli.log.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Doctor));
    }

    #[test]
    fn test_history_defaults() {
        let cli = Cli::parse_from(["reel", "history", "--chat-id", "42"]);
        match cli.command {
            Command::History { chat_id, limit } => {
                assert_eq!(chat_id, 42);
                assert_eq!(limit, 10);
            }
            _ => panic!("Expected History command"),
        }
    }

    #[test]
    fn test_recommend_optional_chat() {
        let cli = Cli::parse_from(["reel", "recommend"]);
        assert!(matches!(cli.command, Command::Recommend { chat_id: None }));

        let cli = Cli::parse_from(["reel", "recommend", "--chat-id", "7"]);
        assert!(matches!(cli.command, Command::Recommend { chat_id: Some(7) }));
    }

    #[test]
    fn test_index_subcommands() {
        let cli = Cli::parse_from(["reel", "index", "populate", "--limit", "50"]);
        assert!(matches!(
            cli.command,
            Command::Index {
                action: IndexAction::Populate { limit: 50 }
            }
        ));

        let cli = Cli::parse_from(["reel", "index", "query", "a ship hits an iceberg"]);
        match cli.command {
            Command::Index {
                action: IndexAction::Query { text },
            } => assert_eq!(text, "a ship hits an iceberg"),
            _ => panic!("Expected Index Query command"),
        }
    }

    #[test]
    fn test_config_path_flag() {
        let cli = Cli::parse_from(["reel", "--config", "/tmp/reel.toml", "bot"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/reel.toml")));
        assert!(matches!(cli.command, Command::Bot));
    }
}
