//! Telegram Bot Integration
//!
//! Long-polls the Bot API and hands every text message from an allowed user
//! to the [`DialogueService`]. While the pipeline runs the user sees a status
//! message, which is then edited in place with the answer.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::DialogueService;
use crate::config::BotConfig;
use crate::recommend::{Delivery, Notifier, RecommendationTask};
use crate::secrets::{scrub, SecretString};
use sdk::errors::EngineError;

pub const STATUS_TEXT: &str = "Processing your request, please wait... 🔎";
pub const INTERNAL_ERROR_TEXT: &str = "Internal error";
pub const NOT_REGISTERED_TEXT: &str = "Send /start first, then ask me again.";
pub const NOTHING_TO_RECOMMEND_TEXT: &str =
    "I could not find anything new to recommend right now. Tell me more about what you like!";
pub const HELP_TEXT: &str = "Ask me anything about movies, series and the people who make them.\n\n\
Available commands:\n\
/start - Register and say hello\n\
/recommend - Get a personal recommendation now\n\
/help - Show this help";

/// Telegram rejects messages longer than this many characters
pub const MESSAGE_LIMIT: usize = 4096;

const TRUNCATION_MARK: &str = "\n\n(truncated)";

/// Cut `text` to fit in one Telegram message, counting characters
pub fn truncate_for_telegram(text: &str) -> String {
    if text.chars().count() <= MESSAGE_LIMIT {
        return text.to_string();
    }
    let keep = MESSAGE_LIMIT - TRUNCATION_MARK.chars().count();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARK);
    out
}

#[derive(Clone)]
pub struct TelegramBot {
    api_base: String,
    token: SecretString,
    allowed_users: Vec<i64>,
    client: Client,
    dialogue: Arc<DialogueService>,
    recommender: Option<Arc<RecommendationTask>>,
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("api_base", &self.api_base)
            .field("allowed_users", &self.allowed_users)
            .field("recommender", &self.recommender.is_some())
            .finish()
    }
}

#[derive(Deserialize, Debug)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Deserialize, Debug)]
struct Message {
    chat: Chat,
    text: Option<String>,
    from: Option<Sender>,
}

#[derive(Deserialize, Debug)]
struct Chat {
    id: i64,
}

#[derive(Deserialize, Debug)]
struct Sender {
    id: i64,
    #[serde(default)]
    first_name: String,
    last_name: Option<String>,
}

impl Sender {
    fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SentMessage {
    message_id: i64,
}

impl TelegramBot {
    pub fn new(config: &BotConfig, token: SecretString, dialogue: Arc<DialogueService>) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            allowed_users: config.allowed_users.clone(),
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            dialogue,
            recommender: None,
        }
    }

    /// Enable the `/recommend` command
    pub fn with_recommender(mut self, recommender: Arc<RecommendationTask>) -> Self {
        self.recommender = Some(recommender);
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.unsecure(), method)
    }

    /// Start the long-polling loop
    ///
    /// Runs until the process is stopped; fetch errors back off for five
    /// seconds and retry.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot long-polling loop...");
        let mut offset = 0;

        loop {
            match self.poll_once(offset).await {
                Ok(next) => offset = next,
                Err(e) => {
                    error!("Failed to fetch Telegram updates: {}", scrub(&format!("{:#}", e)));
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    /// Fetch one batch of updates, handle them in order and return the next
    /// offset
    pub async fn poll_once(&self, offset: i64) -> Result<i64> {
        let mut next = offset;
        for update in self.get_updates(offset).await? {
            next = update.update_id + 1;
            if let Some(msg) = update.message {
                self.handle_message(&msg).await;
            }
        }
        Ok(next)
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[("offset", offset.to_string()), ("timeout", "30".to_string())])
            .send()
            .await
            .context("getUpdates request failed")?;

        Self::unwrap_response::<Vec<Update>>(response)
            .await
            .map(Option::unwrap_or_default)
    }

    async fn unwrap_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>> {
        let body = response
            .json::<ApiResponse<T>>()
            .await
            .context("Malformed Telegram response")?;
        if !body.ok {
            return Err(anyhow::anyhow!(
                "Telegram API returned ok=false: {}",
                body.description.unwrap_or_default()
            ));
        }
        Ok(body.result)
    }

    async fn handle_message(&self, msg: &Message) {
        let chat_id = msg.chat.id;

        let sender = match msg.from.as_ref() {
            Some(u) => u,
            None => {
                warn!("Message with no user info - ignoring");
                return;
            }
        };

        if !self.allowed_users.is_empty() && !self.allowed_users.contains(&sender.id) {
            warn!("Unauthorized user {} attempted to use the bot", sender.id);
            let _ = self
                .send_message(chat_id, "Unauthorized. Access denied.")
                .await;
            return;
        }

        let Some(text) = &msg.text else {
            return;
        };
        info!("Message from {} in chat {}", sender.id, chat_id);

        if text.starts_with('/') {
            self.handle_command(chat_id, &sender.full_name(), text).await;
            return;
        }

        let status_id = match self.send_message(chat_id, STATUS_TEXT).await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to send status message to {}: {:#}", chat_id, e);
                return;
            }
        };

        let reply = match self.dialogue.answer(chat_id, &sender.full_name(), text).await {
            Ok(answer) if !answer.trim().is_empty() => answer,
            Ok(_) => {
                warn!("Pipeline produced an empty answer for chat {}", chat_id);
                INTERNAL_ERROR_TEXT.to_string()
            }
            Err(e) => {
                error!("Pipeline failed for chat {}: {}", chat_id, scrub(&e.to_string()));
                INTERNAL_ERROR_TEXT.to_string()
            }
        };

        if let Err(e) = self.edit_message(chat_id, status_id, &reply).await {
            error!("Failed to deliver answer to {}: {:#}", chat_id, e);
        }
    }

    /// Handle built-in bot commands
    async fn handle_command(&self, chat_id: i64, full_name: &str, cmd: &str) {
        // "/start@reel_bot" addresses the same command in group chats
        let name = cmd
            .split_whitespace()
            .next()
            .unwrap_or("")
            .split('@')
            .next()
            .unwrap_or("");

        let reply = match name {
            "/start" => match self.dialogue.register(chat_id, full_name).await {
                Ok(user) => format!("Hello, {}!\n\n{}", user.full_name, HELP_TEXT),
                Err(e) => {
                    error!("Failed to register chat {}: {}", chat_id, e);
                    INTERNAL_ERROR_TEXT.to_string()
                }
            },
            "/help" => HELP_TEXT.to_string(),
            "/recommend" => match &self.recommender {
                Some(recommender) => match recommender.run_for_chat(self, chat_id).await {
                    // The recommendation itself went out through `notify`
                    Ok(Delivery::Sent) => return,
                    Ok(Delivery::Nothing) => NOTHING_TO_RECOMMEND_TEXT.to_string(),
                    Ok(Delivery::UnknownChat) => NOT_REGISTERED_TEXT.to_string(),
                    Err(e) => {
                        error!("Recommendation for chat {} failed: {}", chat_id, e);
                        INTERNAL_ERROR_TEXT.to_string()
                    }
                },
                None => "Recommendations are not enabled.".to_string(),
            },
            _ => format!("Unknown command: {}", name),
        };

        if let Err(e) = self.send_message(chat_id, &reply).await {
            error!("Failed to send command reply: {:#}", e);
        }
    }

    /// Send a message and return its id
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64> {
        #[derive(Serialize)]
        struct SendMsgReq<'a> {
            chat_id: i64,
            text: &'a str,
        }

        let scrubbed = truncate_for_telegram(&scrub(text));
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMsgReq {
                chat_id,
                text: &scrubbed,
            })
            .send()
            .await
            .context("sendMessage request failed")?;

        let sent = Self::unwrap_response::<SentMessage>(response)
            .await?
            .context("sendMessage returned no message")?;
        Ok(sent.message_id)
    }

    /// Replace the text of a message sent earlier
    pub async fn edit_message(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        #[derive(Serialize)]
        struct EditMsgReq<'a> {
            chat_id: i64,
            message_id: i64,
            text: &'a str,
        }

        let scrubbed = truncate_for_telegram(&scrub(text));
        let response = self
            .client
            .post(self.method_url("editMessageText"))
            .json(&EditMsgReq {
                chat_id,
                message_id,
                text: &scrubbed,
            })
            .send()
            .await
            .context("editMessageText request failed")?;

        Self::unwrap_response::<serde_json::Value>(response).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramBot {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), EngineError> {
        self.send_message(chat_id, text)
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Network(format!("{:#}", e)))
    }
}
