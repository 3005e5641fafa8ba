//! Telegram Bot API integration
//!
//! One-time codes are delivered through a Telegram bot. The webhook side
//! (`bot`) answers `/start` and shared contacts; this module holds the
//! outbound half.

pub mod bot;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{AppError, AppResult};
use crate::infrastructure::config::Config;

/// A bot reply. `request_contact` attaches a one-time "share phone" keyboard.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    pub request_contact: bool,
}

impl OutgoingMessage {
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            request_contact: false,
        }
    }
}

#[async_trait]
pub trait OtpNotifier: Send + Sync {
    async fn send(&self, message: OutgoingMessage) -> AppResult<()>;
}

/// Chooses the Bot API client when a token is configured.
pub fn notifier_from_config(config: &Config) -> Arc<dyn OtpNotifier> {
    if config.bot_token.is_empty() {
        tracing::warn!("BOT_TOKEN not set, one-time codes will only be logged");
        Arc::new(LogNotifier)
    } else {
        Arc::new(TelegramNotifier::new(&config.telegram_api_url, &config.bot_token))
    }
}

pub fn login_code_text(code: &str) -> String {
    format!("🔐 Your login code: {code}")
}

pub fn registration_code_text(code: &str) -> String {
    format!("📝 Your registration code: {code}")
}

/// Logs instead of sending; used when no bot is configured
pub struct LogNotifier;

#[async_trait]
impl OtpNotifier for LogNotifier {
    async fn send(&self, message: OutgoingMessage) -> AppResult<()> {
        tracing::info!(chat_id = message.chat_id, "telegram message: {}", message.text);
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct BotApiResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl TelegramNotifier {
    pub fn new(api_url: &str, token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), token),
        }
    }
}

#[async_trait]
impl OtpNotifier for TelegramNotifier {
    async fn send(&self, message: OutgoingMessage) -> AppResult<()> {
        let reply_markup = if message.request_contact {
            Some(serde_json::json!({
                "keyboard": [[{"text": "Phone Number", "request_contact": true}]],
                "resize_keyboard": true,
                "one_time_keyboard": true
            }))
        } else {
            Some(serde_json::json!({ "remove_keyboard": true }))
        };

        let body = SendMessageRequest {
            chat_id: message.chat_id,
            text: &message.text,
            reply_markup,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::External(format!("Telegram request failed: {e}")))?;

        let status = response.status();
        let parsed: BotApiResponse = response
            .json()
            .await
            .map_err(|e| AppError::External(format!("Telegram response unreadable: {e}")))?;

        if !status.is_success() || !parsed.ok {
            return Err(AppError::External(format!(
                "Telegram sendMessage failed ({status}): {}",
                parsed.description.unwrap_or_default()
            )));
        }
        Ok(())
    }
}
