//! Telegram Bot API notifier.
//!
//! Progress messages go to the requesting chat; errors and diagnostic
//! payloads go to the admin chat as MarkdownV2 code blocks.

use anyhow::{Context, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Notifier;

/// Telegram notifier
pub struct TelegramNotifier {
    /// Bot token
    bot_token: String,
    /// Chat that requested the work
    chat_id: String,
    /// Chat receiving errors and diagnostics
    admin_id: String,
    /// HTTP client
    client: reqwest::Client,
}

/// Response from Telegram API
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Message result from sendMessage
#[derive(Debug, Deserialize)]
struct MessageResult {
    message_id: i64,
}

/// Configuration for Telegram notifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Defaults to `chat_id` when not set
    #[serde(default)]
    pub admin_id: Option<String>,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String, admin_id: String) -> Self {
        Self {
            bot_token,
            chat_id,
            admin_id,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: TelegramConfig) -> Self {
        let admin_id = config.admin_id.unwrap_or_else(|| config.chat_id.clone());
        Self::new(config.bot_token, config.chat_id, admin_id)
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    /// Send a text message to a chat
    pub async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<i64> {
        let url = self.api_url("sendMessage");

        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = serde_json::Value::from(mode);
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send Telegram message")?;

        let result: TelegramResponse<MessageResult> = response
            .json()
            .await
            .context("Failed to parse Telegram response")?;

        if !result.ok {
            anyhow::bail!(
                "Telegram API error: {}",
                result.description.unwrap_or_default()
            );
        }

        Ok(result.result.map(|r| r.message_id).unwrap_or(0))
    }

    async fn send_code_block(&self, text: &str) -> Result<()> {
        self.send_message(&self.admin_id, &code_block(text), Some("MarkdownV2"))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn info(&self, message: &str) -> Result<()> {
        self.send_message(&self.chat_id, message, None)
            .await
            .map(|_| ())
    }

    async fn error(&self, error: &Error) -> Result<()> {
        self.send_code_block(&pretty_error(error)).await
    }

    async fn admin_info(&self, payload: &serde_json::Value) -> Result<()> {
        let text = serde_json::to_string_pretty(payload).context("Failed to render payload")?;
        self.send_code_block(&text).await
    }
}

/// Render an error with its cause chain, one cause per indented line
pub fn pretty_error(error: &Error) -> String {
    let mut out = error.to_string();
    for cause in error.chain().skip(1) {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
    }
    out
}

/// Wrap text in a MarkdownV2 code block
fn code_block(text: &str) -> String {
    format!("```\n{}\n```", escape_code(text))
}

/// Inside MarkdownV2 code blocks only backtick and backslash must be escaped
fn escape_code(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '`' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
