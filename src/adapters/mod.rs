//! Adapter interfaces for external systems.
//!
//! - `http`: the automation driver handle shared by network actions
//! - `telegram`: operator notifications through the Telegram Bot API

pub mod http;
pub mod telegram;

use anyhow::{Error, Result};
use async_trait::async_trait;

pub use http::HttpDriver;
pub use telegram::{TelegramConfig, TelegramNotifier};

/// Operator-notification channel
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Human-readable channel name
    fn name(&self) -> &str;

    /// Progress message for the requesting user
    async fn info(&self, message: &str) -> Result<()>;

    /// Failure report for the administrator
    async fn error(&self, error: &Error) -> Result<()>;

    /// Structured diagnostic payload for the administrator
    async fn admin_info(&self, payload: &serde_json::Value) -> Result<()>;
}
