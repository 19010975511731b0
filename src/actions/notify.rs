//! Logging and operator-notification actions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Error, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use crate::adapters::Notifier;
use crate::core::{Action, Context, Outcome, Steps};

/// Log a message through the context logger
#[derive(Debug, Clone)]
pub struct LogInfo {
    message: String,
}

impl LogInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Action for LogInfo {
    fn name(&self) -> &str {
        "log_info"
    }

    fn post_delay(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    async fn execute(&mut self, ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
        ctx.logger().info(&self.message);
        Ok(Outcome::Done)
    }
}

/// Tell the operator something; falls back to the logger without a notifier
#[derive(Debug, Clone)]
pub struct NotifyInfo {
    message: String,
}

impl NotifyInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Action for NotifyInfo {
    fn name(&self) -> &str {
        "notify_info"
    }

    fn post_delay(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    async fn execute(&mut self, ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
        match ctx.notifier() {
            Some(notifier) => notifier
                .info(&self.message)
                .await
                .with_context(|| format!("Failed to notify via {}", notifier.name()))?,
            None => ctx.logger().info(&self.message),
        }
        Ok(Outcome::Done)
    }
}

/// Install an operator-notification channel for the rest of the performance
pub struct AttachNotifier {
    notifier: Arc<dyn Notifier>,
}

impl AttachNotifier {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl Action for AttachNotifier {
    fn name(&self) -> &str {
        "attach_notifier"
    }

    fn post_delay(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    async fn execute(&mut self, ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
        ctx.set_notifier(self.notifier.clone());
        Ok(Outcome::Done)
    }
}

/// Send a snapshot of context fields to the administrator.
///
/// With no keys the whole field record is sent. Missing keys are reported as
/// null. Without a notifier the snapshot goes to the logger.
#[derive(Debug, Clone, Default)]
pub struct AdminReport {
    keys: Vec<String>,
}

impl AdminReport {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Report every field
    pub fn all() -> Self {
        Self::default()
    }

    fn snapshot(&self, ctx: &Context) -> Value {
        if self.keys.is_empty() {
            return Value::Object(ctx.fields().clone());
        }
        let record: Map<String, Value> = self
            .keys
            .iter()
            .map(|key| (key.clone(), ctx.get(key).cloned().unwrap_or(Value::Null)))
            .collect();
        Value::Object(record)
    }
}

#[async_trait]
impl Action for AdminReport {
    fn name(&self) -> &str {
        "admin_report"
    }

    fn post_delay(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    async fn execute(&mut self, ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
        let payload = self.snapshot(ctx);

        match ctx.notifier() {
            Some(notifier) => notifier
                .admin_info(&payload)
                .await
                .with_context(|| format!("Failed to send admin report via {}", notifier.name()))?,
            None => ctx.logger().info(&payload.to_string()),
        }
        Ok(Outcome::Done)
    }
}

/// Report a failed turn. Injected by the scheduler; never fails itself.
#[derive(Debug)]
pub struct ErrorNotification {
    error: Error,
}

impl ErrorNotification {
    pub fn new(error: Error) -> Self {
        Self { error }
    }

    pub fn error(&self) -> &Error {
        &self.error
    }
}

#[async_trait]
impl Action for ErrorNotification {
    fn name(&self) -> &str {
        "error_notification"
    }

    fn post_delay(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    fn is_recovery(&self) -> bool {
        true
    }

    async fn execute(&mut self, ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
        ctx.logger().error(&self.error);

        if let Some(notifier) = ctx.notifier() {
            if let Err(e) = notifier.error(&self.error).await {
                warn!(
                    notifier = notifier.name(),
                    error = %format!("{:#}", e),
                    "Failed to forward error to operator"
                );
            }
        }

        Ok(Outcome::Done)
    }
}
