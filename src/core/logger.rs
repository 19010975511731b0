//! Logger capability threaded through the context.

use anyhow::Error;

/// Minimal logging capability used by the engine and stock actions
pub trait Logger: Send + Sync {
    fn info(&self, message: &str);

    fn error(&self, error: &Error);
}

/// Logger that forwards to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, message: &str) {
        tracing::info!(target: "stagehand::action", "{}", message);
    }

    fn error(&self, error: &Error) {
        tracing::error!(target: "stagehand::action", error = %format!("{:#}", error), "Action error");
    }
}
