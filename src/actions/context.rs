//! Actions that read or reshape the shared context.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::core::{Action, Context, Outcome, Steps};

/// Merge a fixed record into the context
#[derive(Debug, Clone)]
pub struct ExtendContext {
    patch: Value,
}

impl ExtendContext {
    pub fn new(patch: Value) -> Self {
        Self { patch }
    }
}

#[async_trait]
impl Action for ExtendContext {
    fn name(&self) -> &str {
        "extend_context"
    }

    fn post_delay(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    async fn execute(&mut self, _ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
        Ok(Outcome::Extend(self.patch.clone()))
    }
}

/// Remove everything but infrastructure handles from the context.
///
/// The scheduler appends one of these after every performance.
#[derive(Debug, Clone, Default)]
pub struct CleanUpContext;

impl CleanUpContext {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Action for CleanUpContext {
    fn name(&self) -> &str {
        "clean_up_context"
    }

    fn post_delay(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }

    async fn execute(&mut self, ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
        let removed = ctx.retain_infrastructure();
        debug!(?removed, "Context cleaned");
        Ok(Outcome::Done)
    }
}
