//! Shared context passed to every action.
//!
//! The context has two halves:
//! - infrastructure handles (`driver`, `queue`, `logger`) that live as long as
//!   the scheduler
//! - an open record of JSON fields written by actions through [`Context::extend`]
//!
//! Extension is a shallow merge where the last writer wins. The only removal
//! primitive is [`Context::retain_infrastructure`], used by the cleanup action
//! between performances.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::adapters::{HttpDriver, Notifier};

use super::logger::Logger;
use super::scheduler::QueueHandle;

/// Keys that survive cleanup
pub const INFRASTRUCTURE_KEYS: [&str; 3] = ["driver", "queue", "logger"];

/// Key reported for the operator-notification slot
pub const NOTIFIER_KEY: &str = "notifier";

/// Errors raised while reading or extending the context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Context extension must be a record, got {0}")]
    NotARecord(&'static str),

    #[error("Context key '{0}' is reserved")]
    ReservedKey(String),

    #[error("Context field '{0}' is missing or not a string")]
    MissingField(String),
}

/// Shared mutable state for one scheduler
pub struct Context {
    driver: HttpDriver,
    queue: QueueHandle,
    logger: Arc<dyn Logger>,
    notifier: Option<Arc<dyn Notifier>>,
    fields: Map<String, Value>,
}

impl Context {
    /// Create a context holding only infrastructure handles
    pub fn new(driver: HttpDriver, queue: QueueHandle, logger: Arc<dyn Logger>) -> Self {
        Self {
            driver,
            queue,
            logger,
            notifier: None,
            fields: Map::new(),
        }
    }

    pub fn driver(&self) -> &HttpDriver {
        &self.driver
    }

    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    pub fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    pub fn notifier(&self) -> Option<Arc<dyn Notifier>> {
        self.notifier.clone()
    }

    /// Install the operator-notification channel for the current performance
    pub fn set_notifier(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifier = Some(notifier);
    }

    /// Shallow-merge a record into the context
    pub fn extend(&mut self, patch: Value) -> Result<(), ContextError> {
        let record = match patch {
            Value::Object(record) => record,
            other => return Err(ContextError::NotARecord(kind_of(&other))),
        };

        if let Some(key) = record.keys().find(|k| is_reserved(k)) {
            return Err(ContextError::ReservedKey(key.clone()));
        }

        for (key, value) in record {
            self.fields.insert(key, value);
        }

        Ok(())
    }

    /// The open record of action-written fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Read a string field another action was expected to provide
    pub fn require_str(&self, key: &str) -> Result<&str, ContextError> {
        self.get_str(key)
            .ok_or_else(|| ContextError::MissingField(key.to_string()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        INFRASTRUCTURE_KEYS.contains(&key)
            || (key == NOTIFIER_KEY && self.notifier.is_some())
            || self.fields.contains_key(key)
    }

    /// All keys currently visible, infrastructure first
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = INFRASTRUCTURE_KEYS.iter().map(|k| k.to_string()).collect();
        if self.notifier.is_some() {
            keys.push(NOTIFIER_KEY.to_string());
        }
        keys.extend(self.fields.keys().cloned());
        keys
    }

    /// Drop every key that is not infrastructure
    pub fn retain_infrastructure(&mut self) -> Vec<String> {
        let mut removed: Vec<String> = self.fields.keys().cloned().collect();
        self.fields.clear();
        if self.notifier.take().is_some() {
            removed.push(NOTIFIER_KEY.to_string());
        }
        removed
    }

    /// Whether only infrastructure keys are present
    pub fn is_clean(&self) -> bool {
        self.fields.is_empty() && self.notifier.is_none()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.keys())
            .field("fields", &self.fields)
            .finish()
    }
}

fn is_reserved(key: &str) -> bool {
    key == NOTIFIER_KEY || INFRASTRUCTURE_KEYS.contains(&key)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
