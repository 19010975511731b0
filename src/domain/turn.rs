//! Turn records kept by the scheduler.
//!
//! One record is produced per turn. Records are in-memory only and bounded;
//! they exist so callers (and tests) can see what the loop did.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to the head action during a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// Confirmed and dequeued
    Acknowledged,

    /// Withheld confirmation; still at the head
    Retained,

    /// Execution failed; force-dequeued and replaced by a notification
    Failed,
}

/// A single turn of the scheduler loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEvent {
    /// Sequence number across the scheduler's lifetime (1-based)
    pub turn: u64,

    /// When the turn was recorded
    pub timestamp: DateTime<Utc>,

    /// Performance the action belongs to. Injected steps and error
    /// notifications carry their parent's id.
    pub performance_id: Option<Uuid>,

    /// Action name
    pub action: String,

    pub status: TurnStatus,

    /// Execution time, excluding the post-turn pause
    pub duration_ms: u64,

    /// Pause applied after the turn
    pub delay_ms: u64,

    /// Error message if failed
    pub error: Option<String>,
}

impl TurnEvent {
    pub fn new(
        turn: u64,
        performance_id: Option<Uuid>,
        action: impl Into<String>,
        status: TurnStatus,
    ) -> Self {
        Self {
            turn,
            timestamp: Utc::now(),
            performance_id,
            action: action.into(),
            status,
            duration_ms: 0,
            delay_ms: 0,
            error: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.status == TurnStatus::Failed
    }
}
