//! Turn budget for a single drain of the queue.
//!
//! The engine has no per-action timeout. A turn budget is the one guard
//! against a queue that never empties (an action that keeps answering
//! `Retry`, or a loop of self-injecting steps).

use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Limits for one drain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnLimits {
    /// Maximum turns per drain (default: unlimited)
    #[serde(default)]
    pub max_turns: Option<u64>,
}

impl TurnLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_turns(max_turns: u64) -> Self {
        Self {
            max_turns: Some(max_turns),
        }
    }

    /// Check the tracker before starting another turn
    pub fn check(&self, tracker: &TurnTracker) -> Result<(), LimitViolation> {
        if let Some(limit) = self.max_turns {
            if tracker.turns >= limit {
                return Err(LimitViolation::MaxTurns {
                    actual: tracker.turns,
                    limit,
                });
            }
        }
        Ok(())
    }
}

/// Counts turns within one drain
#[derive(Debug, Clone)]
pub struct TurnTracker {
    /// Turns executed so far
    pub turns: u64,

    /// Turns that ended in a failure
    pub failures: u64,

    /// When the drain started
    pub started_at: Instant,
}

impl Default for TurnTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnTracker {
    pub fn new() -> Self {
        Self {
            turns: 0,
            failures: 0,
            started_at: Instant::now(),
        }
    }

    pub fn record_turn(&mut self, failed: bool) {
        self.turns += 1;
        if failed {
            self.failures += 1;
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Limit violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitViolation {
    #[error("Maximum turns exceeded: {actual} >= {limit}")]
    MaxTurns { actual: u64, limit: u64 },
}
