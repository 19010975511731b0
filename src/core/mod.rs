//! Core engine.
//!
//! This module contains:
//! - Action: the unit of work and its per-turn expansion record
//! - Context: shared state threaded through every action
//! - Scheduler: the single-worker queue loop with error recovery
//! - Pacing / Limits: post-turn delay policy and turn budget

pub mod action;
pub mod context;
pub mod limits;
pub mod logger;
pub mod pacing;
pub mod scheduler;

pub use action::{Action, BoxedAction, Outcome, Performance, Steps};
pub use context::{Context, ContextError, INFRASTRUCTURE_KEYS, NOTIFIER_KEY};
pub use limits::{LimitViolation, TurnLimits, TurnTracker};
pub use logger::{Logger, TracingLogger};
pub use pacing::Pacing;
pub use scheduler::{QueueHandle, Scheduler, SchedulerConfig, SchedulerError, SchedulerState};
