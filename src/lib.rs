//! stagehand - paced action-queue engine
//!
//! Automates multi-step background workflows (fetch a file, hand it to
//! another service, tell an operator) by running small actions one at a
//! time from a mutable queue.
//!
//! # Architecture
//!
//! - A *performance* is an ordered list of actions submitted as one task
//! - A single cooperative worker drains the queue, one turn per action
//! - Actions may retry themselves, inject pre-steps at the head of the queue,
//!   or append next-steps at the tail
//! - A failing action is dropped and replaced by an error notification;
//!   the loop keeps going
//! - Every performance ends with a cleanup that resets the shared context
//!
//! # Modules
//!
//! - `core`: Action, Context, Scheduler, pacing and turn limits
//! - `actions`: stock actions (context, logging, notifications, files)
//! - `adapters`: HTTP driver and Telegram notifier
//! - `domain`: turn records
//! - `performances`: ready-made and YAML-defined performances
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Download a file with human-paced requests
//! stagehand fetch https://example.com/file.torrent --dir ~/Downloads
//!
//! # Run a performance file
//! stagehand run fetch-report.yaml
//! ```

pub mod actions;
pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod performances;

// Re-export main types at crate root for convenience
pub use crate::core::{
    Action, BoxedAction, Context, ContextError, Outcome, Pacing, Performance, Scheduler,
    SchedulerConfig, SchedulerError, SchedulerState, Steps, TurnLimits,
};
pub use domain::{TurnEvent, TurnStatus};
pub use performances::{ActionSpec, PerformanceSpec};
