//! The queue engine.
//!
//! A single cooperative worker drains an ordered queue of actions. One turn:
//! 1. take the head (it stays logically queued while it runs)
//! 2. execute it against the shared context
//! 3. on success: dequeue it if confirmed, append its next-steps to the tail,
//!    then splice its pre-steps onto the head
//! 4. on failure (an error or a panic): drop it and put an error notification
//!    at the head
//! 5. pause for the head's post-delay (plus jitter)
//!
//! Next-steps are appended even when the head answered `Retry`.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::actions::{CleanUpContext, ErrorNotification};
use crate::adapters::HttpDriver;
use crate::domain::{TurnEvent, TurnStatus};

use super::action::{BoxedAction, Outcome, Performance, Steps};
use super::context::Context;
use super::limits::{LimitViolation, TurnLimits, TurnTracker};
use super::logger::{Logger, TracingLogger};
use super::pacing::Pacing;

/// Default number of turn records kept in memory
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Draining,
}

/// Errors that stop a drain or reject a submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("Scheduler has shut down")]
    Shutdown,

    #[error("Turn limit reached: {0}")]
    Limit(#[from] LimitViolation),

    #[error("Recovery action '{action}' failed: {error}")]
    RecoveryFailed { action: String, error: String },
}

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub pacing: Pacing,
    pub limits: TurnLimits,
    pub history_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pacing: Pacing::default(),
            limits: TurnLimits::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

/// An action plus the performance it belongs to
struct Queued {
    action: BoxedAction,
    performance_id: Option<Uuid>,
}

impl Queued {
    fn new(action: BoxedAction, performance_id: Option<Uuid>) -> Self {
        Self {
            action,
            performance_id,
        }
    }
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Queued>,
    /// Name of the head while it executes
    in_flight: Option<String>,
    draining: bool,
}

struct Inner {
    config: SchedulerConfig,
    queue: Mutex<QueueState>,
    context: tokio::sync::Mutex<Context>,
    status: watch::Sender<SchedulerState>,
    history: Mutex<VecDeque<TurnEvent>>,
    halted: Mutex<Option<SchedulerError>>,
    turns: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the action queue engine. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler with its own context
    pub fn new(config: SchedulerConfig, driver: HttpDriver, logger: Arc<dyn Logger>) -> Self {
        let (status, _) = watch::channel(SchedulerState::Idle);

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| Inner {
            context: tokio::sync::Mutex::new(Context::new(
                driver,
                QueueHandle {
                    inner: weak.clone(),
                },
                logger,
            )),
            config,
            queue: Mutex::new(QueueState::default()),
            status,
            history: Mutex::new(VecDeque::new()),
            halted: Mutex::new(None),
            turns: AtomicU64::new(0),
        });

        Self { inner }
    }

    /// Scheduler with default pacing, a plain HTTP driver and tracing logger
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self::new(config, HttpDriver::default(), Arc::new(TracingLogger))
    }

    /// Queue a performance (plus a cleanup action) and start draining if idle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, performance: impl Into<Performance>) -> Uuid {
        let performance = performance.into();
        let id = performance.id;
        let count = performance.len();

        let start = {
            let mut queue = lock(&self.inner.queue);
            queue.pending.extend(
                performance
                    .actions
                    .into_iter()
                    .map(|action| Queued::new(action, Some(id))),
            );
            queue
                .pending
                .push_back(Queued::new(Box::new(CleanUpContext::new()), Some(id)));

            if queue.draining {
                false
            } else {
                queue.draining = true;
                self.inner.status.send_replace(SchedulerState::Draining);
                true
            }
        };

        info!(performance_id = %id, name = %performance.name, actions = count, "Performance submitted");

        if start {
            *lock(&self.inner.halted) = None;
            let inner = self.inner.clone();
            tokio::spawn(async move {
                if let Err(e) = Inner::drain(inner).await {
                    error!(error = %e, "Queue loop stopped");
                }
            });
        }

        id
    }

    pub fn state(&self) -> SchedulerState {
        *self.inner.status.borrow()
    }

    /// Resolve once the queue has drained (or the loop stopped)
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.status.subscribe();
        // The sender lives in `inner`, so the channel cannot close under us.
        let _ = rx.wait_for(|state| *state == SchedulerState::Idle).await;
    }

    /// Actions still queued, counting the one currently executing
    pub fn len(&self) -> usize {
        let queue = lock(&self.inner.queue);
        queue.pending.len() + usize::from(queue.in_flight.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of queued actions, head first
    pub fn pending_names(&self) -> Vec<String> {
        let queue = lock(&self.inner.queue);
        queue
            .in_flight
            .iter()
            .cloned()
            .chain(queue.pending.iter().map(|q| q.action.name().to_string()))
            .collect()
    }

    /// Recent turns, oldest first
    pub fn history(&self) -> Vec<TurnEvent> {
        lock(&self.inner.history).iter().cloned().collect()
    }

    /// Why the last drain stopped early, if it did
    pub fn halted(&self) -> Option<SchedulerError> {
        lock(&self.inner.halted).clone()
    }

    /// Handle suitable for handing to collaborators
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Keys currently present in the shared context.
    ///
    /// Waits for any running drain to release the context.
    pub async fn context_keys(&self) -> Vec<String> {
        self.inner.context.lock().await.keys()
    }
}

/// Resets the state if the loop task unwinds mid-drain
struct DrainGuard(Arc<Inner>);

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.stop(None);
        }
    }
}

impl Inner {
    /// Run turns until the queue is empty or the drain is halted
    async fn drain(self: Arc<Self>) -> Result<(), SchedulerError> {
        let _guard = DrainGuard(self.clone());
        let mut ctx = self.context.lock().await;
        let mut tracker = TurnTracker::new();

        info!("Queue loop started");

        loop {
            if let Err(violation) = self.config.limits.check(&tracker) {
                let err = SchedulerError::from(violation);
                self.stop(Some(err.clone()));
                return Err(err);
            }

            let Some(head) = self.take_head() else {
                info!(
                    turns = tracker.turns,
                    failures = tracker.failures,
                    elapsed_ms = tracker.elapsed_ms(),
                    "No actions left, queue loop idle"
                );
                return Ok(());
            };

            match self.turn(&mut ctx, head).await {
                Ok(failed) => tracker.record_turn(failed),
                Err(err) => {
                    self.stop(Some(err.clone()));
                    return Err(err);
                }
            }
        }
    }

    /// Mark the head as in flight, or go idle if nothing is queued
    fn take_head(&self) -> Option<Queued> {
        let mut queue = lock(&self.queue);
        debug!(pending = queue.pending.len(), "Queue loop iteration");

        match queue.pending.pop_front() {
            Some(head) => {
                queue.in_flight = Some(head.action.name().to_string());
                Some(head)
            }
            None => {
                queue.in_flight = None;
                queue.draining = false;
                self.status.send_replace(SchedulerState::Idle);
                None
            }
        }
    }

    /// Leave the pending queue as it is and go idle
    fn stop(&self, reason: Option<SchedulerError>) {
        let mut queue = lock(&self.queue);
        if reason.is_some() {
            *lock(&self.halted) = reason;
        }
        queue.in_flight = None;
        queue.draining = false;
        self.status.send_replace(SchedulerState::Idle);
    }

    /// Execute one turn. Returns whether the turn failed.
    #[instrument(skip_all, fields(turn = tracing::field::Empty, action = %head.action.name()))]
    async fn turn(&self, ctx: &mut Context, mut head: Queued) -> Result<bool, SchedulerError> {
        let turn = self.turns.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::Span::current().record("turn", turn);

        let name = head.action.name().to_string();
        let post_delay = head.action.post_delay();
        let performance_id = head.performance_id;
        let started = Instant::now();

        debug!("Running action");

        let mut steps = Steps::new();
        let executed = AssertUnwindSafe(head.action.execute(ctx, &mut steps))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(anyhow::anyhow!(
                    "Action panicked: {}",
                    panic_message(payload.as_ref())
                ))
            });
        let result = match executed {
            Ok(Outcome::Extend(patch)) => ctx.extend(patch).map(|_| true).map_err(anyhow::Error::from),
            Ok(outcome) => Ok(outcome.is_confirmed()),
            Err(e) => Err(e),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let event = match result {
            Ok(confirmed) => {
                let (next, pre) = steps.into_parts();
                let mut queue = lock(&self.queue);
                queue.in_flight = None;

                if !confirmed {
                    queue.pending.push_front(head);
                }

                queue.pending.extend(
                    next.into_iter()
                        .map(|action| Queued::new(action, performance_id)),
                );

                if let Some(pre) = pre {
                    for action in pre.into_iter().rev() {
                        queue.pending.push_front(Queued::new(action, performance_id));
                    }
                }

                let status = if confirmed {
                    TurnStatus::Acknowledged
                } else {
                    debug!("Action withheld confirmation, keeping it at the head");
                    TurnStatus::Retained
                };
                TurnEvent::new(turn, performance_id, &name, status).with_duration(duration_ms)
            }
            Err(e) => {
                if head.action.is_recovery() {
                    lock(&self.queue).in_flight = None;
                    error!(error = %format!("{:#}", e), "Recovery action failed");
                    return Err(SchedulerError::RecoveryFailed {
                        action: name,
                        error: format!("{:#}", e),
                    });
                }

                warn!(error = %format!("{:#}", e), "Action failed, dequeuing it");
                let message = format!("{:#}", e);
                {
                    let mut queue = lock(&self.queue);
                    queue.in_flight = None;
                    queue.pending.push_front(Queued::new(
                        Box::new(ErrorNotification::new(e)),
                        performance_id,
                    ));
                }
                drop(head);

                TurnEvent::new(turn, performance_id, &name, TurnStatus::Failed)
                    .with_duration(duration_ms)
                    .with_error(message)
            }
        };

        let delay = self.config.pacing.delay_for(post_delay);
        let failed = event.is_failure();
        self.record(event.with_delay(delay.as_millis() as u64));

        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "Pausing after turn");
            tokio::time::sleep(delay).await;
        }

        Ok(failed)
    }

    fn record(&self, event: TurnEvent) {
        let mut history = lock(&self.history);
        if self.config.history_capacity == 0 {
            return;
        }
        while history.len() >= self.config.history_capacity {
            history.pop_front();
        }
        history.push_back(event);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Weak handle to a scheduler, stored in the context under `queue`
#[derive(Clone)]
pub struct QueueHandle {
    inner: Weak<Inner>,
}

impl QueueHandle {
    /// A handle not attached to any scheduler
    pub fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    /// Submit a follow-up performance to the owning scheduler
    pub fn submit(&self, performance: impl Into<Performance>) -> Result<Uuid, SchedulerError> {
        let inner = self.inner.upgrade().ok_or(SchedulerError::Shutdown)?;
        Ok(Scheduler { inner }.submit(performance))
    }

    /// Queue length, or zero if the scheduler is gone
    pub fn len(&self) -> usize {
        self.inner
            .upgrade()
            .map(|inner| Scheduler { inner }.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
