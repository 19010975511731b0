//! The action abstraction.
//!
//! An action is one schedulable unit of work. During its turn it may:
//! - report an [`Outcome`] (done, retry me, or done-with-context-patch)
//! - record next-steps (appended to the tail of the queue)
//! - record pre-steps (spliced onto the head of the queue)
//!
//! The queue itself is never handed to an action; [`Steps`] is the only way
//! an action expands the work that follows it.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::context::Context;

/// Boxed action as stored in the queue
pub type BoxedAction = Box<dyn Action>;

/// Result of a single execution of an action
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Outcome {
    /// Completed; remove from the queue
    #[default]
    Done,

    /// Condition not met yet; keep at the head and run again next turn
    Retry,

    /// Completed, and merge this record into the shared context
    Extend(serde_json::Value),
}

impl Outcome {
    /// Whether the scheduler should acknowledge (dequeue) the action
    pub fn is_confirmed(&self) -> bool {
        !matches!(self, Self::Retry)
    }
}

/// Queue expansion recorded by an action during one turn
#[derive(Default)]
pub struct Steps {
    next: Vec<BoxedAction>,
    pre: Vec<BoxedAction>,
    has_pre_steps: bool,
}

impl Steps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Actions to append to the tail once this turn returns
    pub fn set_next(&mut self, actions: Vec<BoxedAction>) {
        self.next = actions;
    }

    /// Actions to run before anything else currently queued
    pub fn set_pre(&mut self, actions: Vec<BoxedAction>) {
        self.pre = actions;
        self.has_pre_steps = true;
    }

    pub fn has_pre_steps(&self) -> bool {
        self.has_pre_steps
    }

    pub fn next_steps(&self) -> &[BoxedAction] {
        &self.next
    }

    pub fn pre_steps(&self) -> &[BoxedAction] {
        &self.pre
    }

    /// Split into (next, pre) for the scheduler
    pub(crate) fn into_parts(self) -> (Vec<BoxedAction>, Option<Vec<BoxedAction>>) {
        let pre = self.has_pre_steps.then_some(self.pre);
        (self.next, pre)
    }
}

impl fmt::Debug for Steps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |actions: &[BoxedAction]| -> Vec<String> {
            actions.iter().map(|a| a.name().to_string()).collect()
        };
        f.debug_struct("Steps")
            .field("next", &names(&self.next))
            .field("pre", &names(&self.pre))
            .field("has_pre_steps", &self.has_pre_steps)
            .finish()
    }
}

/// A unit of work executed by the scheduler
#[async_trait]
pub trait Action: Send {
    /// Human-readable action name (used in logs and turn history)
    fn name(&self) -> &str;

    /// Pause applied after this action's turn.
    ///
    /// `None` falls back to the scheduler's configured default. A zero
    /// duration disables both the pause and its jitter.
    fn post_delay(&self) -> Option<Duration> {
        None
    }

    /// True for the error-notification action. A recovery action that fails
    /// stops the drain instead of being recovered again.
    fn is_recovery(&self) -> bool {
        false
    }

    /// Perform the action's side effect
    async fn execute(&mut self, ctx: &mut Context, steps: &mut Steps) -> Result<Outcome>;
}

impl fmt::Debug for dyn Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Action").field(&self.name()).finish()
    }
}

/// An ordered list of actions submitted as one logical task
#[derive(Debug)]
pub struct Performance {
    /// Unique identifier for this submission
    pub id: Uuid,

    /// Human-readable name
    pub name: String,

    /// Ordered actions
    pub actions: Vec<BoxedAction>,
}

impl Performance {
    pub fn new(name: impl Into<String>, actions: Vec<BoxedAction>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            actions,
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl From<Vec<BoxedAction>> for Performance {
    fn from(actions: Vec<BoxedAction>) -> Self {
        Self::new("anonymous", actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(&'static str);

    #[async_trait]
    impl Action for Noop {
        fn name(&self) -> &str {
            self.0
        }

        async fn execute(&mut self, _ctx: &mut Context, _steps: &mut Steps) -> Result<Outcome> {
            Ok(Outcome::Done)
        }
    }

    #[test]
    fn test_default_outcome_is_done() {
        assert_eq!(Outcome::default(), Outcome::Done);
        assert!(Outcome::Done.is_confirmed());
        assert!(Outcome::Extend(serde_json::json!({})).is_confirmed());
        assert!(!Outcome::Retry.is_confirmed());
    }

    #[test]
    fn test_steps_without_pre() {
        let mut steps = Steps::new();
        steps.set_next(vec![Box::new(Noop("m")), Box::new(Noop("n"))]);

        assert!(!steps.has_pre_steps());
        let (next, pre) = steps.into_parts();
        assert_eq!(next.len(), 2);
        assert!(pre.is_none());
    }

    #[test]
    fn test_empty_pre_still_counts_as_set() {
        let mut steps = Steps::new();
        steps.set_pre(Vec::new());

        assert!(steps.has_pre_steps());
        let (_, pre) = steps.into_parts();
        assert_eq!(pre.map(|p| p.len()), Some(0));
    }

    #[test]
    fn test_performance_from_vec() {
        let performance: Performance = vec![Box::new(Noop("a")) as BoxedAction].into();
        assert_eq!(performance.name, "anonymous");
        assert_eq!(performance.len(), 1);
    }
}
