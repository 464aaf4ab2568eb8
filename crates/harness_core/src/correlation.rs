//! Step correlation.
//!
//! Every traced operation takes a [`StepContext`] explicitly. The tracker only
//! remembers the latest one so reports and diagnostics can name the step.

use crate::retry::RetryPolicy;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Identity of the step being executed.
///
/// Clones share one attempt counter, so attempts started through any clone
/// are visible on the step even if the caller never sees the retry result.
#[derive(Debug, Clone)]
pub struct StepContext {
    step: Arc<str>,
    correlation_id: Uuid,
    index: usize,
    policy: RetryPolicy,
    attempts: Arc<AtomicU32>,
}

impl PartialEq for StepContext {
    fn eq(&self, other: &Self) -> bool {
        self.correlation_id == other.correlation_id
    }
}

impl Eq for StepContext {}

impl StepContext {
    /// Step name.
    pub fn step(&self) -> &str {
        &self.step
    }

    /// Identifier attached to every operation of this step.
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Zero-based position of the step in this process.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Retry policy in force for this step.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Ledger attempts started under this step so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Counts one more attempt and returns the new total.
    pub(crate) fn record_attempt(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// A tracing span carrying the step's correlation fields.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "step",
            step = %self.step,
            correlation_id = %self.correlation_id
        )
    }
}

impl fmt::Display for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.step, self.correlation_id)
    }
}

/// Holds the context of the most recently started step.
#[derive(Debug, Default)]
pub struct CorrelationTracker {
    current: Option<StepContext>,
    started: usize,
}

impl CorrelationTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new step; the previous context is replaced.
    pub fn set_step(&mut self, name: &str, policy: RetryPolicy) -> StepContext {
        let ctx = StepContext {
            step: Arc::from(name),
            correlation_id: Uuid::new_v4(),
            index: self.started,
            policy,
            attempts: Arc::new(AtomicU32::new(0)),
        };
        self.started += 1;
        self.current = Some(ctx.clone());
        ctx
    }

    /// Context of the current step, if any step has started.
    pub fn current_step(&self) -> Option<&StepContext> {
        self.current.as_ref()
    }

    /// Forgets everything; used when a session is loaded.
    pub fn reset(&mut self) {
        self.current = None;
        self.started = 0;
    }
}
