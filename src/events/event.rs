//! # Events emitted by the retry driver and the task supervisor.
//!
//! The [`EventKind`] enum classifies event types across two categories:
//! - **Retry events**: attempt failures, pacing escalation, success and exhaustion
//! - **Supervision events**: failed background tasks, cancellation requests
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! source name, reasons and the delay until the next attempt.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{Event, EventKind, TaskError};
//!
//! let ev = Event::new(EventKind::AttemptFailed)
//!     .with_source("wifi-join")
//!     .with_error(&TaskError::fail("no carrier"))
//!     .with_attempt(3)
//!     .with_delay(Duration::from_secs(5));
//!
//! assert_eq!(ev.kind, EventKind::AttemptFailed);
//! assert_eq!(ev.source.as_deref(), Some("wifi-join"));
//! assert_eq!(ev.label, Some("task_failed"));
//! assert_eq!(ev.delay_ms, Some(5_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::error::TaskError;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Retry events ===
    /// An attempt failed with a recoverable error; the retry goes on.
    ///
    /// Sets:
    /// - `source`: retry driver name
    /// - `attempt`: attempt number (1-based)
    /// - `reason` / `label`: the failure
    /// - `delay_ms`: time until the next tick
    AttemptFailed,

    /// Elapsed time passed the active horizon; pacing switched to the next step.
    ///
    /// Sets:
    /// - `source`: retry driver name
    /// - `attempt`: iteration at which the switch happened
    /// - `period_ms`: the new period
    RetryEscalated,

    /// The retry budget ran out without a success.
    ///
    /// Sets:
    /// - `source`: retry driver name
    /// - `attempt`: number of attempts made
    /// - `reason` / `label`: the error surfaced to the caller
    RetryExhausted,

    /// An attempt succeeded.
    ///
    /// Sets:
    /// - `source`: retry driver name
    /// - `attempt`: the successful attempt number
    RetrySucceeded,

    // === Supervision events ===
    /// A supervised task settled with a failure.
    ///
    /// Sets:
    /// - `source`: task name (or supervisor name for unnamed tasks)
    /// - `reason` / `label`: the failure
    TaskFailed,

    /// The supervisor's signal settled and the remaining tasks were asked to stop.
    ///
    /// Sets:
    /// - `source`: supervisor name
    /// - `count`: number of tasks that were still running
    TasksCancelled,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::AttemptFailed => "attempt_failed",
            EventKind::RetryEscalated => "retry_escalated",
            EventKind::RetryExhausted => "retry_exhausted",
            EventKind::RetrySucceeded => "retry_succeeded",
            EventKind::TaskFailed => "task_failed",
            EventKind::TasksCancelled => "tasks_cancelled",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the component or task the event is about.
    pub source: Option<Arc<str>>,
    /// Attempt or iteration number (starting from 1).
    pub attempt: Option<u32>,
    /// Delay until the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Pacing period in milliseconds (compact).
    pub period_ms: Option<u32>,
    /// Number of affected tasks.
    pub count: Option<u32>,
    /// Human-readable reason.
    pub reason: Option<Arc<str>>,
    /// Stable error label, see [`TaskError::as_label`].
    pub label: Option<&'static str>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            source: None,
            attempt: None,
            delay_ms: None,
            period_ms: None,
            count: None,
            reason: None,
            label: None,
        }
    }

    /// Attaches a source name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a source name if there is one.
    #[inline]
    pub fn with_source_opt(mut self, source: Option<&Arc<str>>) -> Self {
        self.source = source.cloned();
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an error as reason and label.
    #[inline]
    pub fn with_error(mut self, err: &TaskError) -> Self {
        self.reason = Some(err.to_string().into());
        self.label = Some(err.as_label());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a period (stored as milliseconds).
    #[inline]
    pub fn with_period(mut self, d: Duration) -> Self {
        self.period_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a task count.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Returns `true` for events that report a failure.
    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::AttemptFailed | EventKind::RetryExhausted | EventKind::TaskFailed
        )
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}
