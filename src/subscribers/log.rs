//! # LogWriter: events as `tracing` records.
//!
//! The default sink when no subscriber is configured. Installing a `tracing`
//! subscriber is left to the embedding application.
//!
//! ## Levels
//! ```text
//! RetryExhausted, TaskFailed   → error
//! AttemptFailed                → warn
//! RetryEscalated, TasksCancelled → info
//! RetrySucceeded               → debug
//! ```

use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default, Clone, Copy, Debug)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for LogWriter {
    fn on_event(&self, e: &Event) {
        let source = e.source.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::AttemptFailed => {
                warn!(
                    source,
                    attempt = e.attempt,
                    delay_ms = e.delay_ms,
                    label = e.label,
                    reason,
                    "attempt failed"
                );
            }
            EventKind::RetryEscalated => {
                info!(source, attempt = e.attempt, period_ms = e.period_ms, "retry escalated");
            }
            EventKind::RetryExhausted => {
                error!(source, attempts = e.attempt, label = e.label, reason, "retry exhausted");
            }
            EventKind::RetrySucceeded => {
                debug!(source, attempt = e.attempt, "retry succeeded");
            }
            EventKind::TaskFailed => {
                error!(source, label = e.label, reason, "task failed");
            }
            EventKind::TasksCancelled => {
                info!(source, pending = e.count, "cancelling remaining tasks");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
