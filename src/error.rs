//! Error types used by tickvisor primitives and the operations they drive.
//!
//! This module defines two enums:
//!
//! - [`TaskError`]: outcomes of attempts and supervised tasks (and the failure
//!   payload carried by every [`CancellableFuture`](crate::CancellableFuture)).
//! - [`RuntimeError`]: misuse of the primitives themselves.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.
//! [`TaskError::is_retryable`] is the single place that decides whether the
//! [`RetryDriver`](crate::RetryDriver) tries again.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by attempts, tasks and chained futures.
///
/// Recoverable errors (`Fail`, `Timeout`) are retried by the retry driver,
/// everything else is fatal and propagates immediately.
///
/// The type is `Clone` so that one failure can settle a whole chain of futures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The operation exceeded a time bound of its own.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// Non-recoverable error (never retried).
    #[error("fatal error (no retry): {reason}")]
    Fatal {
        /// The underlying error message.
        reason: String,
    },

    /// Execution failed but may succeed if retried.
    #[error("execution failed: {reason}")]
    Fail {
        /// The underlying error message.
        reason: String,
    },

    /// The retry budget ran out before any attempt failed.
    #[error("retry budget exhausted after {attempts} attempts")]
    Exhausted {
        /// Number of attempts that were made.
        attempts: u32,
    },

    /// Cooperative cancellation (a shutdown signal settled).
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(reason: impl Into<String>) -> Self {
        TaskError::Fail {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`TaskError::Fatal`].
    pub fn fatal(reason: impl Into<String>) -> Self {
        TaskError::Fatal {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tickvisor::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::Timeout { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Exhausted { .. } => "task_exhausted",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            TaskError::Fatal { reason } => format!("fatal: {reason}"),
            TaskError::Fail { reason } => format!("error: {reason}"),
            TaskError::Exhausted { attempts } => format!("exhausted: attempts={attempts}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Indicates whether the error type is safe to retry.
    ///
    /// Returns `true` for [`TaskError::Fail`] and [`TaskError::Timeout`],
    /// `false` otherwise.
    ///
    /// # Example
    /// ```
    /// use tickvisor::TaskError;
    ///
    /// assert!(TaskError::fail("boom").is_retryable());
    /// assert!(!TaskError::fatal("nope").is_retryable());
    /// assert!(!TaskError::Canceled.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Fail { .. } | TaskError::Timeout { .. })
    }

    /// Returns `true` for [`TaskError::Canceled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// # Misuse of the primitives.
///
/// These are programmer errors: they are fatal and never retried.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A ticker was iterated before [`Ticker::start`](crate::Ticker::start).
    #[error("ticker {name:?} must be started before it is iterated")]
    NotStarted {
        /// Name of the ticker (if any).
        name: Option<String>,
    },

    /// An escalation policy was built without any step.
    #[error("escalation policy needs at least one step")]
    EmptyPolicy,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use tickvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::EmptyPolicy.as_label(), "runtime_empty_policy");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NotStarted { .. } => "runtime_not_started",
            RuntimeError::EmptyPolicy => "runtime_empty_policy",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::NotStarted { name } => {
                format!("iterated before start; ticker={name:?}")
            }
            RuntimeError::EmptyPolicy => "no escalation steps".to_string(),
        }
    }
}

/// Extracts the message of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
