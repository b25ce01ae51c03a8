//! # The attempt capability driven by [`RetryDriver`](crate::RetryDriver).
//!
//! An [`Attempt`] is one try at reaching an external resource. It receives the
//! time left in the overall retry budget and the time until the next tick, so
//! it can bound its own work (e.g. a connect timeout) to fit the schedule.
//!
//! Errors decide what happens next (see [`TaskError::is_retryable`]):
//! `Fail`/`Timeout` are retried on the next tick, anything else ends the retry.

use std::borrow::Cow;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TaskError;

/// # One try at an unreliable operation.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use async_trait::async_trait;
/// use tickvisor::{Attempt, TaskError};
///
/// struct Ping;
///
/// #[async_trait]
/// impl Attempt<u16> for Ping {
///     fn name(&self) -> &str { "ping" }
///
///     async fn attempt(&self, time_left: Duration, _next: Duration) -> Result<u16, TaskError> {
///         if time_left.is_zero() {
///             return Err(TaskError::Timeout { timeout: time_left });
///         }
///         Ok(200)
///     }
/// }
/// ```
#[async_trait]
pub trait Attempt<T: Send + 'static>: Send + Sync {
    /// Returns a stable, human-readable name.
    fn name(&self) -> &str {
        "attempt"
    }

    /// Makes one attempt.
    ///
    /// `time_left` is the remaining retry budget (`Duration::MAX` without a
    /// timeout), `time_to_next` the delay until the next scheduled attempt.
    async fn attempt(&self, time_left: Duration, time_to_next: Duration) -> Result<T, TaskError>;
}

/// Function-backed attempt.
///
/// Wraps a closure that *creates* a new future per attempt.
#[derive(Debug)]
pub struct AttemptFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> AttemptFn<F> {
    /// Creates a new function-backed attempt.
    ///
    /// ## Example
    /// ```rust
    /// use std::time::Duration;
    /// use tickvisor::{Attempt, AttemptFn, TaskError};
    ///
    /// let a = AttemptFn::new("probe", |_left: Duration, _next: Duration| async {
    ///     Ok::<_, TaskError>(42)
    /// });
    /// assert_eq!(Attempt::<i32>::name(&a), "probe");
    /// ```
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<T, F, Fut> Attempt<T> for AttemptFn<F>
where
    T: Send + 'static,
    F: Fn(Duration, Duration) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, time_left: Duration, time_to_next: Duration) -> Result<T, TaskError> {
        (self.f)(time_left, time_to_next).await
    }
}
