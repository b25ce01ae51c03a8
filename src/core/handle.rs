//! # TaskHandle: one background unit of work.
//!
//! A [`TaskHandle`] wraps a tokio task and exposes its outcome as a
//! [`CancellableFuture<()>`].
//!
//! ```text
//! operation result          handle outcome
//! ────────────────          ──────────────
//! Ok(())               ──►  resolved
//! Err(Canceled)        ──►  cancelled
//! Err(e)               ──►  failed(e)
//! panic                ──►  failed(Fatal { panic message })
//! aborted (cancel())   ──►  cancelled
//! ```
//!
//! ## Rules
//! - `cancel()` aborts the tokio task; it is observed at the operation's next
//!   suspension point.
//! - The outcome is settled exactly once, on every exit path.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::task::AbortHandle;

use crate::error::{TaskError, panic_message};
use crate::signal::{CallbackId, CancellableFuture, Outcome};

static TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Handle of a running background task.
///
/// Cheap to clone; clones refer to the same task. Equality is task identity.
#[derive(Clone)]
pub struct TaskHandle {
    id: u64,
    abort: AbortHandle,
    done: CancellableFuture<()>,
}

/// Settles the handle as cancelled if the task future is dropped before it finished.
struct SettleGuard(CancellableFuture<()>);

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

impl TaskHandle {
    /// Starts `op` on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    pub fn spawn<F>(op: F) -> Self
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::build(None, op)
    }

    /// Starts a named `op` on the current tokio runtime.
    pub fn spawn_named<F>(name: impl Into<Arc<str>>, op: F) -> Self
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::build(Some(name.into()), op)
    }

    pub(crate) fn build<F>(name: Option<Arc<str>>, op: F) -> Self
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let done = match name {
            Some(name) => CancellableFuture::named(name),
            None => CancellableFuture::new(),
        };
        let guard = SettleGuard(done.clone());

        let join = tokio::spawn(async move {
            let guard = guard;
            match AssertUnwindSafe(op).catch_unwind().await {
                Ok(Ok(())) => guard.0.set_result(()),
                Ok(Err(e)) if e.is_cancelled() => guard.0.cancel(),
                Ok(Err(e)) => guard.0.set_exception(e),
                Err(panic_err) => guard
                    .0
                    .set_exception(TaskError::fatal(panic_message(&*panic_err))),
            };
        });

        Self {
            id: TASK_ID.fetch_add(1, Ordering::Relaxed),
            abort: join.abort_handle(),
            done,
        }
    }

    /// Process-unique task id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name given at spawn time.
    pub fn name(&self) -> Option<&str> {
        self.done.name()
    }

    /// The future carrying the task's outcome.
    pub fn future(&self) -> &CancellableFuture<()> {
        &self.done
    }

    /// Requests cancellation of the task.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Returns `true` once the task has settled.
    pub fn done(&self) -> bool {
        self.done.done()
    }

    /// Returns `true` if the task was cancelled.
    pub fn cancelled(&self) -> bool {
        self.done.cancelled()
    }

    /// Returns the task's failure, if any.
    pub fn exception(&self) -> Option<TaskError> {
        self.done.exception()
    }

    /// Returns the task's result, or `None` while it runs.
    pub fn result(&self) -> Option<Result<(), TaskError>> {
        self.done.result()
    }

    /// Registers `f` to run once the task settles.
    pub fn add_done_callback<F>(&self, f: F) -> CallbackId
    where
        F: FnOnce(&Outcome<()>) + Send + 'static,
    {
        self.done.add_done_callback(f)
    }

    /// Waits for the task and returns its result.
    pub async fn wait(&self) -> Result<(), TaskError> {
        self.done.wait().await
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TaskHandle {}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskHandle#{} {}", self.id, self.done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_ok_resolves() {
        let h = TaskHandle::spawn(async { Ok(()) });
        assert_eq!(h.wait().await, Ok(()));
        assert!(h.done());
        assert!(!h.cancelled());
    }

    #[tokio::test]
    async fn test_error_fails_and_canceled_cancels() {
        let failed = TaskHandle::spawn(async { Err(TaskError::fail("nope")) });
        assert_eq!(failed.wait().await, Err(TaskError::fail("nope")));
        assert_eq!(failed.exception(), Some(TaskError::fail("nope")));

        let cancelled = TaskHandle::spawn(async { Err(TaskError::Canceled) });
        assert_eq!(cancelled.wait().await, Err(TaskError::Canceled));
        assert!(cancelled.cancelled());
        assert_eq!(cancelled.exception(), None);
    }

    fn h_should_panic() -> bool {
        true
    }

    #[tokio::test]
    async fn test_panic_becomes_fatal() {
        let h = TaskHandle::spawn_named("crashy", async {
            if h_should_panic() {
                panic!("kaboom");
            }
            Ok(())
        });
        assert_eq!(h.wait().await, Err(TaskError::fatal("kaboom")));
        assert_eq!(h.name(), Some("crashy"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_at_next_suspension() {
        let h = TaskHandle::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        h.cancel();
        assert_eq!(h.wait().await, Err(TaskError::Canceled));
        assert!(h.cancelled());
    }

    #[tokio::test]
    async fn test_clones_are_equal() {
        let a = TaskHandle::spawn(async { Ok(()) });
        let b = TaskHandle::spawn(async { Ok(()) });
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }
}
