//! # TaskSupervisor: runs, reaps and drains background tasks.
//!
//! A supervisor owns a signal chained to the caller's shutdown signal and an
//! ordered set of tracked [`TaskHandle`]s.
//!
//! ```text
//! add(op) ──► TaskHandle ──► tracked set ◄── cleaner (reaps on every completion)
//!                                 │
//! finish() ───────────────────────┘
//!   1. fail the signal with the caller's error (if any)
//!   2. while tasks are pending:
//!        signal done?  cancel all, wait for ALL { signal, tasks }
//!        otherwise     wait for FIRST { signal, tasks }
//!        drop settled tasks
//!   3. stop the cleaner, final reap; tasks added meanwhile → back to 2
//!   4. cancel the signal
//! ```
//!
//! ## Rules
//! - `finish()` returns only once every task ever added has settled, including
//!   tasks added while `finish()` runs.
//! - After `finish()` the cleaner has been joined and the tracked set is empty.
//! - Failures are reported through the configured sink unless the task was
//!   added `silent`; cancellations are never reported.
//! - A failing task does not cancel its siblings.
//! - If the `finish()` future is dropped mid-way, the cleaner is stopped and the
//!   signal cancelled on drop.
//! - Dropping the last supervisor handle without `finish()` does the same; the
//!   tasks keep running detached.
//!
//! ## Example
//! ```rust
//! use tickvisor::{CancellableFuture, TaskError, TaskSupervisor};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let shutdown = CancellableFuture::<()>::new();
//! let supervisor = TaskSupervisor::new(&shutdown);
//!
//! let worker = supervisor.add(async { Ok::<_, TaskError>(()) }, false);
//! supervisor.finish(None).await;
//!
//! assert!(worker.done());
//! assert_eq!(supervisor.pending(), 0);
//! # }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use tokio::task::JoinHandle;

use crate::core::builder::SupervisorBuilder;
use crate::core::handle::TaskHandle;
use crate::error::TaskError;
use crate::events::{Event, EventKind};
use crate::signal::{
    CancellableFuture, Outcome, ResettableResult, lock, wait_for_all, wait_for_first,
};
use crate::subscribers::Reporter;

/// Supervisor of a dynamic set of background tasks.
///
/// Cheap to clone; clones share the same tracked set and signal.
#[derive(Clone)]
pub struct TaskSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    name: Option<Arc<str>>,
    signal: CancellableFuture<()>,
    tasks: Mutex<Vec<TaskHandle>>,
    cleaner: Mutex<Option<JoinHandle<()>>>,
    waiter: ResettableResult<()>,
    reporter: Reporter,
}

impl TaskSupervisor {
    /// Creates a supervisor whose signal follows `final_signal`.
    pub fn new(final_signal: &CancellableFuture<()>) -> Self {
        Self::builder(final_signal).build()
    }

    /// Returns a builder for a supervisor following `final_signal`.
    pub fn builder(final_signal: &CancellableFuture<()>) -> SupervisorBuilder {
        SupervisorBuilder::new(final_signal)
    }

    pub(crate) fn from_parts(
        name: Option<Arc<str>>,
        final_signal: &CancellableFuture<()>,
        reporter: Reporter,
    ) -> Self {
        let signal = match &name {
            Some(name) => {
                CancellableFuture::named_child_of(format!("{name}::signal"), final_signal)
            }
            None => CancellableFuture::child_of(final_signal),
        };
        Self {
            inner: Arc::new(Inner {
                name,
                signal,
                tasks: Mutex::new(Vec::new()),
                cleaner: Mutex::new(None),
                waiter: ResettableResult::new(),
                reporter,
            }),
        }
    }

    /// Runs `body` with a fresh supervisor, then always drains it.
    ///
    /// The body's error (if any) is handed to [`finish`](Self::finish) and
    /// returned unchanged.
    pub async fn scope<F, Fut, T>(
        final_signal: &CancellableFuture<()>,
        body: F,
    ) -> Result<T, TaskError>
    where
        F: FnOnce(TaskSupervisor) -> Fut,
        Fut: Future<Output = Result<T, TaskError>>,
    {
        let supervisor = TaskSupervisor::new(final_signal);
        let res = body(supervisor.clone()).await;
        supervisor.finish(res.as_ref().err().cloned()).await;
        res
    }

    /// Supervisor name.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The supervisor's own signal; settles when the caller's signal does or
    /// when `finish()` completes.
    pub fn final_signal(&self) -> &CancellableFuture<()> {
        &self.inner.signal
    }

    /// Starts `op` as a background task and tracks it.
    ///
    /// Unless `silent`, a failure of `op` is reported as [`EventKind::TaskFailed`].
    pub fn add<F>(&self, op: F, silent: bool) -> TaskHandle
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.start(None, op, silent)
    }

    /// Same as [`add`](Self::add), with a task name used in reports.
    pub fn add_named<F>(&self, name: impl Into<Arc<str>>, op: F, silent: bool) -> TaskHandle
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.start(Some(name.into()), op, silent)
    }

    fn start<F>(&self, name: Option<Arc<str>>, op: F, silent: bool) -> TaskHandle
    where
        F: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let handle = TaskHandle::build(name, op);
        if !silent {
            let reporter = self.inner.reporter.clone();
            let source = handle
                .name()
                .map(Arc::<str>::from)
                .or_else(|| self.inner.name.clone());
            handle.add_done_callback(move |outcome| {
                if let Outcome::Failed(err) = outcome {
                    reporter.emit(
                        Event::new(EventKind::TaskFailed)
                            .with_source_opt(source.as_ref())
                            .with_error(err),
                    );
                }
            });
        }
        self.add_task(handle)
    }

    /// Tracks an already started task.
    pub fn add_task(&self, handle: TaskHandle) -> TaskHandle {
        lock(&self.inner.tasks).push(handle.clone());
        self.ensure_cleaner();

        let waiter = self.inner.waiter.clone();
        handle.add_done_callback(move |_| {
            waiter.reset(false);
            waiter.set_result(());
        });
        handle
    }

    /// Number of tracked tasks that have not settled yet.
    pub fn pending(&self) -> usize {
        lock(&self.inner.tasks).iter().filter(|t| !t.done()).count()
    }

    /// Returns `true` if `handle` is tracked.
    pub fn contains(&self, handle: &TaskHandle) -> bool {
        lock(&self.inner.tasks).contains(handle)
    }

    /// Snapshot of the tracked tasks, in insertion order.
    pub fn tasks(&self) -> Vec<TaskHandle> {
        lock(&self.inner.tasks).clone()
    }

    /// Returns `true` while the cleaner loop is running.
    pub fn has_cleaner(&self) -> bool {
        lock(&self.inner.cleaner).is_some()
    }

    fn ensure_cleaner(&self) {
        let mut cleaner = lock(&self.inner.cleaner);
        if cleaner.is_none() {
            let inner = Arc::downgrade(&self.inner);
            let waiter = self.inner.waiter.clone();
            *cleaner = Some(tokio::spawn(cleaner_loop(inner, waiter)));
        }
    }

    /// Drains the supervisor.
    ///
    /// With `error`, the signal is failed first, which asks every task to stop.
    pub async fn finish(&self, error: Option<TaskError>) {
        let inner = &self.inner;
        let mut guard = FinishGuard {
            inner: Some(Arc::clone(inner)),
        };

        if let Some(err) = error {
            if !inner.signal.done() {
                if err.is_cancelled() {
                    inner.signal.cancel();
                } else {
                    inner.signal.set_exception(err);
                }
            }
        }

        loop {
            inner.drain().await;
            inner.stop_cleaner().await;
            inner.reap();

            let no_tasks = lock(&inner.tasks).is_empty();
            let no_cleaner = lock(&inner.cleaner).is_none();
            if no_tasks && no_cleaner {
                break;
            }
        }

        inner.signal.cancel();
        guard.disarm();
    }
}

impl Inner {
    fn unsettled(&self) -> Vec<TaskHandle> {
        lock(&self.tasks).iter().filter(|t| !t.done()).cloned().collect()
    }

    /// Drops settled tasks from the tracked set and returns them.
    fn reap(&self) -> Vec<TaskHandle> {
        let mut tasks = lock(&self.tasks);
        let (settled, remaining): (Vec<_>, Vec<_>) =
            std::mem::take(&mut *tasks).into_iter().partition(|t| t.done());
        *tasks = remaining;
        settled
    }

    async fn clean(&self) {
        let settled: Vec<CancellableFuture<()>> =
            self.reap().iter().map(|t| t.future().clone()).collect();
        wait_for_all(&settled).await;
    }

    async fn drain(&self) {
        loop {
            let pending = self.unsettled();
            if pending.is_empty() {
                return;
            }

            let mut futs = Vec::with_capacity(pending.len() + 1);
            futs.push(self.signal.clone());
            futs.extend(pending.iter().map(|t| t.future().clone()));

            if self.signal.done() {
                self.reporter.emit(
                    Event::new(EventKind::TasksCancelled)
                        .with_source_opt(self.name.as_ref())
                        .with_count(pending.len()),
                );
                for task in &pending {
                    task.cancel();
                }
                wait_for_all(&futs).await;
            } else {
                wait_for_first(&futs).await;
            }
            self.reap();
        }
    }

    async fn stop_cleaner(&self) {
        let cleaner = lock(&self.cleaner).take();
        if let Some(cleaner) = cleaner {
            cleaner.abort();
            let _ = cleaner.await;
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(cleaner) = lock(&self.cleaner).take() {
            cleaner.abort();
        }
        self.signal.cancel();
    }
}

/// Stops the cleaner and cancels the signal if `finish()` is dropped mid-way.
struct FinishGuard {
    inner: Option<Arc<Inner>>,
}

impl FinishGuard {
    fn disarm(&mut self) {
        self.inner = None;
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            if let Some(cleaner) = lock(&inner.cleaner).take() {
                cleaner.abort();
            }
            inner.signal.cancel();
        }
    }
}

async fn cleaner_loop(inner: Weak<Inner>, waiter: ResettableResult<()>) {
    loop {
        let _ = waiter.wait().await;
        waiter.reset(false);
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.clean().await;
    }
}
