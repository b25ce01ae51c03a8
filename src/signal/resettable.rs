//! # ResettableResult: a reusable single-slot cell.
//!
//! [`ResettableResult`] delegates to one current [`CancellableFuture`] and can
//! swap it for a fresh pending one once it has settled.
//!
//! ## Rules
//! - `reset()` on a pending slot is a no-op.
//! - `reset(true)` cancels the current slot first, so it always installs a fresh one.
//! - Observers registered before a reset never run afterwards: a reset is a clean
//!   break, not a rollback.
//! - Clones share the same current slot.
//!
//! ## Example
//! ```rust
//! use tickvisor::ResettableResult;
//!
//! let cell = ResettableResult::<bool>::new();
//! cell.set_result(true);
//! assert_eq!(cell.result(), Some(Ok(true)));
//!
//! assert!(cell.reset(false));
//! assert!(!cell.done());
//! cell.set_result(false);
//! assert_eq!(cell.result(), Some(Ok(false)));
//! ```

use std::sync::{Arc, Mutex};

use crate::error::TaskError;
use crate::signal::cancellable::CancellableFuture;
use crate::signal::slot::{CallbackId, Outcome, lock};

/// Single-slot result cell that can be cleared and reused.
pub struct ResettableResult<T> {
    name: Option<Arc<str>>,
    current: Arc<Mutex<CancellableFuture<T>>>,
}

impl<T> Clone for ResettableResult<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            current: Arc::clone(&self.current),
        }
    }
}

impl<T: Clone + Send + 'static> Default for ResettableResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> ResettableResult<T> {
    /// Creates a cell with a pending slot.
    pub fn new() -> Self {
        Self {
            name: None,
            current: Arc::new(Mutex::new(CancellableFuture::new())),
        }
    }

    /// Creates a named cell; every slot it installs carries the name.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        Self {
            current: Arc::new(Mutex::new(CancellableFuture::named(Arc::clone(&name)))),
            name: Some(name),
        }
    }

    /// Returns a handle to the current slot.
    pub fn current(&self) -> CancellableFuture<T> {
        lock(&self.current).clone()
    }

    /// Replaces a settled slot with a fresh pending one.
    ///
    /// With `force`, the current slot is cancelled first. Returns `true` if a
    /// fresh slot was installed.
    pub fn reset(&self, force: bool) -> bool {
        let seen = self.current();
        if force {
            // Observers run inside cancel() and may call back into this cell.
            seen.cancel();
        }

        let mut current = lock(&self.current);
        if !current.same_as(&seen) || !current.done() {
            return false;
        }
        *current = match &self.name {
            Some(name) => CancellableFuture::named(Arc::clone(name)),
            None => CancellableFuture::new(),
        };
        true
    }

    /// See [`CancellableFuture::set_result`].
    pub fn set_result(&self, value: T) -> bool {
        self.current().set_result(value)
    }

    /// See [`CancellableFuture::set_exception`].
    pub fn set_exception(&self, error: TaskError) -> bool {
        self.current().set_exception(error)
    }

    /// See [`CancellableFuture::cancel`].
    pub fn cancel(&self) -> bool {
        self.current().cancel()
    }

    /// See [`CancellableFuture::result`].
    pub fn result(&self) -> Option<Result<T, TaskError>> {
        self.current().result()
    }

    /// See [`CancellableFuture::outcome`].
    pub fn outcome(&self) -> Option<Outcome<T>> {
        self.current().outcome()
    }

    /// See [`CancellableFuture::done`].
    pub fn done(&self) -> bool {
        self.current().done()
    }

    /// See [`CancellableFuture::cancelled`].
    pub fn cancelled(&self) -> bool {
        self.current().cancelled()
    }

    /// See [`CancellableFuture::exception`].
    pub fn exception(&self) -> Option<TaskError> {
        self.current().exception()
    }

    /// Registers `f` on the current slot.
    pub fn add_done_callback<F>(&self, f: F) -> CallbackId
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        self.current().add_done_callback(f)
    }

    /// Removes a callback from the current slot.
    pub fn remove_done_callback(&self, id: CallbackId) -> bool {
        self.current().remove_done_callback(id)
    }

    /// Waits for the slot that is current at call time.
    pub async fn wait(&self) -> Result<T, TaskError> {
        let current = self.current();
        current.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_reset_on_pending_is_noop() {
        let cell = ResettableResult::<u8>::new();
        let before = cell.current();
        assert!(!cell.reset(false));
        before.set_result(1);
        assert_eq!(cell.result(), Some(Ok(1)));
    }

    #[test]
    fn test_force_reset_replaces_pending_slot() {
        let cell = ResettableResult::<u8>::new();
        let before = cell.current();
        assert!(cell.reset(true));
        assert!(before.cancelled());
        assert!(!cell.done());
    }

    #[test]
    fn test_force_reset_with_reentrant_observer() {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let cell = ResettableResult::<()>::new();
            let c = cell.clone();
            cell.add_done_callback(move |_| {
                c.reset(false);
                c.set_result(());
            });
            let swapped = cell.reset(true);
            let _ = tx.send((swapped, cell.result()));
        });

        let (swapped, result) = rx
            .recv_timeout(Duration::from_secs(3))
            .expect("reset(true) must not block on its own observers");
        // The observer installed and settled the fresh slot itself.
        assert!(!swapped);
        assert_eq!(result, Some(Ok(())));
    }

    #[test]
    fn test_reset_after_failure() {
        let cell = ResettableResult::<u8>::named("waiter");
        cell.set_exception(TaskError::fail("x"));
        assert_eq!(cell.exception(), Some(TaskError::fail("x")));
        assert!(cell.reset(false));
        assert_eq!(cell.exception(), None);
        assert_eq!(cell.current().name(), Some("waiter"));
    }

    #[test]
    fn test_observer_before_reset_never_runs_after() {
        let cell = ResettableResult::<()>::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        cell.add_done_callback(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        cell.set_result(());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        cell.reset(false);
        cell.set_result(());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_after_reset_blocks_until_fresh_value() {
        let cell = ResettableResult::<u32>::new();
        cell.set_result(1);
        assert_eq!(cell.wait().await, Ok(1));

        cell.reset(false);
        let blocked = tokio::time::timeout(Duration::from_secs(5), cell.wait()).await;
        assert!(blocked.is_err());

        let c = cell.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            c.set_result(2);
        });
        assert_eq!(cell.wait().await, Ok(2));
    }
}
