//! # CancellableFuture: a result slot chained to a parent.
//!
//! A [`CancellableFuture`] owns one result slot and optionally observes a
//! parent future. The parent's outcome is pushed into the child once:
//!
//! ```text
//! parent outcome      effect on child
//! ──────────────      ───────────────
//! cancelled      ──►  cancelled
//! failed(E)      ──►  failed(E)
//! resolved(v)    ──►  cancelled      (a value on the parent means "stop")
//! ```
//!
//! ## Links
//! The parent keeps only a **weak** reference to the child's slot. The link is
//! an explicit registration ([`CallbackId`]) that is removed as soon as the
//! child settles, or when the last handle of the child is dropped.
//!
//! ## Rules
//! - `cancel()` is local; `cancel_parent()` walks up to the root and cancels it.
//! - Resolving a child directly also resolves its parent if that is still pending.
//! - A resolved parent means "stop": the child then reads as cancelled, even
//!   when its own slot holds a value.
//! - A future without a parent is a root future: a plain result slot.
//!
//! ## Example
//! ```rust
//! use tickvisor::{CancellableFuture, TaskError};
//!
//! let shutdown = CancellableFuture::<()>::new();
//! let child = CancellableFuture::child_of(&shutdown);
//!
//! shutdown.set_result(());
//! assert!(child.cancelled());
//! assert_eq!(child.result(), Some(Err(TaskError::Canceled)));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::TaskError;
use crate::signal::slot::{CallbackId, Outcome, Slot};

struct Link<T> {
    future: CancellableFuture<T>,
    id: CallbackId,
}

struct Node<T> {
    name: Option<Arc<str>>,
    slot: Slot<T>,
    parent: Option<Link<T>>,
}

impl<T> Drop for Node<T> {
    fn drop(&mut self) {
        if let Some(link) = &self.parent {
            link.future.node.slot.remove_callback(link.id);
        }
    }
}

/// Future with an owned result slot and an optional parent it follows.
///
/// Cheap to clone: clones share the same slot.
pub struct CancellableFuture<T> {
    node: Arc<Node<T>>,
}

impl<T> Clone for CancellableFuture<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T: Clone + Send + 'static> Default for CancellableFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> CancellableFuture<T> {
    /// Creates a pending root future.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    /// Creates a pending root future with a name (used in `Display`).
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::build(Some(name.into()), None)
    }

    /// Creates a pending child that follows `parent`.
    pub fn child_of(parent: &CancellableFuture<T>) -> Self {
        Self::build(None, Some(parent))
    }

    /// Creates a named pending child that follows `parent`.
    pub fn named_child_of(name: impl Into<Arc<str>>, parent: &CancellableFuture<T>) -> Self {
        Self::build(Some(name.into()), Some(parent))
    }

    fn build(name: Option<Arc<str>>, parent: Option<&CancellableFuture<T>>) -> Self {
        let slot = Slot::new();

        let parent = parent.map(|parent| {
            let weak = slot.downgrade();
            let id = parent.add_done_callback(move |outcome| {
                if let Some(child) = weak.upgrade() {
                    child.settle(propagated(outcome));
                }
            });
            Link {
                future: parent.clone(),
                id,
            }
        });

        if let Some(link) = &parent {
            let upstream = link.future.clone();
            let id = link.id;
            slot.add_callback(Box::new(move |_| {
                upstream.remove_done_callback(id);
            }));
        }

        Self {
            node: Arc::new(Node { name, slot, parent }),
        }
    }

    /// Returns the name given at construction.
    pub fn name(&self) -> Option<&str> {
        self.node.name.as_deref()
    }

    /// Returns `true` if both handles share the same slot.
    pub(crate) fn same_as(&self, other: &CancellableFuture<T>) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Returns the parent this future follows, if any.
    pub fn parent(&self) -> Option<&CancellableFuture<T>> {
        self.node.parent.as_ref().map(|l| &l.future)
    }

    /// Resolves this future with `value`.
    ///
    /// If the parent is still pending it is resolved with the same value.
    /// Returns `false` if this future was already settled.
    pub fn set_result(&self, value: T) -> bool {
        if !self.node.slot.settle(Outcome::Resolved(value.clone())) {
            return false;
        }
        if let Some(parent) = self.parent() {
            if !parent.done() {
                parent.set_result(value);
            }
        }
        true
    }

    /// Fails this future with `error`.
    ///
    /// If the parent is still pending it is failed with the same error.
    /// Returns `false` if this future was already settled.
    pub fn set_exception(&self, error: TaskError) -> bool {
        if !self.node.slot.settle(Outcome::Failed(error.clone())) {
            return false;
        }
        if let Some(parent) = self.parent() {
            if !parent.done() {
                parent.set_exception(error);
            }
        }
        true
    }

    /// Cancels the local slot only. Returns `false` if it was already settled.
    pub fn cancel(&self) -> bool {
        self.node.slot.settle(Outcome::Cancelled)
    }

    /// Cancels the root of the chain this future belongs to.
    pub fn cancel_parent(&self) -> bool {
        match self.parent() {
            Some(parent) => parent.cancel_parent(),
            None => self.cancel(),
        }
    }

    /// Returns the settled outcome, honouring the parent's state.
    ///
    /// A cancelled or resolved parent reads as cancelled, whatever the local
    /// slot holds. Otherwise the local slot is used, then a failed parent's
    /// failure.
    pub fn outcome(&self) -> Option<Outcome<T>> {
        let parent = self.parent().and_then(|p| p.outcome());
        if matches!(parent, Some(Outcome::Cancelled | Outcome::Resolved(_))) {
            return Some(Outcome::Cancelled);
        }
        self.node.slot.outcome().or(parent)
    }

    /// Returns the result, or `None` while pending.
    pub fn result(&self) -> Option<Result<T, TaskError>> {
        self.outcome().map(Outcome::into_result)
    }

    /// Returns `true` once this future (or its parent) has settled.
    pub fn done(&self) -> bool {
        self.node.slot.is_settled() || self.parent().is_some_and(|p| p.done())
    }

    /// Returns `true` if the effective outcome is a cancellation.
    pub fn cancelled(&self) -> bool {
        matches!(self.outcome(), Some(Outcome::Cancelled))
    }

    /// Returns the failure of the local slot, falling back to the parent's.
    pub fn exception(&self) -> Option<TaskError> {
        if let Some(Outcome::Failed(e)) = self.node.slot.outcome() {
            return Some(e);
        }
        self.parent().and_then(|p| p.exception())
    }

    /// Registers `f` to run once the local slot settles.
    ///
    /// Runs immediately if the slot is already settled.
    pub fn add_done_callback<F>(&self, f: F) -> CallbackId
    where
        F: FnOnce(&Outcome<T>) + Send + 'static,
    {
        self.node.slot.add_callback(Box::new(f))
    }

    /// Removes a callback registered with [`add_done_callback`](Self::add_done_callback).
    pub fn remove_done_callback(&self, id: CallbackId) -> bool {
        self.node.slot.remove_callback(id)
    }

    /// Waits until the local slot settles and returns the effective result.
    pub async fn wait(&self) -> Result<T, TaskError> {
        self.node.slot.wait().await;
        match self.outcome() {
            Some(outcome) => outcome.into_result(),
            None => Err(TaskError::Canceled),
        }
    }

    /// Waits until the local slot settles, ignoring the outcome.
    pub async fn settled(&self) {
        self.node.slot.wait().await;
    }

    #[cfg(test)]
    pub(crate) fn callback_count(&self) -> usize {
        self.node.slot.callback_count()
    }
}

fn propagated<T>(parent: &Outcome<T>) -> Outcome<T> {
    match parent {
        Outcome::Failed(e) => Outcome::Failed(e.clone()),
        Outcome::Resolved(_) | Outcome::Cancelled => Outcome::Cancelled,
    }
}

impl<T: Clone + Send + 'static> fmt::Display for CancellableFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.outcome() {
            None => "pending".to_string(),
            Some(Outcome::Cancelled) => "cancelled".to_string(),
            Some(Outcome::Failed(e)) => format!("exception:{}:{}", e.as_label(), e),
            Some(Outcome::Resolved(_)) => "result".to_string(),
        };
        write!(f, "<Future#{}({state})>", self.name().unwrap_or("-"))
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for CancellableFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_parent_cancel_cancels_child() {
        let parent = CancellableFuture::<u32>::new();
        let child = CancellableFuture::child_of(&parent);
        parent.cancel();
        assert!(child.done());
        assert!(child.cancelled());
        assert_eq!(child.result(), Some(Err(TaskError::Canceled)));
    }

    #[test]
    fn test_parent_value_cancels_child() {
        let parent = CancellableFuture::<u32>::new();
        let child = CancellableFuture::child_of(&parent);
        parent.set_result(7);
        assert!(child.cancelled());
        assert_eq!(child.exception(), None);
        assert_eq!(child.result(), Some(Err(TaskError::Canceled)));
    }

    #[test]
    fn test_parent_failure_fails_child() {
        let parent = CancellableFuture::<u32>::new();
        let child = CancellableFuture::child_of(&parent);
        parent.set_exception(TaskError::fail("link down"));
        assert!(!child.cancelled());
        assert_eq!(child.exception(), Some(TaskError::fail("link down")));
        assert_eq!(child.result(), Some(Err(TaskError::fail("link down"))));
    }

    #[test]
    fn test_propagation_applies_through_grandchildren() {
        let root = CancellableFuture::<()>::new();
        let mid = CancellableFuture::child_of(&root);
        let leaf = CancellableFuture::child_of(&mid);
        root.set_exception(TaskError::fatal("gone"));
        assert_eq!(leaf.exception(), Some(TaskError::fatal("gone")));
    }

    #[test]
    fn test_child_created_under_settled_parent_settles_immediately() {
        let parent = CancellableFuture::<()>::new();
        parent.cancel();
        let child = CancellableFuture::child_of(&parent);
        assert!(child.cancelled());
    }

    #[test]
    fn test_child_result_resolves_pending_parent() {
        let parent = CancellableFuture::<u32>::new();
        let child = CancellableFuture::child_of(&parent);
        assert!(child.set_result(3));
        assert_eq!(parent.result(), Some(Ok(3)));
        // The parent now holds a value, so the child reads as stopped.
        assert!(child.cancelled());
        assert_eq!(child.result(), Some(Err(TaskError::Canceled)));
        assert!(!child.set_result(4));
    }

    #[test]
    fn test_resolved_parent_wins_over_own_value() {
        let parent = CancellableFuture::<u32>::new();
        let child = CancellableFuture::child_of(&parent);
        child.node.slot.settle(Outcome::Resolved(1));
        assert_eq!(child.result(), Some(Ok(1)));

        parent.set_result(2);
        assert!(child.cancelled());
        assert_eq!(child.result(), Some(Err(TaskError::Canceled)));
    }

    #[test]
    fn test_own_value_kept_when_parent_pending_or_failed() {
        let parent = CancellableFuture::<u32>::new();
        let child = CancellableFuture::child_of(&parent);
        child.node.slot.settle(Outcome::Resolved(5));
        parent.set_exception(TaskError::fail("late"));
        assert_eq!(child.result(), Some(Ok(5)));
        assert!(!child.cancelled());
    }

    #[test]
    fn test_child_exception_fails_pending_parent() {
        let parent = CancellableFuture::<()>::new();
        let child = CancellableFuture::child_of(&parent);
        child.set_exception(TaskError::fail("nope"));
        assert_eq!(parent.exception(), Some(TaskError::fail("nope")));
    }

    #[test]
    fn test_cancel_is_local() {
        let parent = CancellableFuture::<()>::new();
        let child = CancellableFuture::child_of(&parent);
        assert!(child.cancel());
        assert!(child.cancelled());
        assert!(!parent.done());
    }

    #[test]
    fn test_cancel_parent_walks_to_root() {
        let root = CancellableFuture::<()>::new();
        let mid = CancellableFuture::child_of(&root);
        let leaf = CancellableFuture::child_of(&mid);
        assert!(leaf.cancel_parent());
        assert!(root.cancelled());
        assert!(mid.cancelled());
        assert!(leaf.cancelled());
    }

    #[test]
    fn test_cancelled_parent_wins_over_own_value() {
        let parent = CancellableFuture::<u32>::new();
        let child = CancellableFuture::child_of(&parent);
        // Detach the child from the parent by settling it first.
        child.node.slot.settle(Outcome::Resolved(1));
        parent.cancel();
        assert_eq!(child.result(), Some(Err(TaskError::Canceled)));
    }

    #[test]
    fn test_child_completion_deregisters_from_parent() {
        let parent = CancellableFuture::<()>::new();
        let child = CancellableFuture::child_of(&parent);
        assert_eq!(parent.callback_count(), 1);
        child.cancel();
        assert_eq!(parent.callback_count(), 0);
    }

    #[test]
    fn test_dropping_pending_child_deregisters_from_parent() {
        let parent = CancellableFuture::<()>::new();
        {
            let _a = CancellableFuture::child_of(&parent);
            let _b = CancellableFuture::child_of(&parent);
            assert_eq!(parent.callback_count(), 2);
        }
        assert_eq!(parent.callback_count(), 0);
    }

    #[test]
    fn test_done_callbacks_fire_once_in_order() {
        let fut = CancellableFuture::<()>::new();
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let seen = std::sync::Arc::clone(&seen);
            fut.add_done_callback(move |_| seen.lock().unwrap().push(i));
        }
        fut.set_result(());
        fut.cancel();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_removed_done_callback_is_skipped() {
        let fut = CancellableFuture::<()>::new();
        let hits = std::sync::Arc::new(AtomicUsize::new(0));
        let h = std::sync::Arc::clone(&hits);
        let id = fut.add_done_callback(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(fut.remove_done_callback(id));
        fut.cancel();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_display_renders_state() {
        let fut = CancellableFuture::<()>::named("probe");
        assert_eq!(fut.to_string(), "<Future#probe(pending)>");
        fut.set_exception(TaskError::fail("x"));
        assert_eq!(
            fut.to_string(),
            "<Future#probe(exception:task_failed:execution failed: x)>"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_observes_parent_cancellation() {
        let parent = CancellableFuture::<()>::new();
        let child = CancellableFuture::child_of(&parent);
        let p = parent.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            p.cancel();
        });
        assert_eq!(child.wait().await, Err(TaskError::Canceled));
    }
}
