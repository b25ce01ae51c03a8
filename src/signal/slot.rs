//! # Single-assignment result slot.
//!
//! [`Slot`] is the storage behind every future in this crate: it is settled at
//! most once with an [`Outcome`], runs its completion callbacks in registration
//! order, and wakes every async waiter.
//!
//! ## Rules
//! - The first `settle` wins; later calls return `false` and change nothing.
//! - Callbacks run **outside** the lock, exactly once, in registration order.
//! - A callback registered on a settled slot runs immediately.
//! - Waiters are woken through [`Notify::notify_waiters`]; a `Notified` future
//!   created before the state check never misses the wakeup.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::Notify;

use crate::error::TaskError;

/// Final state of a settled future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Resolved with a value.
    Resolved(T),
    /// Failed with an error.
    Failed(TaskError),
    /// Cancelled.
    Cancelled,
}

impl<T> Outcome<T> {
    /// Converts the outcome into a `Result`; cancellation becomes [`TaskError::Canceled`].
    pub fn into_result(self) -> Result<T, TaskError> {
        match self {
            Outcome::Resolved(v) => Ok(v),
            Outcome::Failed(e) => Err(e),
            Outcome::Cancelled => Err(TaskError::Canceled),
        }
    }

    /// Returns `true` for [`Outcome::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// Returns the failure, if any.
    pub fn failure(&self) -> Option<&TaskError> {
        match self {
            Outcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Identifies a registered completion callback so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

pub(crate) type Callback<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;

struct State<T> {
    outcome: Option<Outcome<T>>,
    callbacks: Vec<(CallbackId, Callback<T>)>,
    next_id: u64,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

/// Shared single-assignment cell.
pub(crate) struct Slot<T> {
    inner: Arc<Shared<T>>,
}

/// Non-owning reference to a [`Slot`].
pub(crate) struct WeakSlot<T> {
    inner: Weak<Shared<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> WeakSlot<T> {
    pub(crate) fn upgrade(&self) -> Option<Slot<T>> {
        self.inner.upgrade().map(|inner| Slot { inner })
    }
}

/// Locks a mutex, recovering the data if a callback panicked while it was held.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> Slot<T> {
    pub(crate) fn downgrade(&self) -> WeakSlot<T> {
        WeakSlot {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        lock(&self.inner.state).outcome.is_some()
    }

    pub(crate) fn remove_callback(&self, id: CallbackId) -> bool {
        let mut state = lock(&self.inner.state);
        let before = state.callbacks.len();
        state.callbacks.retain(|(cid, _)| *cid != id);
        state.callbacks.len() != before
    }
}

impl<T: Clone + Send + 'static> Slot<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(State {
                    outcome: None,
                    callbacks: Vec::new(),
                    next_id: 0,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Settles the slot. Returns `false` if it was already settled.
    pub(crate) fn settle(&self, outcome: Outcome<T>) -> bool {
        let callbacks = {
            let mut state = lock(&self.inner.state);
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome.clone());
            std::mem::take(&mut state.callbacks)
        };

        self.inner.notify.notify_waiters();
        for (_, cb) in callbacks {
            cb(&outcome);
        }
        true
    }

    pub(crate) fn outcome(&self) -> Option<Outcome<T>> {
        lock(&self.inner.state).outcome.clone()
    }

    pub(crate) fn add_callback(&self, cb: Callback<T>) -> CallbackId {
        let mut state = lock(&self.inner.state);
        let id = CallbackId(state.next_id);
        state.next_id += 1;

        match state.outcome.clone() {
            Some(outcome) => {
                drop(state);
                cb(&outcome);
            }
            None => state.callbacks.push((id, cb)),
        }
        id
    }

    #[cfg(test)]
    pub(crate) fn callback_count(&self) -> usize {
        lock(&self.inner.state).callbacks.len()
    }

    /// Waits until the slot is settled and returns its outcome.
    pub(crate) async fn wait(&self) -> Outcome<T> {
        loop {
            let notified = self.inner.notify.notified();
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            notified.await;
        }
    }
}
