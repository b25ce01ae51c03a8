//! # EventLog: ordered in-memory record of events.
//!
//! Useful for tests and for surfacing retry progress to a caller after the fact.

use std::sync::Mutex;

use crate::events::{Event, EventKind};
use crate::signal::lock;
use crate::subscribers::Subscribe;

/// Subscriber that keeps every event it receives, in order.
#[derive(Default, Debug)]
pub struct EventLog {
    events: Mutex<Vec<Event>>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded events.
    pub fn snapshot(&self) -> Vec<Event> {
        lock(&self.events).clone()
    }

    /// Returns the kinds of all recorded events, in order.
    pub fn kinds(&self) -> Vec<EventKind> {
        lock(&self.events).iter().map(|e| e.kind).collect()
    }

    /// Number of recorded events of `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        lock(&self.events).iter().filter(|e| e.kind == kind).count()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        lock(&self.events).len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        lock(&self.events).is_empty()
    }

    /// Drops all recorded events.
    pub fn clear(&self) {
        lock(&self.events).clear();
    }
}

impl Subscribe for EventLog {
    fn on_event(&self, event: &Event) {
        lock(&self.events).push(event.clone());
    }

    fn name(&self) -> &'static str {
        "event-log"
    }
}
