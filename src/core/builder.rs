use std::sync::Arc;

use crate::core::supervisor::TaskSupervisor;
use crate::signal::CancellableFuture;
use crate::subscribers::{Reporter, Subscribe};

/// Builder for constructing a [`TaskSupervisor`] with optional features.
pub struct SupervisorBuilder {
    final_signal: CancellableFuture<()>,
    name: Option<Arc<str>>,
    subscriber: Option<Arc<dyn Subscribe>>,
}

impl SupervisorBuilder {
    /// Creates a new builder following `final_signal`.
    pub fn new(final_signal: &CancellableFuture<()>) -> Self {
        Self {
            final_signal: final_signal.clone(),
            name: None,
            subscriber: None,
        }
    }

    /// Sets the name used as event source and in the signal's `Display`.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the sink that receives task failures and cancellation requests.
    ///
    /// Without a sink, events are written through `tracing`.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscriber = Some(subscriber);
        self
    }

    /// Builds the supervisor.
    pub fn build(self) -> TaskSupervisor {
        TaskSupervisor::from_parts(
            self.name,
            &self.final_signal,
            Reporter::new(self.subscriber),
        )
    }
}
