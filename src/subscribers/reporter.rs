//! # Reporter: hands events to the configured sink.
//!
//! Every component that emits events owns a [`Reporter`]. Without a sink the
//! event goes to [`LogWriter`]. A panicking sink is isolated: the panic is
//! caught and logged, and the caller carries on.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::error::panic_message;
use crate::events::Event;
use crate::subscribers::{LogWriter, Subscribe};

#[derive(Clone, Default)]
pub(crate) struct Reporter {
    sink: Option<Arc<dyn Subscribe>>,
}

impl Reporter {
    pub(crate) fn new(sink: Option<Arc<dyn Subscribe>>) -> Self {
        Self { sink }
    }

    pub(crate) fn emit(&self, event: Event) {
        let Some(sink) = &self.sink else {
            LogWriter.on_event(&event);
            return;
        };
        if let Err(panic_err) = catch_unwind(AssertUnwindSafe(|| sink.on_event(&event))) {
            let info = panic_message(&*panic_err);
            tracing::error!(
                sink = sink.name(),
                info = %info,
                kind = event.kind.as_label(),
                "event sink panicked"
            );
        }
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("sink", &self.sink.as_ref().map(|s| s.name()))
            .finish()
    }
}
