//! # tickvisor
//!
//! **Tickvisor** is a small toolkit of async scheduling primitives built on
//! tokio: cancellable outcome signals, a drift-correcting ticker, an escalating
//! retry driver and a supervisor for background tasks.
//!
//! ## Architecture
//! ```text
//!                    ┌──────────────────────────────┐
//!                    │ CancellableFuture (root)     │  app shutdown signal
//!                    └──────┬───────────────┬───────┘
//!                  child_of │               │ child_of
//!                           ▼               ▼
//!   ┌──────────────────────────┐   ┌──────────────────────────────┐
//!   │ Ticker                   │   │ TaskSupervisor               │
//!   │ - expected tick time     │   │ - tracked TaskHandles        │
//!   │ - min_wait floor         │   │ - cleaner (reaps on settle)  │
//!   │ - max_iterations/time    │   │ - finish(): drain + cancel   │
//!   └──────────┬───────────────┘   └──────────────┬───────────────┘
//!              ▼                                  │
//!   ┌──────────────────────────┐                  │
//!   │ RetryDriver              │                  │
//!   │ - EscalationPolicy steps │                  │
//!   │ - Attempt::attempt(..)   │                  │
//!   └──────────┬───────────────┘                  │
//!              │ Events                           │ Events
//!              ▼                                  ▼
//!        ┌─────────────────────────────────────────────┐
//!        │ Subscribe sink (LogWriter by default)       │
//!        └─────────────────────────────────────────────┘
//! ```
//!
//! ## Signals
//! A [`CancellableFuture`] settles once: resolved, failed or cancelled.
//! Children created with [`CancellableFuture::child_of`] follow their parent:
//! when the parent settles, the child is cancelled. Settling a child with a
//! result or an error also settles a still-pending parent; cancelling a child
//! stays local.
//!
//! ## Features
//! | Area            | Description                                           | Key types                                  |
//! |-----------------|-------------------------------------------------------|--------------------------------------------|
//! | **Signals**     | Settle-once outcomes with parent/child chaining.      | [`CancellableFuture`], [`ResettableResult`] |
//! | **Ticking**     | Clock-aligned periodic iteration with limits.         | [`Ticker`], [`TickerConfig`]               |
//! | **Retrying**    | Escalating retry schedule around a fallible attempt.  | [`RetryDriver`], [`EscalationPolicy`]      |
//! | **Supervision** | Background tasks drained on shutdown.                 | [`TaskSupervisor`], [`TaskHandle`]         |
//! | **Events**      | Failure and retry reporting.                          | [`Event`], [`Subscribe`], [`LogWriter`]    |
//! | **Errors**      | Typed errors for attempts and runtime misuse.         | [`TaskError`], [`RuntimeError`]            |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{CancellableFuture, TaskError, TaskSupervisor, Ticker};
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let shutdown = CancellableFuture::<()>::named("app");
//! let supervisor = TaskSupervisor::new(&shutdown);
//!
//! let signal = supervisor.final_signal().clone();
//! let poller = supervisor.add(
//!     async move {
//!         let mut ticker = Ticker::new(Duration::from_secs(5))
//!             .with_final_signal(&signal)
//!             .with_max_iterations(3);
//!         let mut ticks = ticker.start();
//!         while let Some(_tick) = ticks.next().await {
//!             // poll something
//!         }
//!         Ok::<_, TaskError>(())
//!     },
//!     false,
//! );
//!
//! supervisor.finish(None).await;
//! assert!(poller.done());
//! # }
//! ```

mod core;
mod error;
mod events;
mod policies;
mod signal;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{
    DEFAULT_MIN_WAIT, DEFAULT_RETRY_TIMEOUT, RetryConfig, RetryDriver, RetrySchedule, RetryTick,
    SupervisorBuilder, TaskHandle, TaskSupervisor, Tick, Ticker, TickerConfig, Ticks,
};
pub use error::{RuntimeError, TaskError};
pub use events::{Event, EventKind};
pub use policies::{EscalationPolicy, Step};
pub use signal::{
    CallbackId, CancellableFuture, Outcome, ResettableResult, wait_for_all, wait_for_first,
};
pub use subscribers::{EventLog, LogWriter, Subscribe};
pub use tasks::{Attempt, AttemptFn};
