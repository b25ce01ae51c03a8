//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait and built-in implementations
//! for handling events emitted by the retry driver and the task supervisor.
//!
//! ## Architecture
//! ```text
//! RetryDriver / TaskSupervisor ── emit(Event) ──► Reporter
//!                                                   │
//!                                   sink configured? ├── yes ──► Subscribe::on_event(&Event)
//!                                                   │              (closure, EventLog, custom)
//!                                                   └── no  ──► LogWriter (tracing)
//! ```

mod log;
mod recorder;
mod reporter;
mod subscribe;

pub use log::LogWriter;
pub use recorder::EventLog;
pub use subscribe::Subscribe;

pub(crate) use reporter::Reporter;
