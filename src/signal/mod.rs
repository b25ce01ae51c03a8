//! Chained futures and the helpers built on them.
//!
//! ## Contents
//! - [`CancellableFuture`] result slot that follows a parent (cancellation/failure propagation)
//! - [`ResettableResult`]  single-slot cell that can be cleared and reused
//! - [`Outcome`]           final state of a settled future
//! - [`wait_for_all`] / [`wait_for_first`] waiting on groups of futures
//!
//! ```text
//! shutdown (root)
//!   ├─► supervisor signal ──► task handles
//!   └─► ticker signal     ──► max-time deadline
//! ```
//! Settling the root tears down everything chained beneath it.

mod cancellable;
mod resettable;
mod slot;
mod wait;

pub use cancellable::CancellableFuture;
pub use resettable::ResettableResult;
pub use slot::{CallbackId, Outcome};
pub use wait::{wait_for_all, wait_for_first};

pub(crate) use slot::lock;
