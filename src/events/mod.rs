//! Runtime events: types only.
//!
//! Events are produced by [`RetryDriver`](crate::RetryDriver) and
//! [`TaskSupervisor`](crate::TaskSupervisor) and handed synchronously to the
//! configured [`Subscribe`](crate::Subscribe) sink.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata

mod event;

pub use event::{Event, EventKind};
