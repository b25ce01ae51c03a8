//! # Attempt abstractions.
//!
//! - [`Attempt`]   trait for one try at an unreliable operation
//! - [`AttemptFn`] closure-backed implementation

mod attempt;

pub use attempt::{Attempt, AttemptFn};
