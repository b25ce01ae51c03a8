//! Retry pacing policies.
//!
//! ## Contents
//! - [`EscalationPolicy`] ordered list of pacing steps, each bounded by a horizon
//! - [`Step`]             one `(period, horizon)` pair
//!
//! ## Quick wiring
//! ```text
//! RetryConfig { policy: EscalationPolicy, timeout, min_wait }
//!      └─► core::retry::RetrySchedule uses:
//!           - policy.first_period() to start the ticker
//!           - escalation.advance(elapsed) to switch to a coarser period
//! ```
//!
//! ## Defaults
//! - `EscalationPolicy::default()` → `[(3s, 15s), (5s, 30s)]`.

mod escalation;

pub use escalation::{EscalationPolicy, Step};
pub(crate) use escalation::Escalation;
