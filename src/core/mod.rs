//! Runtime core: periodic scheduling, retry driving and task supervision.
//!
//! - [`Ticker`] produces a clock-aligned sequence of ticks.
//! - [`RetryDriver`] runs an [`Attempt`](crate::Attempt) on an escalating schedule.
//! - [`TaskSupervisor`] owns background [`TaskHandle`]s tied to a final signal.

mod builder;
mod config;
mod handle;
mod retry;
mod supervisor;
mod ticker;

pub use builder::SupervisorBuilder;
pub use config::{DEFAULT_MIN_WAIT, DEFAULT_RETRY_TIMEOUT, RetryConfig, TickerConfig};
pub use handle::TaskHandle;
pub use retry::{RetryDriver, RetrySchedule, RetryTick};
pub use supervisor::TaskSupervisor;
pub use ticker::{Tick, Ticker, Ticks};
