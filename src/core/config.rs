//! # Ticker and retry configuration.
//!
//! Provides [`TickerConfig`] and [`RetryConfig`], plain settings structs with
//! defaults and sentinel-aware accessors.
//!
//! ## Sentinel values
//! - `max_iterations = 0` → unlimited
//! - `max_time = 0s` → no time limit
//! - `min_wait = None` → no floor between ticks
//! - `RetryConfig::timeout = 0s` → retry until success, fatal failure or shutdown

use std::time::Duration;

use crate::policies::EscalationPolicy;

/// Default floor between two ticks.
pub const DEFAULT_MIN_WAIT: Duration = Duration::from_millis(100);

/// Default overall retry budget.
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings of a [`Ticker`](crate::Ticker).
///
/// ## Field semantics
/// - `period`: interval between ticks (`0s` = as fast as the floor allows)
/// - `max_iterations`: number of ticks before the sequence ends (`0` = unlimited)
/// - `max_time`: time after activation at which the sequence ends (`0s` = unlimited)
/// - `min_wait`: minimum gap between two ticks (`None` = no floor)
///
/// ## Notes
/// All fields are public for flexibility. Prefer using helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickerConfig {
    /// Interval between ticks.
    pub period: Duration,

    /// Maximum number of ticks.
    ///
    /// - `0` = unlimited
    /// - `n > 0` = the sequence ends after `n` ticks
    pub max_iterations: u64,

    /// Maximum lifetime of the sequence, measured from activation.
    ///
    /// - `Duration::ZERO` = unlimited
    /// - `> 0` = the ticker's own signal is cancelled once this elapses
    pub max_time: Duration,

    /// Minimum gap between two ticks.
    ///
    /// When set, the next tick is pushed forward by whole periods until it is at
    /// least this far away, which keeps ticks apart after a slow consumer.
    pub min_wait: Option<Duration>,
}

impl TickerConfig {
    /// Returns a config ticking every `period`, with default limits.
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            ..Self::default()
        }
    }

    /// Returns the iteration limit as an `Option`.
    #[inline]
    pub fn iteration_limit(&self) -> Option<u64> {
        if self.max_iterations == 0 {
            None
        } else {
            Some(self.max_iterations)
        }
    }

    /// Returns the time limit as an `Option`.
    #[inline]
    pub fn time_limit(&self) -> Option<Duration> {
        if self.max_time == Duration::ZERO {
            None
        } else {
            Some(self.max_time)
        }
    }
}

impl Default for TickerConfig {
    /// Default configuration:
    ///
    /// - `period = 0s`
    /// - `max_iterations = 0` (unlimited)
    /// - `max_time = 0s` (unlimited)
    /// - `min_wait = 100ms`
    fn default() -> Self {
        Self {
            period: Duration::ZERO,
            max_iterations: 0,
            max_time: Duration::ZERO,
            min_wait: Some(DEFAULT_MIN_WAIT),
        }
    }
}

/// Settings of a [`RetryDriver`](crate::RetryDriver).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Escalation steps; the first step's period starts the retry.
    pub policy: EscalationPolicy,

    /// Overall retry budget (`Duration::ZERO` = unlimited).
    pub timeout: Duration,

    /// Minimum gap between two attempts (`None` = no floor).
    pub min_wait: Option<Duration>,
}

impl RetryConfig {
    /// Returns the default budget as an `Option`.
    #[inline]
    pub fn time_limit(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }
}

impl Default for RetryConfig {
    /// Default configuration:
    ///
    /// - `policy = [(3s, 15s), (5s, 30s)]`
    /// - `timeout = 30s`
    /// - `min_wait = 100ms`
    fn default() -> Self {
        Self {
            policy: EscalationPolicy::default(),
            timeout: DEFAULT_RETRY_TIMEOUT,
            min_wait: Some(DEFAULT_MIN_WAIT),
        }
    }
}
