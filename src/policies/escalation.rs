//! # Escalating retry pacing.
//!
//! [`EscalationPolicy`] is an ordered list of [`Step`]s. A retry starts ticking
//! at the first step's period; once the elapsed time exceeds the active step's
//! horizon, the next step takes over.
//!
//! ```text
//! elapsed:  0 ──────── 15s ──────────── 30s ─────────────►
//! period:      3s    │       5s        │      5s (held)
//!                    └ horizon (3s)    └ horizon (5s), no more steps
//! ```
//!
//! ## Rules
//! - A policy has at least one step ([`RuntimeError::EmptyPolicy`] otherwise).
//! - Escalation happens only when elapsed is **strictly** past the horizon.
//! - A step without a horizon never escalates.
//! - After the last step, the period is held indefinitely.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::{EscalationPolicy, Step};
//!
//! let policy = EscalationPolicy::new([
//!     Step::until(Duration::from_secs(1), Duration::from_secs(10)),
//!     Step::forever(Duration::from_secs(5)),
//! ])
//! .unwrap();
//!
//! assert_eq!(policy.first_period(), Duration::from_secs(1));
//! assert_eq!(policy.steps().len(), 2);
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::RuntimeError;

/// One pacing step: tick every `period` until `horizon` has elapsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Step {
    /// Interval between attempts while this step is active.
    pub period: Duration,
    /// Elapsed time after which the next step takes over (`None` = never).
    pub horizon: Option<Duration>,
}

impl Step {
    /// Step that is active until `horizon` has elapsed.
    pub fn until(period: Duration, horizon: Duration) -> Self {
        Self {
            period,
            horizon: Some(horizon),
        }
    }

    /// Step that never escalates.
    pub fn forever(period: Duration) -> Self {
        Self {
            period,
            horizon: None,
        }
    }
}

impl From<(Duration, Duration)> for Step {
    fn from((period, horizon): (Duration, Duration)) -> Self {
        Step::until(period, horizon)
    }
}

/// Ordered escalation steps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscalationPolicy {
    steps: Vec<Step>,
}

impl Default for EscalationPolicy {
    /// Returns `[(3s, 15s), (5s, 30s)]`.
    fn default() -> Self {
        Self {
            steps: vec![
                Step::until(Duration::from_secs(3), Duration::from_secs(15)),
                Step::until(Duration::from_secs(5), Duration::from_secs(30)),
            ],
        }
    }
}

impl EscalationPolicy {
    /// Builds a policy from steps.
    ///
    /// # Errors
    /// [`RuntimeError::EmptyPolicy`] if `steps` is empty.
    pub fn new<I, S>(steps: I) -> Result<Self, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<Step>,
    {
        let steps: Vec<Step> = steps.into_iter().map(Into::into).collect();
        if steps.is_empty() {
            return Err(RuntimeError::EmptyPolicy);
        }
        Ok(Self { steps })
    }

    /// Returns the steps in order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Returns the period a retry starts with.
    pub fn first_period(&self) -> Duration {
        self.steps[0].period
    }

    pub(crate) fn escalation(&self) -> Escalation {
        let mut remaining: VecDeque<Step> = self.steps.iter().copied().collect();
        let first = remaining.pop_front().unwrap_or(Step::forever(Duration::ZERO));
        Escalation {
            period: first.period,
            horizon: first.horizon,
            remaining,
        }
    }
}

/// Progress through an [`EscalationPolicy`] during one retry.
#[derive(Debug)]
pub(crate) struct Escalation {
    period: Duration,
    horizon: Option<Duration>,
    remaining: VecDeque<Step>,
}

impl Escalation {
    pub(crate) fn period(&self) -> Duration {
        self.period
    }

    #[cfg(test)]
    pub(crate) fn horizon(&self) -> Option<Duration> {
        self.horizon
    }

    /// Moves to the next step if `elapsed` is past the active horizon.
    ///
    /// Returns the new period when a step was taken.
    pub(crate) fn advance(&mut self, elapsed: Duration) -> Option<Duration> {
        let horizon = self.horizon?;
        if elapsed <= horizon {
            return None;
        }
        match self.remaining.pop_front() {
            Some(step) => {
                self.period = step.period;
                self.horizon = step.horizon;
                Some(step.period)
            }
            None => {
                self.horizon = None;
                None
            }
        }
    }
}
