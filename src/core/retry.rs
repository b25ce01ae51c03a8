//! # RetryDriver: escalating retries on top of a [`Ticker`].
//!
//! ```text
//! RetryDriver::retry(attempt, signal, timeout)
//!   └─► RetrySchedule (Ticker at the first step's period, max_time = timeout)
//!         tick ─► elapsed > horizon? ─► next step: change_after(period, true)
//!              └► attempt(time_left, time_to_next)
//!                   Ok(v)            → return Ok(v)
//!                   Fail / Timeout   → record, report, wait for next tick
//!                   anything else    → return Err(e)
//!   sequence ends → Err(last recorded failure) or Err(Exhausted { attempts })
//! ```
//!
//! ## Rules
//! - The driver is stateless across `retry` calls; each call owns one ticker.
//! - The error surfaced on exhaustion is the most recent attempt failure.
//! - Cancellation of `signal` ends the schedule at the next tick boundary; an
//!   in-flight attempt is not interrupted.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//! use tickvisor::{AttemptFn, CancellableFuture, EscalationPolicy, RetryDriver, TaskError};
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let shutdown = CancellableFuture::<()>::new();
//! let driver = RetryDriver::new(EscalationPolicy::default()).with_name("link");
//!
//! let calls = Arc::new(AtomicU32::new(0));
//! let counter = Arc::clone(&calls);
//! let attempt = AttemptFn::new("link-up", move |_left: Duration, _next: Duration| {
//!     let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
//!     async move {
//!         if n < 3 { Err(TaskError::fail("no carrier")) } else { Ok(n) }
//!     }
//! });
//!
//! let n = driver.retry(&attempt, &shutdown, None).await.unwrap();
//! assert_eq!(n, 3);
//! assert_eq!(calls.load(Ordering::SeqCst), 3);
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::core::config::{RetryConfig, TickerConfig};
use crate::core::ticker::{Ticker, round_ms};
use crate::error::TaskError;
use crate::events::{Event, EventKind};
use crate::policies::{Escalation, EscalationPolicy};
use crate::signal::CancellableFuture;
use crate::subscribers::{Reporter, Subscribe};
use crate::tasks::Attempt;

/// One value of a [`RetrySchedule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryTick {
    /// Tick counter, starting from 1.
    pub iteration: u64,
    /// Remaining budget, rounded to milliseconds (`Duration::MAX` without a timeout).
    pub time_left: Duration,
    /// Time until the next tick, after any escalation.
    pub wait: Duration,
}

/// Escalating tick stream of one retry.
///
/// Owns an activated [`Ticker`]; dropping the schedule tears it down.
#[derive(Debug)]
pub struct RetrySchedule {
    name: Option<Arc<str>>,
    ticker: Ticker,
    escalation: Escalation,
    start: Instant,
    deadline: Option<Instant>,
    reporter: Reporter,
}

impl RetrySchedule {
    /// Waits for the next tick; `None` once the budget is spent or the signal settled.
    pub async fn next(&mut self) -> Option<RetryTick> {
        let tick = self.ticker.next().await.ok().flatten()?;
        let now = Instant::now();

        let mut wait = tick.wait;
        if let Some(period) = self.escalation.advance(now.duration_since(self.start)) {
            self.reporter.emit(
                Event::new(EventKind::RetryEscalated)
                    .with_source_opt(self.name.as_ref())
                    .with_attempt(u32::try_from(tick.iteration).unwrap_or(u32::MAX))
                    .with_period(period),
            );
            if let Some(changed) = self.ticker.change_after(period, true) {
                wait = changed;
            }
        }

        let time_left = match self.deadline {
            Some(deadline) => round_ms(deadline.saturating_duration_since(now)),
            None => Duration::MAX,
        };

        Some(RetryTick {
            iteration: tick.iteration,
            time_left,
            wait,
        })
    }

    /// Period currently in effect.
    pub fn period(&self) -> Duration {
        self.escalation.period()
    }

    /// Tears the schedule down early.
    pub fn finish(&mut self) {
        self.ticker.finish();
    }
}

impl Drop for RetrySchedule {
    fn drop(&mut self) {
        self.ticker.finish();
    }
}

/// Retries an [`Attempt`] on an escalating schedule.
#[derive(Clone, Debug)]
pub struct RetryDriver {
    name: Option<Arc<str>>,
    config: RetryConfig,
    reporter: Reporter,
}

impl Default for RetryDriver {
    fn default() -> Self {
        Self::from_config(RetryConfig::default())
    }
}

impl RetryDriver {
    /// Creates a driver with `policy` and default timeout/floor.
    pub fn new(policy: EscalationPolicy) -> Self {
        Self::from_config(RetryConfig {
            policy,
            ..RetryConfig::default()
        })
    }

    /// Creates a driver from a full configuration.
    pub fn from_config(config: RetryConfig) -> Self {
        Self {
            name: None,
            config,
            reporter: Reporter::default(),
        }
    }

    /// Sets the floor between two attempts (`None` disables it).
    pub fn with_min_wait(mut self, min_wait: Option<Duration>) -> Self {
        self.config.min_wait = min_wait;
        self
    }

    /// Sets the default budget used when `retry` is not given one (`0s` = unlimited).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the sink that receives retry progress.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.reporter = Reporter::new(Some(subscriber));
        self
    }

    /// Sets the name used as event source.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Starts an escalating tick stream chained to `signal`.
    ///
    /// `timeout` overrides the configured budget; `Some(Duration::ZERO)` means unlimited.
    pub fn schedule(
        &self,
        signal: &CancellableFuture<()>,
        timeout: Option<Duration>,
    ) -> RetrySchedule {
        let budget = timeout.unwrap_or(self.config.timeout);
        let escalation = self.config.policy.escalation();

        let ticker_name = match &self.name {
            Some(name) => format!("{name}::ticker"),
            None => "retry::ticker".to_string(),
        };
        let mut ticker = Ticker::from_config(TickerConfig {
            period: escalation.period(),
            max_iterations: 0,
            max_time: budget,
            min_wait: self.config.min_wait,
        })
        .with_name(ticker_name)
        .with_final_signal(signal);
        ticker.activate();

        let start = Instant::now();
        RetrySchedule {
            name: self.name.clone(),
            ticker,
            escalation,
            start,
            deadline: (!budget.is_zero()).then(|| start + budget),
            reporter: self.reporter.clone(),
        }
    }

    /// Calls `attempt` on every tick until it succeeds, fails fatally or the
    /// schedule ends.
    ///
    /// # Errors
    /// - the first non-retryable error returned by `attempt`;
    /// - on exhaustion, the last retryable error, or [`TaskError::Exhausted`]
    ///   if no attempt ever failed (e.g. `signal` was already settled).
    pub async fn retry<T, A>(
        &self,
        attempt: &A,
        signal: &CancellableFuture<()>,
        timeout: Option<Duration>,
    ) -> Result<T, TaskError>
    where
        T: Send + 'static,
        A: Attempt<T> + ?Sized,
    {
        let mut schedule = self.schedule(signal, timeout);
        let mut last_error: Option<TaskError> = None;
        let mut attempts: u32 = 0;

        while let Some(tick) = schedule.next().await {
            attempts = attempts.saturating_add(1);
            match attempt.attempt(tick.time_left, tick.wait).await {
                Ok(value) => {
                    self.reporter.emit(
                        Event::new(EventKind::RetrySucceeded)
                            .with_source_opt(self.name.as_ref())
                            .with_attempt(attempts),
                    );
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    self.reporter.emit(
                        Event::new(EventKind::AttemptFailed)
                            .with_source_opt(self.name.as_ref())
                            .with_attempt(attempts)
                            .with_delay(tick.wait)
                            .with_error(&err),
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        let err = last_error.unwrap_or(TaskError::Exhausted { attempts });
        self.reporter.emit(
            Event::new(EventKind::RetryExhausted)
                .with_source_opt(self.name.as_ref())
                .with_attempt(attempts)
                .with_error(&err),
        );
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::Step;
    use crate::subscribers::EventLog;
    use crate::tasks::AttemptFn;
    use std::sync::Mutex;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn near(a: Duration, e: Duration) -> bool {
        let diff = if a > e { a - e } else { e - a };
        diff <= Duration::from_millis(50)
    }

    #[tokio::test(start_paused = true)]
    async fn test_spacing_escalates_and_last_failure_surfaces() {
        let shutdown = CancellableFuture::new();
        let log = Arc::new(EventLog::new());
        let policy = EscalationPolicy::new([(secs(1), secs(10)), (secs(5), secs(30))]).unwrap();
        let driver = RetryDriver::new(policy)
            .with_name("flaky")
            .with_subscriber(log.clone());

        let start = Instant::now();
        let times = Arc::new(Mutex::new(Vec::new()));
        let t = Arc::clone(&times);
        let attempt = AttemptFn::new("always-fails", move |_left: Duration, _next: Duration| {
            let mut times = t.lock().unwrap();
            times.push(start.elapsed());
            let n = times.len();
            async move { Err::<(), _>(TaskError::fail(format!("attempt {n}"))) }
        });

        let err = driver
            .retry(&attempt, &shutdown, Some(secs(40)))
            .await
            .unwrap_err();

        let expected: Vec<Duration> = (0..=11)
            .chain([16, 21, 26, 31, 36])
            .map(secs)
            .collect();
        let times = times.lock().unwrap().clone();
        assert_eq!(times.len(), expected.len(), "{times:?}");
        assert!(times.iter().zip(&expected).all(|(a, e)| near(*a, *e)), "{times:?}");

        assert_eq!(err, TaskError::fail("attempt 17"));
        assert_eq!(log.count(EventKind::RetryEscalated), 1);
        assert_eq!(log.count(EventKind::AttemptFailed), 17);
        assert_eq!(log.count(EventKind::RetryExhausted), 1);
        assert!(!shutdown.done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures() {
        let shutdown = CancellableFuture::new();
        let log = Arc::new(EventLog::new());
        let driver = RetryDriver::default().with_subscriber(log.clone());

        let calls = Arc::new(Mutex::new(0u32));
        let c = Arc::clone(&calls);
        let attempt = AttemptFn::new("third-time", move |_l: Duration, _n: Duration| {
            let mut calls = c.lock().unwrap();
            *calls += 1;
            let n = *calls;
            async move {
                if n < 3 {
                    Err(TaskError::Timeout { timeout: secs(1) })
                } else {
                    Ok("up")
                }
            }
        });

        let start = Instant::now();
        assert_eq!(driver.retry(&attempt, &shutdown, None).await, Ok("up"));
        assert!(near(start.elapsed(), secs(6)));
        assert_eq!(
            log.kinds(),
            vec![
                EventKind::AttemptFailed,
                EventKind::AttemptFailed,
                EventKind::RetrySucceeded
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failure_stops_immediately() {
        let shutdown = CancellableFuture::new();
        let driver = RetryDriver::default();
        let calls = Arc::new(Mutex::new(0u32));
        let c = Arc::clone(&calls);
        let attempt = AttemptFn::new("fatal", move |_l: Duration, _n: Duration| {
            *c.lock().unwrap() += 1;
            async { Err::<(), _>(TaskError::fatal("bad credentials")) }
        });

        let err = driver.retry(&attempt, &shutdown, None).await.unwrap_err();
        assert_eq!(err, TaskError::fatal("bad credentials"));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_signal_exhausts_without_attempts() {
        let shutdown = CancellableFuture::new();
        shutdown.cancel();
        let driver = RetryDriver::default();
        let attempt = AttemptFn::new("never", |_l: Duration, _n: Duration| async {
            Ok::<_, TaskError>(())
        });

        let err = driver.retry(&attempt, &shutdown, None).await.unwrap_err();
        assert_eq!(err, TaskError::Exhausted { attempts: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_reports_time_left() {
        let shutdown = CancellableFuture::new();
        let driver = RetryDriver::new(EscalationPolicy::new([Step::forever(secs(2))]).unwrap());
        let mut schedule = driver.schedule(&shutdown, Some(secs(5)));

        let mut seen = Vec::new();
        while let Some(tick) = schedule.next().await {
            seen.push(tick);
        }
        assert_eq!(seen.len(), 3);
        assert!(near(seen[0].time_left, secs(5)));
        assert!(near(seen[1].time_left, secs(3)));
        assert!(near(seen[2].time_left, secs(1)));
        assert!(seen.iter().all(|t| near(t.wait, secs(2))));
        assert_eq!(schedule.period(), secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelling_signal_ends_retry() {
        let shutdown = CancellableFuture::new();
        let driver = RetryDriver::new(EscalationPolicy::new([Step::forever(secs(1))]).unwrap())
            .with_timeout(Duration::ZERO);

        let s = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2_500)).await;
            s.cancel();
        });

        let attempt = AttemptFn::new("down", |_l: Duration, _n: Duration| async {
            Err::<(), _>(TaskError::fail("still down"))
        });
        let err = driver.retry(&attempt, &shutdown, None).await.unwrap_err();
        assert_eq!(err, TaskError::fail("still down"));
    }
}
