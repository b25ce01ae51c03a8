//! # Ticker: a drift-correcting interval sequence.
//!
//! A [`Ticker`] yields [`Tick`]s every `period`, measured against an absolute
//! schedule rather than from the end of the consumer's work:
//!
//! ```text
//! period = 10s, consumer works 8s per tick
//!
//! t:      0         10        20        30        40
//!         │ work 8s │ work 8s │ work 8s │ work 8s │
//!  tick:  1         2         3         4         5
//! ```
//!
//! ## Pacing
//! The ticker keeps `expected`, the absolute time of the next tick. After each
//! wakeup it moves `expected` forward by whole periods:
//! - with a `min_wait` floor (default 100ms), until the next tick is at least
//!   the floor away; the wait is rounded to milliseconds;
//! - without a floor, until the next tick is in the future.
//!
//! A slow consumer therefore skips ticks instead of receiving a burst.
//!
//! ## Lifecycle
//! ```text
//! new ──► start() ──► Ticks guard ──► next() … next() ──► drop / finish()
//!                                          │
//!                   ends when: own signal settled (parent settled, max_time),
//!                              max_iterations reached, max_time elapsed
//! ```
//! - Iterating before `start()` is a [`RuntimeError::NotStarted`] error.
//! - Teardown aborts the wake timer and the max-time deadline and cancels the
//!   ticker's own signal. It never touches the parent signal.
//! - A finished ticker yields nothing.
//!
//! ## Pause gate
//! With a pause gate, a cycle that starts while the gate is held elsewhere waits
//! for the timer **and** the gate's release (or for the signal).
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tickvisor::Ticker;
//!
//! # #[tokio::main(flavor = "current_thread", start_paused = true)]
//! # async fn main() {
//! let mut ticker = Ticker::new(Duration::from_secs(10)).with_max_iterations(3);
//! let mut ticks = ticker.start();
//!
//! let mut seen = Vec::new();
//! while let Some(tick) = ticks.next().await {
//!     seen.push(tick.iteration);
//! }
//! assert_eq!(seen, vec![1, 2, 3]);
//! # }
//! ```

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep, sleep, sleep_until};

use crate::core::config::TickerConfig;
use crate::error::RuntimeError;
use crate::signal::CancellableFuture;

/// One value of a ticker's sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tick {
    /// Tick counter, starting from 1.
    pub iteration: u64,
    /// Time until the next tick.
    pub wait: Duration,
}

#[derive(Debug)]
struct Run {
    start: Instant,
    iteration: u64,
    deadline: Option<JoinHandle<()>>,
    finished: bool,
}

/// Interval ticker with drift correction, limits and a pause gate.
#[derive(Debug)]
pub struct Ticker {
    name: Option<Arc<str>>,
    config: TickerConfig,
    pause_gate: Option<Arc<AsyncMutex<()>>>,
    signal: CancellableFuture<()>,
    expected: Option<Instant>,
    timer: Option<Pin<Box<Sleep>>>,
    run: Option<Run>,
}

impl Ticker {
    /// Creates a ticker firing every `period` with default limits.
    pub fn new(period: Duration) -> Self {
        Self::from_config(TickerConfig::every(period))
    }

    /// Creates a ticker from a full configuration.
    pub fn from_config(config: TickerConfig) -> Self {
        Self {
            name: None,
            config,
            pause_gate: None,
            signal: CancellableFuture::new(),
            expected: None,
            timer: None,
            run: None,
        }
    }

    /// Chains the ticker's own signal to `final_signal`.
    pub fn with_final_signal(mut self, final_signal: &CancellableFuture<()>) -> Self {
        self.signal = self.own_signal(Some(final_signal));
        self
    }

    /// Ends the sequence after `n` ticks (`0` = unlimited).
    pub fn with_max_iterations(mut self, n: u64) -> Self {
        self.config.max_iterations = n;
        self
    }

    /// Ends the sequence once `max` has elapsed since activation (`0s` = unlimited).
    pub fn with_max_time(mut self, max: Duration) -> Self {
        self.config.max_time = max;
        self
    }

    /// Sets the floor between two ticks (`None` disables it).
    pub fn with_min_wait(mut self, min_wait: Option<Duration>) -> Self {
        self.config.min_wait = min_wait;
        self
    }

    /// Suspends ticking while `gate` is held elsewhere.
    pub fn with_pause_gate(mut self, gate: Arc<AsyncMutex<()>>) -> Self {
        self.pause_gate = Some(gate);
        self
    }

    /// Sets the name used in errors and in the signal's `Display`.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        let parent = self.signal.parent().cloned();
        self.signal = self.own_signal(parent.as_ref());
        self
    }

    fn own_signal(&self, parent: Option<&CancellableFuture<()>>) -> CancellableFuture<()> {
        let name = self.name.as_ref().map(|n| format!("{n}::signal"));
        match (name, parent) {
            (Some(name), Some(parent)) => CancellableFuture::named_child_of(name, parent),
            (None, Some(parent)) => CancellableFuture::child_of(parent),
            (Some(name), None) => CancellableFuture::named(name),
            (None, None) => CancellableFuture::new(),
        }
    }

    /// Ticker name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current configuration (the period reflects `change_after(_, true)`).
    pub fn config(&self) -> &TickerConfig {
        &self.config
    }

    /// The ticker's own signal; cancelled on teardown.
    pub fn final_signal(&self) -> &CancellableFuture<()> {
        &self.signal
    }

    /// Returns `true` between activation and teardown.
    pub fn is_active(&self) -> bool {
        self.run.as_ref().is_some_and(|r| !r.finished)
    }

    /// Activates the sequence and returns a guard that tears it down on drop.
    ///
    /// # Panics
    /// Panics if called outside of a tokio runtime.
    pub fn start(&mut self) -> Ticks<'_> {
        self.activate();
        Ticks { ticker: self }
    }

    pub(crate) fn activate(&mut self) {
        let now = Instant::now();
        self.expected = Some(now);
        self.timer = Some(Box::pin(sleep_until(now)));

        let deadline = self.config.time_limit().map(|max| {
            let signal = self.signal.clone();
            tokio::spawn(async move {
                sleep(max).await;
                signal.cancel();
            })
        });

        self.run = Some(Run {
            start: now,
            iteration: 0,
            deadline,
            finished: false,
        });
    }

    /// Waits for the next tick.
    ///
    /// Returns `Ok(None)` once the sequence has ended.
    ///
    /// # Errors
    /// [`RuntimeError::NotStarted`] if the ticker was never activated.
    pub async fn next(&mut self) -> Result<Option<Tick>, RuntimeError> {
        let (start, iteration) = match &self.run {
            None => {
                return Err(RuntimeError::NotStarted {
                    name: self.name.as_deref().map(str::to_string),
                });
            }
            Some(run) if run.finished => return Ok(None),
            Some(run) => (run.start, run.iteration),
        };

        self.wait_for_next().await;

        let now = Instant::now();
        let ended = self.signal.done()
            || self
                .config
                .iteration_limit()
                .is_some_and(|max| iteration >= max)
            || self
                .config
                .time_limit()
                .is_some_and(|max| now.duration_since(start) >= max);
        if ended {
            self.finish();
            return Ok(None);
        }

        let wait = self.advance(now);
        self.timer = Some(Box::pin(sleep(wait)));

        let iteration = iteration + 1;
        if let Some(run) = self.run.as_mut() {
            run.iteration = iteration;
        }
        Ok(Some(Tick { iteration, wait }))
    }

    async fn wait_for_next(&mut self) {
        let signal = self.signal.clone();
        let held_gate = self
            .pause_gate
            .as_ref()
            .filter(|gate| gate.try_lock().is_err())
            .cloned();
        let timer = self.timer.as_mut();

        let wake = async move {
            match timer {
                Some(timer) => timer.await,
                None => std::future::pending::<()>().await,
            }
            if let Some(gate) = held_gate {
                drop(gate.lock().await);
            }
        };

        tokio::select! {
            _ = signal.settled() => {}
            _ = wake => {}
        }
    }

    /// Moves `expected` forward and returns the wait until the next tick.
    fn advance(&mut self, now: Instant) -> Duration {
        let period = self.config.period;
        let mut expected = self.expected.unwrap_or(now);

        let floor = match self.config.min_wait {
            Some(floor) => Some(floor),
            None if period.is_zero() => Some(Duration::ZERO),
            None => None,
        };

        let wait = match floor {
            None => {
                if expected <= now {
                    let steps = (now - expected).as_nanos() / period.as_nanos() + 1;
                    expected = shift(expected, period, steps);
                }
                expected - now
            }
            Some(floor) if period.is_zero() => floor,
            Some(floor) => {
                let target = now + floor;
                if expected < target {
                    let steps = (target - expected).as_nanos().div_ceil(period.as_nanos());
                    expected = shift(expected, period, steps);
                }
                round_ms(expected - now)
            }
        };

        self.expected = Some(expected);
        wait
    }

    /// Reschedules the next tick to `period` after the previous tick's anchor.
    ///
    /// With `set_as_default`, `period` also becomes the cadence for the ticks
    /// that follow; otherwise only the next tick moves. Before activation only
    /// the period is updated. Returns the new wait until the next tick.
    pub fn change_after(&mut self, period: Duration, set_as_default: bool) -> Option<Duration> {
        let old = self.config.period;
        if set_as_default {
            self.config.period = period;
        }

        let expected = self.expected?;
        if !self.is_active() {
            return None;
        }

        let last = expected.checked_sub(old).unwrap_or(expected);
        let next = last + period;
        if set_as_default {
            self.expected = Some(next);
        }

        let wait = round_ms(next.saturating_duration_since(Instant::now()));
        self.timer = Some(Box::pin(sleep(wait)));
        Some(wait)
    }

    /// Tears the sequence down. Safe to call more than once.
    pub fn finish(&mut self) {
        self.timer = None;
        if let Some(run) = self.run.as_mut() {
            if let Some(deadline) = run.deadline.take() {
                deadline.abort();
            }
            run.finished = true;
        }
        self.signal.cancel();
    }
}

fn shift(at: Instant, period: Duration, steps: u128) -> Instant {
    let nanos = period.as_nanos().saturating_mul(steps);
    let by = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
    at.checked_add(by).unwrap_or(at)
}

pub(crate) fn round_ms(d: Duration) -> Duration {
    let ms = (d.as_micros() + 500) / 1000;
    Duration::from_millis(u64::try_from(ms).unwrap_or(u64::MAX))
}

/// Activated ticker; tears the sequence down when dropped.
#[derive(Debug)]
pub struct Ticks<'a> {
    ticker: &'a mut Ticker,
}

impl Ticks<'_> {
    /// Waits for the next tick; `None` once the sequence has ended.
    pub async fn next(&mut self) -> Option<Tick> {
        self.ticker.next().await.ok().flatten()
    }

    /// See [`Ticker::change_after`].
    pub fn change_after(&mut self, period: Duration, set_as_default: bool) -> Option<Duration> {
        self.ticker.change_after(period, set_as_default)
    }

    /// The underlying ticker.
    pub fn ticker(&self) -> &Ticker {
        self.ticker
    }
}

impl Drop for Ticks<'_> {
    fn drop(&mut self) {
        self.ticker.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn assert_near(actual: &[Duration], expected: &[Duration]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            let diff = if a > e { *a - *e } else { *e - *a };
            assert!(diff <= Duration::from_millis(50), "{actual:?} vs {expected:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_absolute_schedule() {
        let mut ticker = Ticker::new(secs(10));
        let start = Instant::now();
        let mut ticks = ticker.start();

        let mut times = Vec::new();
        while let Some(_tick) = ticks.next().await {
            times.push(start.elapsed());
            if times.len() == 5 {
                break;
            }
            sleep(secs(8)).await;
        }
        assert_near(&times, &[secs(0), secs(10), secs(20), secs(30), secs(40)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_consumer_skips_ticks() {
        let mut ticker = Ticker::new(secs(10)).with_max_iterations(3);
        let start = Instant::now();
        let mut ticks = ticker.start();

        let mut times = Vec::new();
        while let Some(tick) = ticks.next().await {
            times.push(start.elapsed());
            if tick.iteration == 1 {
                sleep(secs(25)).await;
            }
        }
        assert_near(&times, &[secs(0), secs(25), secs(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_after_for_one_tick() {
        let mut ticker = Ticker::new(secs(10));
        let start = Instant::now();
        let mut ticks = ticker.start();

        let mut times = Vec::new();
        while let Some(tick) = ticks.next().await {
            times.push(start.elapsed());
            if tick.iteration == 3 {
                let wait = ticks.change_after(secs(20), false);
                assert_near(&[wait.unwrap_or_default()], &[secs(20)]);
            }
            if tick.iteration == 5 {
                break;
            }
        }
        assert_near(&times, &[secs(0), secs(10), secs(20), secs(40), secs(50)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_after_as_default() {
        let mut ticker = Ticker::new(secs(10));
        let start = Instant::now();
        let mut ticks = ticker.start();

        let mut times = Vec::new();
        while let Some(tick) = ticks.next().await {
            times.push(start.elapsed());
            if tick.iteration == 3 {
                ticks.change_after(secs(20), true);
            }
            if tick.iteration == 5 {
                break;
            }
        }
        drop(ticks);
        assert_near(&times, &[secs(0), secs(10), secs(20), secs(40), secs(60)]);
        assert_eq!(ticker.config().period, secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_after_before_start_only_sets_period() {
        let mut ticker = Ticker::new(secs(10));
        assert_eq!(ticker.change_after(secs(3), true), None);
        assert_eq!(ticker.config().period, secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_iterations() {
        let mut ticker = Ticker::new(secs(1)).with_max_iterations(4);
        let mut ticks = ticker.start();
        let mut n = 0;
        while ticks.next().await.is_some() {
            n += 1;
        }
        assert_eq!(n, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_time_ends_sequence() {
        let mut ticker = Ticker::new(secs(1)).with_max_time(Duration::from_millis(3500));
        let start = Instant::now();
        let mut ticks = ticker.start();
        let mut n = 0;
        while ticks.next().await.is_some() {
            n += 1;
        }
        assert_eq!(n, 4);
        assert_near(&[start.elapsed()], &[Duration::from_millis(3500)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_signal_ends_sequence() {
        let parent = CancellableFuture::new();
        let mut ticker = Ticker::new(secs(10)).with_final_signal(&parent);

        let p = parent.clone();
        tokio::spawn(async move {
            sleep(secs(25)).await;
            p.cancel();
        });

        let mut ticks = ticker.start();
        let mut n = 0;
        while ticks.next().await.is_some() {
            n += 1;
        }
        assert_eq!(n, 3);
        assert!(ticks.ticker().final_signal().cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_before_start_is_misuse() {
        let mut ticker = Ticker::new(secs(1)).with_name("probe");
        let err = ticker.next().await.unwrap_err();
        assert_eq!(
            err,
            RuntimeError::NotStarted {
                name: Some("probe".into())
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_drop_tears_down_own_signal_only() {
        let parent = CancellableFuture::new();
        let mut ticker = Ticker::new(secs(1))
            .with_final_signal(&parent)
            .with_max_time(secs(60));
        {
            let mut ticks = ticker.start();
            assert!(ticks.next().await.is_some());
        }
        assert!(ticker.final_signal().cancelled());
        assert!(!parent.done());
        assert!(!ticker.is_active());
        assert_eq!(ticker.next().await, Ok(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_gate_suspends_ticking() {
        let gate = Arc::new(AsyncMutex::new(()));
        let held = Arc::clone(&gate).lock_owned().await;
        tokio::spawn(async move {
            sleep(secs(25)).await;
            drop(held);
        });

        let mut ticker = Ticker::new(secs(10)).with_pause_gate(gate);
        let start = Instant::now();
        let mut ticks = ticker.start();

        let mut times = Vec::new();
        while let Some(tick) = ticks.next().await {
            times.push(start.elapsed());
            if tick.iteration == 2 {
                break;
            }
        }
        assert_near(&times, &[secs(25), secs(30)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_floor_ticks_stay_on_grid() {
        let mut ticker = Ticker::new(secs(10))
            .with_min_wait(None)
            .with_max_iterations(3);
        let start = Instant::now();
        let mut ticks = ticker.start();

        let mut waits = Vec::new();
        let mut times = Vec::new();
        while let Some(tick) = ticks.next().await {
            times.push(start.elapsed());
            waits.push(tick.wait);
            if tick.iteration == 1 {
                sleep(Duration::from_millis(9_990)).await;
            }
        }
        assert_near(&times, &[secs(0), secs(10), secs(20)]);
        assert_near(&waits, &[secs(10), secs(10), secs(10)]);
    }

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(Duration::from_micros(1_499)), Duration::from_millis(1));
        assert_eq!(round_ms(Duration::from_micros(1_500)), Duration::from_millis(2));
    }
}
