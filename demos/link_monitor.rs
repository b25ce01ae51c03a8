//! # Demo: link_monitor
//!
//! Brings a flaky link up with escalating retries, then polls it on a fixed
//! cadence until the poll budget runs out. Everything runs under one
//! supervisor chained to an application shutdown signal.
//!
//! ## Flow
//! ```text
//! shutdown (root)
//!   └─► TaskSupervisor
//!         └─► task "link"
//!               ├─► RetryDriver::retry(connect)   AttemptFailed ×2, RetrySucceeded
//!               └─► Ticker (300ms × 5)            poll on every tick
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example link_monitor
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tickvisor::{
    AttemptFn, CancellableFuture, EscalationPolicy, Event, EventKind, RetryDriver, Step,
    Subscribe, TaskError, TaskSupervisor, Ticker,
};

/// Prints retry and supervision events to stdout.
struct ConsoleSubscriber;

impl Subscribe for ConsoleSubscriber {
    fn on_event(&self, ev: &Event) {
        let source = ev.source.as_deref().unwrap_or("<unknown>");
        match ev.kind {
            EventKind::AttemptFailed => println!(
                "[sub] attempt failed: source={source} attempt={} next_in={}ms reason={}",
                ev.attempt.unwrap_or(0),
                ev.delay_ms.unwrap_or(0),
                ev.reason.as_deref().unwrap_or("<none>")
            ),
            EventKind::RetryEscalated => println!(
                "[sub] escalated:      source={source} period={}ms",
                ev.period_ms.unwrap_or(0)
            ),
            EventKind::RetrySucceeded => println!(
                "[sub] link up:        source={source} attempt={}",
                ev.attempt.unwrap_or(0)
            ),
            _ => println!("[sub] {}: source={source}", ev.kind.as_label()),
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let console: Arc<dyn Subscribe> = Arc::new(ConsoleSubscriber);
    let shutdown = CancellableFuture::<()>::named("app");

    let supervisor = TaskSupervisor::builder(&shutdown)
        .with_name("monitor")
        .with_subscriber(Arc::clone(&console))
        .build();

    let policy = EscalationPolicy::new([
        Step::until(Duration::from_millis(200), Duration::from_millis(300)),
        Step::forever(Duration::from_millis(500)),
    ])?;
    let driver = RetryDriver::new(policy)
        .with_name("link")
        .with_timeout(Duration::from_secs(5))
        .with_subscriber(console);

    let signal = supervisor.final_signal().clone();
    supervisor.add_named(
        "link",
        async move {
            let tries = Arc::new(AtomicU32::new(0));
            let counter = Arc::clone(&tries);
            let connect = AttemptFn::new("connect", move |left: Duration, _next: Duration| {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(TaskError::fail(format!("no carrier (budget left {left:?})")))
                    } else {
                        Ok(n)
                    }
                }
            });
            let attempts = driver.retry(&connect, &signal, None).await?;
            println!("[link] connected after {attempts} attempts");

            let mut ticker = Ticker::new(Duration::from_millis(300))
                .with_name("poll")
                .with_final_signal(&signal)
                .with_max_iterations(5);
            let mut ticks = ticker.start();
            while let Some(tick) = ticks.next().await {
                println!("[link] poll #{} (next in {:?})", tick.iteration, tick.wait);
            }
            Ok(())
        },
        false,
    );

    supervisor.finish(None).await;
    println!("[main] done: {}", supervisor.final_signal());
    Ok(())
}
