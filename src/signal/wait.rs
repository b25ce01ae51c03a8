//! # Waiting on groups of futures.
//!
//! Both helpers return once their condition holds, regardless of whether the
//! futures resolved, failed or were cancelled. Empty input returns immediately.

use futures::future::{join_all, select_all};

use crate::signal::cancellable::CancellableFuture;

/// Waits until every future in `futs` has settled.
pub async fn wait_for_all<T: Clone + Send + 'static>(futs: &[CancellableFuture<T>]) {
    if futs.is_empty() {
        return;
    }
    join_all(futs.iter().map(|f| f.settled())).await;
}

/// Waits until the first future in `futs` has settled.
pub async fn wait_for_first<T: Clone + Send + 'static>(futs: &[CancellableFuture<T>]) {
    if futs.is_empty() {
        return;
    }
    select_all(futs.iter().map(|f| Box::pin(f.settled()))).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    fn near(a: Duration, e: Duration) -> bool {
        let diff = if a > e { a - e } else { e - a };
        diff <= Duration::from_millis(50)
    }

    fn settle_after(fut: &CancellableFuture<()>, secs: u64) {
        let f = fut.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            f.cancel();
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_all_waits_for_slowest() {
        let start = Instant::now();
        let futs: Vec<CancellableFuture<()>> = (0..3).map(|_| CancellableFuture::new()).collect();
        for (i, f) in futs.iter().enumerate() {
            settle_after(f, i as u64 + 1);
        }
        wait_for_all(&futs).await;
        assert!(near(start.elapsed(), Duration::from_secs(3)));
        assert!(futs.iter().all(|f| f.done()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_first_returns_on_fastest() {
        let start = Instant::now();
        let futs: Vec<CancellableFuture<()>> = (0..3).map(|_| CancellableFuture::new()).collect();
        settle_after(&futs[2], 2);
        settle_after(&futs[0], 5);
        wait_for_first(&futs).await;
        assert!(near(start.elapsed(), Duration::from_secs(2)));
        assert!(!futs[0].done());
    }

    #[tokio::test]
    async fn test_empty_input_returns_immediately() {
        wait_for_all::<()>(&[]).await;
        wait_for_first::<()>(&[]).await;
    }
}
