//! Bounded waits and retry helpers shared by the bootstrap and panel flows.
//!
//! Every wait here is time-boxed. None of them return an error on expiry;
//! callers decide whether running out of time is fatal.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Calls `check` every `interval` until it yields `Some` or `timeout` elapses.
///
/// The check always runs at least once, even with a zero timeout.
pub async fn wait_for<T, F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(interval.min(deadline - now)).await;
    }
}

/// [`wait_for`] for boolean conditions.
pub async fn wait_until<F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    wait_for(timeout, interval, || {
        let fut = check();
        async move { fut.await.then_some(()) }
    })
    .await
    .is_some()
}

/// Result of [`settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled {
    pub count: usize,
    /// `false` when `bound` ran out before the count held for a full window.
    pub quiet: bool,
}

/// Samples a counter until it stays unchanged for `window`.
///
/// Any change restarts the window. Gives up after `bound` and reports the
/// last sample with `quiet = false`.
pub async fn settle<F, Fut>(window: Duration, interval: Duration, bound: Duration, mut sample: F) -> Settled
where
    F: FnMut() -> Fut,
    Fut: Future<Output = usize>,
{
    let started = Instant::now();
    let mut count = sample().await;
    let mut stable_since = Instant::now();
    loop {
        let now = Instant::now();
        if now.duration_since(stable_since) >= window {
            return Settled { count, quiet: true };
        }
        if now.duration_since(started) >= bound {
            return Settled {
                count,
                quiet: false,
            };
        }
        sleep(interval).await;
        let next = sample().await;
        if next != count {
            tracing::debug!(from = count, to = next, "row count moved, restarting quiet window");
            count = next;
            stable_since = Instant::now();
        }
    }
}

/// Runs `operation` up to `max_retries + 1` times, sleeping between attempts.
///
/// Delay is `base_ms × 2^(attempt-1)` scaled by a random factor in
/// `[0.75, 1.25)`, capped at 10 s. The last error is returned when attempts
/// run out.
pub async fn retry_with_backoff<T, E, F, Fut>(
    max_retries: u32,
    base_ms: u64,
    what: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    const MAX_DELAY_MS: u64 = 10_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::debug!(attempt, max_retries, delay_ms, error = %err, what, "retrying");
                sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
