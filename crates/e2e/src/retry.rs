//! Retry-until-stable combinator
//!
//! Wraps an arbitrary action+assertion block and re-runs it until it
//! completes without error or the overall deadline passes. This is the one
//! sanctioned way to absorb UI timing noise (modal transitions, toasts,
//! dropdowns populated by async requests); fixed sleeps are not.
//!
//! Every retry re-runs the *whole* block, side effects included. Blocks must
//! be safe to repeat: re-clicking an opener or a copy icon is fine,
//! re-submitting a form is not and has to be guarded by the caller (check
//! the resulting state first, submit outside the block).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Backoff schedule between attempts; the last entry repeats.
pub const DEFAULT_INTERVALS_MS: [u64; 4] = [100, 250, 500, 1000];

/// Default deadline for UI settle checks.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounded retry policy, created per call site.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    timeout: Duration,
    intervals: Vec<Duration>,
}

/// What happened while resolving a retried block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryStats {
    pub attempts: usize,
    pub elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl RetryPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            intervals: DEFAULT_INTERVALS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        }
    }

    /// Replace the backoff schedule. An empty schedule keeps the default.
    pub fn with_intervals(mut self, intervals: Vec<Duration>) -> Self {
        if !intervals.is_empty() {
            self.intervals = intervals;
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Backoff to apply after the given (zero-based) failed attempt.
    pub fn interval(&self, failed_attempt: usize) -> Duration {
        self.intervals
            .get(failed_attempt)
            .or_else(|| self.intervals.last())
            .copied()
            .unwrap_or(Duration::from_millis(DEFAULT_INTERVALS_MS[0]))
    }

    /// Run `block` until it returns `Ok` or the deadline passes.
    ///
    /// On exhaustion the error from the final attempt is returned untouched;
    /// the attempt count and elapsed time go to the log.
    pub async fn run<T, E, F, Fut>(&self, block: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_counted(block).await.0
    }

    /// Same as [`RetryPolicy::run`], also reporting attempts and elapsed time.
    pub async fn run_counted<T, E, F, Fut>(&self, mut block: F) -> (Result<T, E>, RetryStats)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let start = Instant::now();
        let mut attempts = 0usize;

        loop {
            attempts += 1;
            let outcome = block().await;
            let elapsed = start.elapsed();
            let stats = RetryStats { attempts, elapsed };

            match outcome {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(attempts, elapsed_ms = elapsed.as_millis() as u64, "Block settled");
                    }
                    return (Ok(value), stats);
                }
                Err(e) if elapsed >= self.timeout => {
                    warn!(
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Block did not settle: {}",
                        e
                    );
                    return (Err(e), stats);
                }
                Err(e) => {
                    let backoff = self.interval(attempts - 1).min(self.timeout - elapsed);
                    debug!(attempt = attempts, backoff_ms = backoff.as_millis() as u64, "Retrying after: {}", e);
                    sleep(backoff).await;
                }
            }
        }
    }
}

/// Retry `block` under the default backoff until `timeout` elapses.
pub async fn retry_until<T, E, F, Fut>(timeout: Duration, block: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryPolicy::new(timeout).run(block).await
}
