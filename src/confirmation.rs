//! Confirmation waiting
//!
//! Relay delivery and post-transaction state propagation are asynchronous
//! relative to the caller. [`ConfirmationWaiter`] polls a predicate on a
//! fixed cadence: every attempt sleeps the full interval and then checks.
//! Running out of attempts is an outcome, not an error.
//!
//! Sleeping goes through [`Sleeper`] so tests can substitute a clock that
//! advances instantly.

use async_trait::async_trait;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default cadence between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Predicate observed true on attempt `attempts`
    Settled { attempts: u32, waited: Duration },
    /// Predicate never observed true
    TimedOut { attempts: u32, waited: Duration },
    /// Caller withdrew interest before the predicate held
    Cancelled { attempts: u32, waited: Duration },
}

impl WaitOutcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, WaitOutcome::Settled { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Settled { attempts, .. }
            | WaitOutcome::TimedOut { attempts, .. }
            | WaitOutcome::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// Total time spent sleeping
    pub fn waited(&self) -> Duration {
        match self {
            WaitOutcome::Settled { waited, .. }
            | WaitOutcome::TimedOut { waited, .. }
            | WaitOutcome::Cancelled { waited, .. } => *waited,
        }
    }
}

/// Bounded polling loop over an injected sleeper
#[derive(Clone)]
pub struct ConfirmationWaiter {
    sleeper: Arc<dyn Sleeper>,
}

impl Default for ConfirmationWaiter {
    fn default() -> Self {
        Self::new(Arc::new(TokioSleeper))
    }
}

impl ConfirmationWaiter {
    pub fn new(sleeper: Arc<dyn Sleeper>) -> Self {
        Self { sleeper }
    }

    /// Poll `predicate` up to `max_attempts` times, sleeping `poll_interval`
    /// before each check. Predicate errors count as "not yet".
    pub async fn wait_for<F, Fut, E>(
        &self,
        description: &str,
        predicate: F,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> WaitOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        self.poll(description, predicate, poll_interval, max_attempts, None)
            .await
    }

    /// Like [`wait_for`](Self::wait_for), but stops between attempts once
    /// `cancel` reads `true`.
    pub async fn wait_for_cancellable<F, Fut, E>(
        &self,
        description: &str,
        predicate: F,
        poll_interval: Duration,
        max_attempts: u32,
        cancel: watch::Receiver<bool>,
    ) -> WaitOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        self.poll(
            description,
            predicate,
            poll_interval,
            max_attempts,
            Some(cancel),
        )
        .await
    }

    /// Read a value, retrying failed reads up to `max_retries` times on the
    /// given cadence. The first read happens at once. `Err` carries the last
    /// failure once every retry is used up.
    pub async fn read_with_retry<F, Fut, T, E>(
        &self,
        description: &str,
        mut read: F,
        poll_interval: Duration,
        max_retries: u32,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut retries = 0;
        loop {
            match read().await {
                Ok(value) => return Ok(value),
                Err(e) if retries < max_retries => {
                    retries += 1;
                    debug!(
                        what = description,
                        retry = retries,
                        max_retries = max_retries,
                        error = %e,
                        "Read failed, retrying"
                    );
                    self.sleeper.sleep(poll_interval).await;
                }
                Err(e) => {
                    warn!(what = description, retries = retries, error = %e, "Read failed");
                    return Err(e);
                }
            }
        }
    }

    async fn poll<F, Fut, E>(
        &self,
        description: &str,
        mut predicate: F,
        poll_interval: Duration,
        max_attempts: u32,
        cancel: Option<watch::Receiver<bool>>,
    ) -> WaitOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        let cancelled = || cancel.as_ref().is_some_and(|rx| *rx.borrow());
        let mut waited = Duration::ZERO;

        for attempt in 1..=max_attempts {
            if cancelled() {
                info!(what = description, attempts = attempt - 1, "Wait cancelled");
                return WaitOutcome::Cancelled {
                    attempts: attempt - 1,
                    waited,
                };
            }

            self.sleeper.sleep(poll_interval).await;
            waited += poll_interval;

            match predicate().await {
                Ok(true) => {
                    info!(
                        what = description,
                        attempts = attempt,
                        waited_ms = waited.as_millis() as u64,
                        "Condition observed"
                    );
                    return WaitOutcome::Settled {
                        attempts: attempt,
                        waited,
                    };
                }
                Ok(false) => {
                    debug!(
                        what = description,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        "Condition not observed yet"
                    );
                }
                Err(e) => {
                    debug!(
                        what = description,
                        attempt = attempt,
                        error = %e,
                        "Condition check failed, treating as not observed"
                    );
                }
            }
        }

        warn!(
            what = description,
            attempts = max_attempts,
            waited_ms = waited.as_millis() as u64,
            "Condition not observed within polling budget"
        );
        WaitOutcome::TimedOut {
            attempts: max_attempts,
            waited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSleeper;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn recording() -> (ConfirmationWaiter, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        (ConfirmationWaiter::new(sleeper.clone()), sleeper)
    }

    #[tokio::test]
    async fn test_settles_on_second_check_after_two_intervals() {
        let (waiter, sleeper) = recording();
        let counter = AtomicU32::new(0);
        let checks = &counter;

        let outcome = waiter
            .wait_for(
                "second check",
                || async move { Ok::<_, String>(checks.fetch_add(1, Ordering::SeqCst) + 1 == 2) },
                Duration::from_millis(500),
                3,
            )
            .await;

        assert_eq!(
            outcome,
            WaitOutcome::Settled {
                attempts: 2,
                waited: Duration::from_millis(1000)
            }
        );
        assert_eq!(sleeper.total(), Duration::from_millis(1000));
        assert_eq!(sleeper.calls(), 2);
    }

    #[tokio::test]
    async fn test_times_out_after_all_intervals() {
        let (waiter, sleeper) = recording();

        let outcome = waiter
            .wait_for(
                "never",
                || async { Ok::<_, String>(false) },
                Duration::from_millis(500),
                3,
            )
            .await;

        assert_eq!(
            outcome,
            WaitOutcome::TimedOut {
                attempts: 3,
                waited: Duration::from_millis(1500)
            }
        );
        assert_eq!(sleeper.total(), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_errors_count_as_not_observed() {
        let (waiter, _) = recording();
        let counter = AtomicU32::new(0);
        let checks = &counter;

        let outcome = waiter
            .wait_for(
                "flaky read",
                || async move {
                    match checks.fetch_add(1, Ordering::SeqCst) {
                        0 => Err("connection reset".to_string()),
                        _ => Ok(true),
                    }
                },
                Duration::from_millis(100),
                5,
            )
            .await;

        assert_eq!(outcome.attempts(), 2);
        assert!(outcome.is_settled());
    }

    #[tokio::test]
    async fn test_zero_attempts_times_out_without_checking() {
        let (waiter, sleeper) = recording();
        let outcome = waiter
            .wait_for(
                "nothing",
                || async { Ok::<_, String>(true) },
                Duration::from_millis(500),
                0,
            )
            .await;
        assert!(matches!(outcome, WaitOutcome::TimedOut { attempts: 0, .. }));
        assert_eq!(sleeper.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_attempts() {
        let (waiter, sleeper) = recording();
        let (tx, rx) = watch::channel(false);
        let checks = AtomicU32::new(0);

        let outcome = waiter
            .wait_for_cancellable(
                "cancel after first",
                || {
                    checks.fetch_add(1, Ordering::SeqCst);
                    let _ = tx.send(true);
                    async { Ok::<_, String>(false) }
                },
                Duration::from_millis(500),
                10,
                rx,
            )
            .await;

        assert_eq!(
            outcome,
            WaitOutcome::Cancelled {
                attempts: 1,
                waited: Duration::from_millis(500)
            }
        );
        assert_eq!(checks.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.calls(), 1);
    }

    #[tokio::test]
    async fn test_read_with_retry_recovers_after_failures() {
        let (waiter, sleeper) = recording();
        let counter = AtomicU32::new(0);
        let reads = &counter;

        let value = waiter
            .read_with_retry(
                "flaky value",
                || async move {
                    match reads.fetch_add(1, Ordering::SeqCst) {
                        0 | 1 => Err("connection reset".to_string()),
                        n => Ok(n),
                    }
                },
                Duration::from_millis(200),
                3,
            )
            .await;

        assert_eq!(value, Ok(2));
        assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(200); 2]);
    }

    #[tokio::test]
    async fn test_read_with_retry_gives_up_with_last_error() {
        let (waiter, sleeper) = recording();

        let value = waiter
            .read_with_retry(
                "dead endpoint",
                || async { Err::<u32, _>("connection refused".to_string()) },
                Duration::from_millis(200),
                2,
            )
            .await;

        assert_eq!(value, Err("connection refused".to_string()));
        assert_eq!(sleeper.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_sleeper_elapses_full_intervals() {
        let waiter = ConfirmationWaiter::default();
        let start = tokio::time::Instant::now();
        let counter = AtomicU32::new(0);
        let checks = &counter;

        let outcome = waiter
            .wait_for(
                "paused clock",
                || async move { Ok::<_, String>(checks.fetch_add(1, Ordering::SeqCst) == 1) },
                Duration::from_millis(500),
                3,
            )
            .await;

        assert!(outcome.is_settled());
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }
}
