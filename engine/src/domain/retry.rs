//! Bounded retry with timeouts and jittered exponential backoff.
//!
//! Every network-backed engine call goes through [`RetryRunner::run`]: each
//! attempt is capped by the policy timeout, retryable failures back off and
//! try again, and the last error is surfaced once attempts run out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};
use tracing::{debug, warn};

use super::ports::NetworkError;

/// Async sleeping abstraction so tests can skip backoff delays.
#[async_trait]
pub trait RetrySleeper: Send + Sync {
    /// Suspend execution for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Retry backoff jitter abstraction.
pub trait BackoffJitter: Send + Sync {
    /// Return a jittered delay derived from the exponential base delay.
    ///
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use map_engine::domain::BackoffJitter;
    /// use std::time::Duration;
    ///
    /// struct FixedJitter;
    /// impl BackoffJitter for FixedJitter {
    ///     fn jittered_delay(&self, base: Duration, attempt: u32, _now: chrono::DateTime<Utc>) -> Duration {
    ///         base + Duration::from_millis(u64::from(attempt) * 5)
    ///     }
    /// }
    /// let now = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid time");
    /// assert_eq!(
    ///     FixedJitter.jittered_delay(Duration::from_millis(100), 2, now),
    ///     Duration::from_millis(110),
    /// );
    /// ```
    fn jittered_delay(&self, base: Duration, attempt: u32, now: DateTime<Utc>) -> Duration;
}

/// Tokio-based sleeper.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl RetrySleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Adds up to a quarter of the base delay, seeded from the clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttemptJitter;

impl BackoffJitter for AttemptJitter {
    fn jittered_delay(&self, base: Duration, attempt: u32, now: DateTime<Utc>) -> Duration {
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        let max_extra = (base_ms / 4).max(1);
        let seed = u64::from(now.timestamp_subsec_nanos()) ^ u64::from(attempt);
        Duration::from_millis(base_ms.saturating_add(seed % max_extra.saturating_add(1)))
    }
}

/// Timeout and retry budget for one kind of call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt deadline.
    pub timeout: Duration,
    /// Extra attempts after the first.
    pub retries: u32,
    /// Delay before the first retry; doubles per retry.
    pub initial_backoff: Duration,
    /// Upper bound for the un-jittered delay.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Policy with the given deadline and retry count and default backoff.
    pub const fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            retries,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
        }
    }

    /// Forward geocoding: 10 s, two retries.
    pub const fn geocode() -> Self {
        Self::new(Duration::from_secs(10), 2)
    }

    /// Reverse geocoding: 8 s, one retry.
    pub const fn reverse_geocode() -> Self {
        Self::new(Duration::from_secs(8), 1)
    }

    /// Nearby POI fetch: 15 s, one retry.
    pub const fn nearby() -> Self {
        Self::new(Duration::from_secs(15), 1)
    }

    /// Place name search: 12 s, no retry.
    pub const fn place_search() -> Self {
        Self::new(Duration::from_secs(12), 0)
    }

    /// Route calculation: 10 s, one retry.
    pub const fn routing() -> Self {
        Self::new(Duration::from_secs(10), 1)
    }

    /// Total number of attempts, at least one.
    pub const fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = 2_u32.saturating_pow(attempt.saturating_sub(1));
        let base_ms = u64::try_from(self.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(base_ms.saturating_mul(u64::from(exponent)).min(max_ms))
    }
}

/// Sleeper, jitter and clock used between attempts.
#[derive(Clone)]
pub struct RetryRunner {
    sleeper: Arc<dyn RetrySleeper>,
    jitter: Arc<dyn BackoffJitter>,
    clock: Arc<dyn Clock>,
}

impl Default for RetryRunner {
    fn default() -> Self {
        Self {
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(AttemptJitter),
            clock: Arc::new(DefaultClock),
        }
    }
}

impl std::fmt::Debug for RetryRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryRunner").finish_non_exhaustive()
    }
}

impl RetryRunner {
    /// Build a runner from explicit collaborators.
    pub fn new(
        sleeper: Arc<dyn RetrySleeper>,
        jitter: Arc<dyn BackoffJitter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sleeper,
            jitter,
            clock,
        }
    }

    /// Invoke `call` until it succeeds, fails permanently, or the policy's
    /// attempts are spent.
    ///
    /// An attempt exceeding `policy.timeout` counts as
    /// [`NetworkError::Timeout`].
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        policy: &RetryPolicy,
        mut call: F,
    ) -> Result<T, NetworkError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, NetworkError>> + Send,
        T: Send,
    {
        let max_attempts = policy.max_attempts();
        for attempt in 1..=max_attempts {
            let outcome = match tokio::time::timeout(policy.timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(NetworkError::timeout(format!(
                    "{operation} exceeded {} ms",
                    policy.timeout.as_millis()
                ))),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.jitter.jittered_delay(
                        policy.base_delay(attempt),
                        attempt,
                        self.clock.utc(),
                    );
                    debug!(operation, attempt, ?delay, %error, "retrying failed call");
                    self.sleeper.sleep(delay).await;
                }
                Err(error) => {
                    warn!(operation, attempt, %error, "call failed");
                    return Err(error);
                }
            }
        }

        Err(NetworkError::transport(format!(
            "{operation} made no attempts"
        )))
    }
}
