//! Exponential backoff for operations that can fail for transient reasons, such as the database being locked or a
//! pool connection not being available in time.
use std::{fmt::Display, future::Future, time::Duration};

use log::*;
use tokio::time::sleep;

/// Defaults: 3 retries, starting at 1s and doubling, capped at 30s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, initial_delay: Duration::from_secs(1), max_delay: Duration::from_secs(30), multiplier: 2.0 }
    }
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder { policy: Self::default() }
    }

    /// `initial_delay * multiplier ^ attempt`, capped at `max_delay`. `attempt` is zero-based.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;
        if delay_ms.is_finite() && delay_ms < max_ms {
            Duration::from_millis(delay_ms as u64)
        } else {
            self.max_delay
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.policy.max_retries = max_retries;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.policy.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    pub fn build(self) -> RetryPolicy {
        self.policy
    }
}

/// Runs `operation` until it succeeds, fails with an error that `is_retryable` rejects, or `max_retries` retries
/// have been used up. The last error is returned in the latter two cases.
pub async fn retry_with_backoff<F, Fut, T, E, P>(policy: &RetryPolicy, mut operation: F, is_retryable: P) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    info!("♻️ Operation succeeded after {attempt} retries");
                }
                return Ok(result);
            },
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) if attempt >= policy.max_retries => {
                error!("♻️ Operation failed after {attempt} retries. Giving up. {e}");
                return Err(e);
            },
            Err(e) => {
                let delay = policy.delay_for_attempt(attempt);
                warn!("♻️ Operation failed ({e}). Retrying in {}ms", delay.as_millis());
                sleep(delay).await;
                attempt += 1;
            },
        }
    }
}
