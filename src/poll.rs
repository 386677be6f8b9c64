//! Polling and bounded retry with an injectable clock.
//!
//! Remote index operations are eventually consistent, so most lifecycle steps
//! wait for a condition by re-checking it on a fixed interval. Tests swap the
//! tokio clock for [`ManualClock`], which records requested sleeps and returns
//! immediately.

use crate::error::{EvalError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of delays.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Clock that never waits and records every sleep it was asked for.
#[derive(Debug, Default)]
pub struct ManualClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// All requested sleeps, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Sum of all requested sleeps.
    pub fn elapsed(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
    }
}

/// How often to re-check a condition and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// `None` polls until the condition holds.
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    /// Poll forever on the given interval.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }
}

/// Check `condition` until it returns `Ok(true)`, sleeping `policy.interval`
/// between checks. Errors from the condition propagate immediately.
///
/// Returns the number of checks performed.
pub async fn poll_until<F, Fut>(
    what: &str,
    policy: PollPolicy,
    clock: &dyn Clock,
    mut condition: F,
) -> Result<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        if condition().await? {
            debug!(what, attempts, "condition met");
            return Ok(attempts);
        }

        if let Some(max) = policy.max_attempts {
            if attempts >= max {
                return Err(EvalError::PollExhausted {
                    what: what.to_string(),
                    attempts,
                });
            }
        }

        clock.sleep(policy.interval).await;
    }
}

/// Fixed-delay retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
}

/// Run `operation` until it succeeds or `policy.max_attempts` consecutive
/// attempts have failed. The last error is returned on exhaustion.
pub async fn retry_with_budget<T, F, Fut>(
    what: &str,
    policy: RetryPolicy,
    clock: &dyn Clock,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => return Err(err),
            Err(err) => {
                warn!(what, attempt, max_attempts, error = %err, "attempt failed, retrying");
                clock.sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}
