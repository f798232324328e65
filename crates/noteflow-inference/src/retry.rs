//! Retry with exponential backoff for model calls.
//!
//! Transient failures (network errors, 5xx, rate limiting) are retried up to
//! a bounded number of times with exponential backoff and jitter. Every wait
//! respects the remaining task deadline: if the next delay would cross it,
//! the call fails fast with a timeout instead of sleeping into a dead task.
//! Waits are interruptible by cooperative cancellation.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

use noteflow_core::{defaults, Error, Result};

use crate::client::CallContext;

/// Classification of a single backend attempt.
#[derive(Debug)]
pub enum CallError {
    /// Worth retrying: network failure, 5xx, rate limit.
    Transient(String),
    /// Not worth retrying: invalid request, auth failure, payload too large.
    Permanent(String),
}

impl CallError {
    /// The failure message regardless of classification.
    pub fn message(&self) -> &str {
        match self {
            Self::Transient(m) | Self::Permanent(m) => m,
        }
    }
}

/// Backoff schedule configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// First backoff delay.
    pub base: Duration,
    /// Multiplier applied per retry.
    pub factor: f64,
    /// Fractional jitter (0.25 = each delay scaled by a uniform ±25%).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: defaults::AI_MAX_RETRIES,
            base: Duration::from_secs(defaults::AI_RETRY_BASE_SECS),
            factor: defaults::AI_RETRY_FACTOR,
            jitter: defaults::AI_RETRY_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Build from `AI_MAX_RETRIES` / `AI_RETRY_BASE_S` environment variables.
    pub fn from_env() -> Self {
        let max_retries = std::env::var("AI_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::AI_MAX_RETRIES);
        let base_secs = std::env::var("AI_RETRY_BASE_S")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::AI_RETRY_BASE_SECS);
        Self {
            max_retries,
            base: Duration::from_secs(base_secs),
            ..Self::default()
        }
    }

    /// Jittered delay before retry `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base.as_secs_f64() * self.factor.powi(attempt.saturating_sub(1) as i32);
        let scale = if self.jitter > 0.0 {
            rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter)
        } else {
            1.0
        };
        Duration::from_secs_f64(exp * scale)
    }
}

/// Drive `f` to success, retrying transient failures per `policy`.
///
/// Terminal outcomes:
/// - `Error::Cancelled` when the context's token fires before or between attempts
/// - `Error::Timeout` when the next backoff delay would cross the deadline
/// - `Error::ModelUnavailable` on a permanent failure or retry exhaustion
pub async fn retry_call<T, F, Fut>(
    policy: &RetryPolicy,
    ctx: &CallContext,
    op: &'static str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, CallError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        if ctx.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match f().await {
            Ok(value) => return Ok(value),
            Err(CallError::Permanent(msg)) => {
                warn!(op, attempt, error = %msg, "model call failed permanently");
                return Err(Error::ModelUnavailable(msg));
            }
            Err(CallError::Transient(msg)) => {
                if attempt > policy.max_retries {
                    warn!(op, attempt, error = %msg, "model call retries exhausted");
                    return Err(Error::ModelUnavailable(msg));
                }

                let delay = policy.delay_for(attempt);
                if let Some(remaining) = ctx.remaining() {
                    if delay >= remaining {
                        return Err(Error::Timeout(format!(
                            "{}: retry backoff would exceed task deadline",
                            op
                        )));
                    }
                }

                warn!(
                    op,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %msg,
                    "retrying model call"
                );

                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = ctx.cancel.cancelled() => return Err(Error::Cancelled),
                }
            }
        }
    }
}
