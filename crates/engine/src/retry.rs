// Bounded retry driver for playlist and segment fetches.
//
// Each failed attempt doubles the wait, clamped to a ceiling, and a
// random slice is shaved off so concurrent streams drift apart instead
// of hammering the origin in lockstep.

use std::future::Future;
use std::time::Duration;

use rand::RngExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::StreamError;

/// How attempts are budgeted and spaced.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Wait after the first failed attempt; doubles per retry.
    pub base_delay: Duration,
    /// Ceiling on any single wait.
    pub max_delay: Duration,
    /// Fraction of the wait that may be randomly shaved off
    /// (0.0 disables jitter).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(600),
            max_delay: Duration::from_secs(5),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Wait to apply once `completed_attempts` have failed (1-based).
    pub fn delay_after(&self, completed_attempts: u32) -> Duration {
        // Cap the exponent so the shift cannot overflow; the max-delay
        // clamp dominates long before 2^16 anyway.
        let exponent = completed_attempts.saturating_sub(1).min(16);
        let scaled = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        if self.jitter <= 0.0 {
            return scaled;
        }

        // Jitter only ever shortens the wait, so the ceiling holds.
        let keep = 1.0 - rand::rng().random_range(0.0..self.jitter.min(1.0));
        scaled.mul_f64(keep)
    }
}

/// Run `operation` until it succeeds, fails permanently, exhausts the
/// attempt budget, or the token is cancelled.
///
/// Retryability is decided by [`StreamError::is_retryable`]; the waits
/// between attempts are cancellable.
pub async fn retry_request<T, F, Fut>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    mut operation: F,
) -> Result<T, StreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StreamError>>,
{
    let budget = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        if token.is_cancelled() {
            return Err(StreamError::Cancelled);
        }

        attempt += 1;
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if matches!(err, StreamError::Cancelled) || !err.is_retryable() || attempt >= budget {
            return Err(err);
        }

        let delay = policy.delay_after(attempt);
        warn!(
            attempt,
            remaining = budget - attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient fetch failure, backing off"
        );
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(StreamError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
