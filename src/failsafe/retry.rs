//! Retry logic with exponential backoff

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};
use tokio::time::sleep;
use tracing::debug;

use crate::Result;
use crate::config::RetryConfig;
use crate::failsafe::CircuitBreaker;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Whether retries are enabled
    pub enabled: bool,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Initial backoff
    pub initial_backoff: Duration,
    /// Maximum backoff
    pub max_backoff: Duration,
    /// Backoff multiplier
    pub multiplier: f32,
}

impl RetryPolicy {
    /// Create from config
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
        }
    }

    /// Copy of this policy with a per-call retry budget
    #[must_use]
    pub fn with_max_retries(&self, max_retries: u32) -> Self {
        Self {
            max_retries,
            ..self.clone()
        }
    }

    /// Build the delay schedule: `initial * multiplier^n`, capped, no jitter
    #[must_use]
    pub fn delays(&self) -> ExponentialBackoff {
        let times = if self.enabled {
            self.max_retries as usize
        } else {
            0
        };
        ExponentialBuilder::default()
            .with_min_delay(self.initial_backoff)
            .with_max_delay(self.max_backoff)
            .with_factor(self.multiplier)
            .with_max_times(times)
            .build()
    }
}

/// Execute a future with retry, recording each outcome on the breaker
///
/// Non-retryable failures (4xx, decode errors) return immediately without
/// touching the breaker counter. Every transient failure is recorded, so the
/// breaker can open mid-call once the threshold is reached; the current
/// call still runs its remaining attempts.
///
/// # Errors
///
/// Returns the last error from `f` once the retry budget is exhausted, or
/// the first non-retryable error.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    breaker: &CircuitBreaker,
    operation: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delays = policy.delays();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match f().await {
            Ok(result) => {
                breaker.record_success();
                return Ok(result);
            }
            Err(e) => {
                if !e.is_retryable() {
                    // The backend responded, just not usefully; this is
                    // neither a breaker success nor a transient failure.
                    // Hand back the half-open probe slot if this call
                    // holds it.
                    breaker.release_probe();
                    return Err(e);
                }

                breaker.record_failure();

                match delays.next() {
                    Some(delay) => {
                        debug!(
                            operation,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Retrying after backoff"
                        );
                        sleep(delay).await;
                    }
                    None => {
                        debug!(operation, attempts = attempt, "Retry attempts exhausted");
                        return Err(e);
                    }
                }
            }
        }
    }
}
