//! Bounded retry with capped exponential backoff.

use std::future::Future;
use std::time::Duration;

use pipeline::GenerationError;
use serde_json::Value;
use tracing::{error, warn};

use crate::redact::sanitize_for_logging;

/// Delay before the second attempt.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

/// No delay between attempts ever exceeds this.
pub const MAX_BACKOFF: Duration = Duration::from_millis(10_000);

/// Delay after the failed attempt with zero-based index `attempt`:
/// `min(1000 * 2^attempt, 10000)` milliseconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let cap = MAX_BACKOFF.as_millis() as u64;
    let ms = 2u64
        .checked_pow(attempt)
        .and_then(|factor| factor.checked_mul(INITIAL_BACKOFF.as_millis() as u64))
        .map_or(cap, |ms| ms.min(cap));
    Duration::from_millis(ms)
}

/// Runs `operation` up to `max_retries + 1` times.
///
/// Non-retryable errors end the loop at once. After the last permitted
/// attempt the final error is returned unchanged.
pub async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    mut operation: F,
) -> Result<T, GenerationError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let details = err.details().map(sanitize_for_logging).unwrap_or(Value::Null);

        if !err.retry_policy().is_retryable() {
            error!(
                kind = %err.kind(),
                attempt = attempt + 1,
                details = %details,
                error = %err,
                "completion failed with non-retryable error"
            );
            return Err(err);
        }

        if attempt >= max_retries {
            error!(
                kind = %err.kind(),
                attempts = attempt + 1,
                details = %details,
                error = %err,
                "completion failed after exhausting retries"
            );
            return Err(err);
        }

        let delay = backoff_delay(attempt);
        warn!(
            kind = %err.kind(),
            attempt = attempt + 1,
            max_attempts = max_retries + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "completion attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
