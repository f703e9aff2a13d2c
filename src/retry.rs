// Bounded retry with exponential backoff (x5 per attempt, capped at 30s).
// Wraps every network and file operation in the collection pipeline.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Upper bound for a single backoff delay.
pub const MAX_DELAY_MS: u64 = 30_000;
const BACKOFF_FACTOR: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum RetryError {
    #[error("{label} failed after {attempts} attempts. Last error: {last_error}")]
    Exhausted {
        label: String,
        attempts: u32,
        last_error: String,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryHandler {
    max_retries: u32,
    base_delay_ms: u64,
}

impl RetryHandler {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay slept after failed attempt `attempt` (0-indexed): `min(base * 5^attempt, 30s)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = BACKOFF_FACTOR.saturating_pow(attempt);
        let ms = self.base_delay_ms.saturating_mul(factor).min(MAX_DELAY_MS);
        Duration::from_millis(ms)
    }

    /// Runs `operation` up to `max_retries + 1` times. Every call starts from attempt 0.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        mut operation: F,
        label: &str,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.max_retries + 1;
        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 >= attempts => {
                    return Err(RetryError::Exhausted {
                        label: label.to_string(),
                        attempts,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.delay_for_attempt(attempt);
                    warn!(
                        operation = label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "{} attempt {} failed: {}. Retrying in {}ms...",
                        label,
                        attempt + 1,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
