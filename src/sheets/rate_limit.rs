// Minimum spacing between outbound Sheets requests.

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Gap enforced between consecutive requests (Sheets quota is per-minute; stay well under it).
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

/// Spaces request start times at least `min_interval` apart. Only the start is serialized;
/// completions may interleave.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(MIN_REQUEST_INTERVAL)
    }
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Waits until a request may be issued and reserves the slot.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
