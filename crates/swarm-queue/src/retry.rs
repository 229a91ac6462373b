//! Bounded retry for queue sends.

use std::time::Duration;

use tracing::warn;

use crate::error::{QueueError, QueueResult};
use crate::queue::MessageQueue;

/// Exponential retry policy for `send`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based).
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        (self.base_delay * factor).min(self.max_delay)
    }
}

/// Send `body`, retrying failed attempts per `policy`. Returns the last
/// error once attempts are exhausted.
pub async fn send_with_retry(
    queue: &dyn MessageQueue,
    body: String,
    policy: RetryPolicy,
) -> QueueResult<String> {
    let attempts = policy.max_attempts.max(1);
    let mut last_err: Option<QueueError> = None;

    for attempt in 1..=attempts {
        match queue.send(body.clone()).await {
            Ok(id) => return Ok(id),
            Err(e) => {
                warn!(attempt, max_attempts = attempts, error = %e, "queue send failed");
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(policy.delay(attempt)).await;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| QueueError::Send("no attempts made".to_string())))
}
