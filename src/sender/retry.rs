use std::time::Duration;

/// Decides whether a further delivery attempt is allowed after a retryable
/// failure, and how long to back off first. Decoupled from response
/// classification so it can be tested with deterministic inputs.
pub trait RetryPolicy: Send + Sync {
    /// `attempt` is the 1-based number of the attempt that just failed.
    /// `Some(delay)` allows another attempt after `delay`; `None` ends the
    /// loop and the message is marked failed.
    fn next_attempt(&self, attempt: u32) -> Option<Duration>;
}

/// Exponential backoff with an optional attempt cap.
///
/// delay = base_delay * multiplier^(attempt - 1), so with base 2s and
/// multiplier 2.0 the waits run 2s, 4s, 8s, ...
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base_delay: Duration,
    pub multiplier: f64,
    /// `None` means unbounded retries; operational limits apply externally.
    pub max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    pub fn new(max_attempts: Option<u32>) -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_attempts,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_attempt(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return None;
            }
        }
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        Some(Duration::from_secs_f64(delay_secs))
    }
}
