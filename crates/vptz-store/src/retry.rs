//! Capped, jittered exponential backoff for store transactions.

use rand::Rng;
use std::time::Duration;

/// How often and how long to wait before retrying a busy transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Growth factor per retry.
    pub factor: f64,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Multiply each delay by a random value in `[1, 2)`.
    pub randomize: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            factor: 1.5,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(2000),
            randomize: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based), without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        self.scaled(retry, 1.0)
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let jitter = if self.randomize {
            rand::thread_rng().gen_range(1.0..2.0)
        } else {
            1.0
        };
        self.scaled(retry, jitter)
    }

    fn scaled(&self, retry: u32, jitter: f64) -> Duration {
        let ms = self.min_delay.as_secs_f64()
            * 1000.0
            * jitter
            * self.factor.powi(retry.min(i32::MAX as u32) as i32);
        let capped = ms.min(self.max_delay.as_secs_f64() * 1000.0);
        Duration::from_secs_f64(capped.max(0.0) / 1000.0)
    }
}
