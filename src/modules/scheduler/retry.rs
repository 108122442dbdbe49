use rand::Rng;
use serde::{Deserialize, Serialize};

/// How a failed job's next attempt is scheduled.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RetryStrategy {
    Linear { interval: u32 },
    Exponential { base: u32 },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub strategy: RetryStrategy,
    pub max_retries: Option<u32>,
}

impl RetryPolicy {
    pub const DEFAULT_CAP_MS: u64 = 300_000;
    pub const DEFAULT_BASE_MS: u64 = 2_000;

    pub fn exponential(max_retries: u32) -> Self {
        Self {
            strategy: RetryStrategy::Exponential {
                base: Self::DEFAULT_BASE_MS as u32,
            },
            max_retries: Some(max_retries),
        }
    }

    pub fn linear(interval_ms: u32, max_retries: u32) -> Self {
        Self {
            strategy: RetryStrategy::Linear { interval: interval_ms },
            max_retries: Some(max_retries),
        }
    }

    /// Delay, in milliseconds, before `attempt` (1-indexed) is retried.
    /// Exponential backoff is capped and jittered so a burst of failing jobs
    /// in the same family doesn't retry in lockstep.
    pub fn wait_time(&self, attempt: u32) -> u64 {
        let base = match self.strategy {
            RetryStrategy::Linear { interval } => interval as u64 * attempt as u64,
            RetryStrategy::Exponential { base } => {
                let exp = 2u64.saturating_pow(attempt.min(20));
                (base as u64).saturating_mul(exp)
            }
        }
        .min(Self::DEFAULT_CAP_MS);

        let jitter = rand::rng().random_range(0..=(base / 10).max(1));
        base + jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = RetryPolicy::exponential(10);
        let wait = policy.wait_time(30);
        assert!(wait <= RetryPolicy::DEFAULT_CAP_MS + RetryPolicy::DEFAULT_CAP_MS / 10);
    }

    #[test]
    fn linear_backoff_scales_with_attempt() {
        let policy = RetryPolicy::linear(1000, 5);
        assert!(policy.wait_time(3) >= 3000);
    }
}
