//! Token-bucket rate limiter shared across all builds in the process.
//!
//! Fail-fast by contract: when the bucket is dry, callers get an immediate
//! refusal rather than queueing, so a build never stalls behind another
//! tenant's burst.

use std::time::Instant;

use tokio::sync::Mutex;
use tracing::debug;

pub struct TokenBucket {
    rate_per_minute: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A bucket that starts full and refills continuously at
    /// `rate_per_minute`, capped at one minute's worth of tokens.
    pub fn per_minute(rate_per_minute: u32) -> Self {
        let capacity = rate_per_minute as f64;
        Self {
            rate_per_minute: capacity,
            capacity,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token if available. Never waits.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_minute / 60.0).min(self.capacity);
        state.last_refill = Instant::now();

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            debug!(remaining = state.tokens, "token bucket exhausted");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bucket_serves_up_to_capacity_then_refuses() {
        let bucket = TokenBucket::per_minute(3);
        assert!(bucket.try_acquire().await);
        assert!(bucket.try_acquire().await);
        assert!(bucket.try_acquire().await);
        assert!(!bucket.try_acquire().await, "fourth draw should fail fast");
    }

    #[tokio::test]
    async fn empty_bucket_never_blocks() {
        let bucket = TokenBucket::per_minute(1);
        assert!(bucket.try_acquire().await);
        let start = Instant::now();
        assert!(!bucket.try_acquire().await);
        assert!(start.elapsed().as_millis() < 50, "refusal must be immediate");
    }
}
