use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::context::{ContextError, RunContext};

/// How often [`TokenBucket::take_wait`] re-checks for a token
pub const TAKE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket with lazy refill
///
/// Tokens accumulate at `refill_rate` per second up to `max_tokens`. The
/// refill is computed on access; no background task is involved.
#[derive(Debug)]
pub struct TokenBucket {
    max_tokens: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Creates a full bucket
    pub fn new(max_tokens: u32, refill_rate: f64) -> Self {
        let max_tokens = f64::from(max_tokens);
        Self {
            max_tokens,
            refill_rate: refill_rate.max(0.0),
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes one token if available without blocking
    pub fn take(&self) -> bool {
        let mut state = self.refilled();
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Polls until a token is available or the context finishes
    pub async fn take_wait(&self, ctx: &RunContext) -> Result<(), ContextError> {
        loop {
            if self.take() {
                return Ok(());
            }
            ctx.sleep(TAKE_POLL_INTERVAL).await?;
        }
    }

    /// Returns the current token count after refill
    pub fn available(&self) -> f64 {
        self.refilled().tokens
    }

    fn refilled(&self) -> MutexGuard<'_, BucketState> {
        // The state is two plain numbers; a poisoned guard is still consistent.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        state.last_refill = now;
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_take_bounded_by_max_tokens() {
        let bucket = TokenBucket::new(3, 1.0);
        assert!(bucket.take());
        assert!(bucket.take());
        assert!(bucket.take());
        assert!(!bucket.take());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_over_time() {
        let bucket = TokenBucket::new(2, 2.0);
        assert!(bucket.take());
        assert!(bucket.take());
        assert!(!bucket.take());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(bucket.take());
        assert!(!bucket.take());
    }

    #[tokio::test(start_paused = true)]
    async fn test_available_never_exceeds_max() {
        let bucket = TokenBucket::new(5, 10.0);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(bucket.available(), 5.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_available_non_decreasing_without_take() {
        let bucket = TokenBucket::new(10, 1.0);
        for _ in 0..10 {
            bucket.take();
        }

        let mut previous = bucket.available();
        for _ in 0..5 {
            tokio::time::advance(Duration::from_millis(300)).await;
            let current = bucket.available();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_wait_gets_refilled_token() {
        let bucket = TokenBucket::new(1, 5.0);
        assert!(bucket.take());

        let start = Instant::now();
        bucket.take_wait(&RunContext::new()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_wait_cancelled() {
        let bucket = TokenBucket::new(1, 0.0);
        assert!(bucket.take());

        let ctx = RunContext::with_timeout(Duration::from_millis(250));
        let result = bucket.take_wait(&ctx).await;
        assert_eq!(result, Err(ContextError::DeadlineExceeded));
    }
}
