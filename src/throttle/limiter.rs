use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::context::{ContextError, RunContext};

/// Enforces a minimum delay between consecutive requests
///
/// The first call to [`wait`](Self::wait) never blocks. Every later call blocks
/// until `delay` has elapsed since the previous call returned. Waiters are
/// serialized, so concurrent callers are spaced out as well.
#[derive(Debug)]
pub struct FixedDelayLimiter {
    delay: Duration,
    last_request_time: Mutex<Option<Instant>>,
}

impl FixedDelayLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request_time: Mutex::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Blocks until the next request is allowed
    ///
    /// Returns the context error if `ctx` finishes while waiting. A cancelled
    /// wait leaves the recorded timestamp untouched.
    pub async fn wait(&self, ctx: &RunContext) -> Result<(), ContextError> {
        let mut last = tokio::select! {
            err = ctx.done() => return Err(err),
            guard = self.last_request_time.lock() => guard,
        };

        if let Some(wait) = self.time_until_next_request(*last, Instant::now()) {
            ctx.sleep(wait).await?;
        }

        *last = Some(Instant::now());
        Ok(())
    }

    /// Forgets the last request time so the next wait returns immediately
    pub async fn reset(&self) {
        *self.last_request_time.lock().await = None;
    }

    /// Returns None if a request may go out at `now`, or the remaining wait
    fn time_until_next_request(&self, last: Option<Instant>, now: Instant) -> Option<Duration> {
        let last = last?;
        let elapsed = now.duration_since(last);
        if elapsed < self.delay {
            Some(self.delay - elapsed)
        } else {
            None
        }
    }
}
