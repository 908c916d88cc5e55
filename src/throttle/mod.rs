//! Request pacing and retry primitives
//!
//! - `limiter`: fixed minimum delay between requests
//! - `bucket`: token bucket for burst caps
//! - `retry`: exponential backoff with jitter

mod bucket;
mod limiter;
mod retry;

pub use bucket::{TokenBucket, TAKE_POLL_INTERVAL};
pub use limiter::FixedDelayLimiter;
pub use retry::{RetryConfig, RetryError, Retryer};
