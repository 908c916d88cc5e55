use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

use crate::context::{ContextError, RunContext};

/// Backoff settings for [`Retryer`]
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts = max_retries + 1
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

/// Why a retried operation gave up
#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("retry aborted: {0}")]
    Cancelled(ContextError),

    /// The error was classified as not worth retrying
    #[error("{0}")]
    Rejected(E),

    #[error("max retries exceeded after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// The underlying operation error, if one was produced
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Cancelled(_) => None,
            Self::Rejected(err) | Self::Exhausted { last: err, .. } => Some(err),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Runs fallible async operations with exponential backoff and jitter
#[derive(Debug)]
pub struct Retryer {
    config: RetryConfig,
    rng: Mutex<StdRng>,
}

impl Retryer {
    /// Creates a retryer seeded from OS randomness
    pub fn new(config: RetryConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    /// Creates a retryer with a caller-supplied random source
    pub fn with_rng(config: RetryConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Retries `op` on every error
    pub async fn run<T, E, F, Fut>(&self, ctx: &RunContext, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(ctx, |_| true, op).await
    }

    /// Retries `op` while `retryable` accepts the error
    ///
    /// The context is checked before every attempt and preempts the backoff
    /// sleep. No sleep follows the final attempt.
    pub async fn run_if<T, E, F, Fut, P>(
        &self,
        ctx: &RunContext,
        retryable: P,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let attempts = self.config.max_retries + 1;
        let mut attempt = 0;

        loop {
            if let Some(err) = ctx.err() {
                return Err(RetryError::Cancelled(err));
            }

            attempt += 1;
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !retryable(&err) {
                return Err(RetryError::Rejected(err));
            }
            if attempt >= attempts {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.delay_for(attempt);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after failure");
            ctx.sleep(delay).await.map_err(RetryError::Cancelled)?;
        }
    }

    /// Backoff before the attempt following failure number `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base = self.config.initial_delay.as_secs_f64() * self.config.backoff_factor.powi(exponent);
        let capped = base.min(self.config.max_delay.as_secs_f64());

        let scaled = if self.config.jitter {
            let factor = self
                .rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .random_range(0.75..=1.25);
            capped * factor
        } else {
            capped
        };

        Duration::from_secs_f64(scaled.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            jitter: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_k_failures() {
        let retryer = Retryer::new(fast_config(3));
        let calls = AtomicU32::new(0);

        let result: Result<&str, RetryError<String>> = retryer
            .run(&RunContext::new(), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(format!("failure {}", n))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_exhausts() {
        let retryer = Retryer::new(fast_config(3));
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError<String>> = retryer
            .run(&RunContext::new(), || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(format!("failure {}", n))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last, "failure 3");
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_error_returned_unmodified() {
        let retryer = Retryer::new(fast_config(5));
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError<String>> = retryer
            .run_if(
                &RunContext::new(),
                |err: &String| err != "permanent",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("permanent".to_string())
                },
            )
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Rejected(ref e)) if e == "permanent"));
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_before_first_attempt() {
        let retryer = Retryer::new(fast_config(3));
        let ctx = RunContext::new();
        ctx.cancel();
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError<String>> = retryer
            .run(&ctx, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("nope".to_string())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(result, Err(RetryError::Cancelled(ContextError::Cancelled))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_preempts_backoff() {
        let config = RetryConfig {
            initial_delay: Duration::from_secs(10),
            ..fast_config(3)
        };
        let retryer = Retryer::new(config);
        let ctx = RunContext::with_timeout(Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let result: Result<(), RetryError<String>> = retryer
            .run(&ctx, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("slow".to_string())
            })
            .await;

        assert!(calls.load(Ordering::SeqCst) < 4);
        assert!(matches!(
            result,
            Err(RetryError::Cancelled(ContextError::DeadlineExceeded))
        ));
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let retryer = Retryer::new(fast_config(5));
        assert_eq!(retryer.delay_for(1), Duration::from_millis(10));
        assert_eq!(retryer.delay_for(2), Duration::from_millis(20));
        assert_eq!(retryer.delay_for(3), Duration::from_millis(40));
        assert_eq!(retryer.delay_for(4), Duration::from_millis(80));
        assert_eq!(retryer.delay_for(5), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_within_band() {
        let config = RetryConfig {
            jitter: true,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            ..fast_config(3)
        };
        let retryer = Retryer::with_rng(config, StdRng::seed_from_u64(42));

        for _ in 0..100 {
            let delay = retryer.delay_for(1);
            assert!(delay >= Duration::from_millis(750));
            assert!(delay <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn test_seeded_jitter_is_deterministic() {
        let config = RetryConfig::default();
        let a = Retryer::with_rng(config.clone(), StdRng::seed_from_u64(7));
        let b = Retryer::with_rng(config, StdRng::seed_from_u64(7));
        assert_eq!(a.delay_for(2), b.delay_for(2));
    }
}
