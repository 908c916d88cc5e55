//! Cancellation and deadline scope for a crawl session or analysis run
//!
//! Every blocking point in the pipeline (rate-limit waits, retry backoff,
//! network fetches) takes a [`RunContext`] and returns promptly once it is
//! cancelled or its deadline passes.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context stopped
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// A cancellation token paired with an optional deadline
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    /// Creates a context with no deadline
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that expires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Creates a context wrapping an existing token
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derives a child context
    ///
    /// Cancelling the parent cancels the child. The child's deadline is the
    /// earlier of the parent's deadline and `now + timeout`.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the reason this context is done, or None while it is live
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) -> ContextError {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = self.token.cancelled() => ContextError::Cancelled,
            _ = deadline => ContextError::DeadlineExceeded,
        }
    }

    /// Sleeps for `duration` unless the context finishes first
    pub async fn sleep(&self, duration: Duration) -> Result<(), ContextError> {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            err = self.done() => Err(err),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Runs `fut` to completion unless the context finishes first
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, ContextError> {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            err = self.done() => Err(err),
            out = fut => Ok(out),
        }
    }
}
