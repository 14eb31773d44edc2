//! Cancellation and deadline propagation.
//!
//! A [`Ctx`] is the single cancellation value threaded through every
//! suspending call in the engine: DNS lookups, RDAP requests, limiter waits,
//! and backoff sleeps all multiplex their timers against it. Children narrow
//! the deadline, never widen it.

use crate::error::GatherError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

pub use tokio_util::sync::CancellationToken;

/// A cancellable context with an optional deadline.
///
/// Cloning is cheap; a clone observes the same cancellation signal.
#[derive(Debug, Clone)]
pub struct Ctx {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Ctx {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// A context driven by an external cancellation token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child context whose deadline is at most `timeout` from now.
    ///
    /// The child keeps the tighter of its parent's deadline and the new one,
    /// and is cancelled whenever the parent is.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let new_deadline = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < new_deadline => Some(existing),
            _ => Some(new_deadline),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// The deadline, if one is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline. `None` when no deadline is set.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// True once the token fired or the deadline passed.
    pub fn is_done(&self) -> bool {
        self.error().is_some()
    }

    /// Why the context is done, if it is.
    ///
    /// Cancellation wins over deadline expiry when both hold, matching the
    /// precedence the verdict classifier expects.
    pub fn error(&self) -> Option<GatherError> {
        if self.token.is_cancelled() {
            return Some(GatherError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Some(GatherError::DeadlineExceeded);
            }
        }
        None
    }

    /// Sleep for `duration`, waking early if the context finishes first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), GatherError> {
        if duration.is_zero() {
            return match self.error() {
                Some(err) => Err(err),
                None => Ok(()),
            };
        }
        self.bound(tokio::time::sleep(duration)).await
    }

    /// Run `fut` to completion unless the context finishes first.
    pub async fn bound<F, T>(&self, fut: F) -> Result<T, GatherError>
    where
        F: Future<Output = T>,
    {
        if let Some(err) = self.error() {
            return Err(err);
        }
        tokio::pin!(fut);
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(GatherError::Cancelled),
            _ = deadline_expired(self.deadline) => Err(GatherError::DeadlineExceeded),
            value = &mut fut => Ok(value),
        }
    }
}

async fn deadline_expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
