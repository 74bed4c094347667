//! Per-call deadline and cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{UserStoreError, UserStoreResult};

/// Deadline and cancellation token for a single storage call.
///
/// Every [`UserStore`](crate::UserStore) operation receives one. Backends wrap
/// their blocking steps in [`CallContext::run`] so an operation in flight
/// returns [`UserStoreError::Cancelled`] or
/// [`UserStoreError::DeadlineExceeded`] instead of hanging.
#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Option<Instant>,
    token: CancellationToken,
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CallContext {
    /// Creates a context with no deadline and a fresh token.
    pub fn new() -> Self {
        Self {
            deadline: None,
            token: CancellationToken::new(),
        }
    }

    /// Creates a context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline_at(Instant::now() + timeout)
    }

    /// Sets the deadline.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Replaces the cancellation token, e.g. with a child of a shutdown token.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels every operation running under this context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fails immediately if the context is already cancelled or expired.
    pub fn check(&self) -> UserStoreResult<()> {
        if self.token.is_cancelled() {
            return Err(UserStoreError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(UserStoreError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Runs `fut` until it completes, the token is cancelled, or the deadline
    /// passes, whichever comes first.
    pub async fn run<F, T>(&self, fut: F) -> UserStoreResult<T>
    where
        F: Future<Output = UserStoreResult<T>>,
    {
        self.check()?;

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(UserStoreError::Cancelled),
            _ = expired => Err(UserStoreError::DeadlineExceeded),
            result = fut => result,
        }
    }
}
