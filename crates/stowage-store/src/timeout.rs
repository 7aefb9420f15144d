use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Operation, StoreError, StoreResult};

/// Deadline and cancellation scope for a single store operation.
///
/// A zero timeout means the scope never expires. Otherwise the deadline is
/// fixed at creation, so every downstream call made under the scope shares
/// one budget.
///
/// Dropping the scope cancels it. Background work started under the scope
/// should watch a [`token`](Self::token) so it ends when the operation does,
/// whichever path the operation returns by.
#[derive(Debug)]
pub struct TimeoutScope {
    timeout: Duration,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl TimeoutScope {
    pub fn new(timeout: Duration) -> Self {
        let deadline = if timeout.is_zero() {
            None
        } else {
            Some(Instant::now() + timeout)
        };
        Self {
            timeout,
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// A scope without a deadline.
    pub fn unbounded() -> Self {
        Self::new(Duration::ZERO)
    }

    /// The configured timeout (zero for unbounded scopes).
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_unbounded(&self) -> bool {
        self.deadline.is_none()
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// A token that fires when this scope times out or is dropped.
    pub fn token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Await `fut` within the scope's deadline.
    ///
    /// On expiry the future is dropped, the scope is cancelled and a
    /// [`StoreError::Timeout`] for `op` is returned. Dropping the future
    /// stops waiting; it does not undo work the collaborator already
    /// accepted.
    pub async fn run<T, F>(&self, op: Operation, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let Some(deadline) = self.deadline else {
            return fut.await;
        };
        match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                debug!(%op, timeout = ?self.timeout, "operation deadline elapsed");
                self.cancel.cancel();
                Err(StoreError::Timeout {
                    op,
                    after: self.timeout,
                })
            }
        }
    }
}

impl Drop for TimeoutScope {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
