//! Cancellation scope for one page load sequence.
//!
//! When the scope is cancelled, operations run through it stop being awaited
//! and report [`CondorError::Cancelled`]. The underlying request is abandoned,
//! not aborted mid-transport.

use condor_core::{CondorError, CondorResult};
use std::future::Future;
use tokio_util::sync::{CancellationToken, DropGuard};

#[derive(Debug, Clone)]
pub struct LoadScope {
    name: String,
    token: CancellationToken,
}

impl LoadScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: CancellationToken::new(),
        }
    }

    /// Scope cancelled together with `self`, but cancellable on its own.
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: self.token.child_token(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        tracing::debug!(scope = %self.name, "Cancelling load scope");
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the scope when the returned guard is dropped.
    pub fn cancel_on_drop(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// Await `fut` unless the scope is cancelled first. A result that arrives
    /// after cancellation is discarded.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> CondorResult<T>
    where
        F: Future<Output = CondorResult<T>>,
    {
        let cancelled = || CondorError::Cancelled {
            operation: operation.to_string(),
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                tracing::debug!(scope = %self.name, operation = %operation, "Abandoned by cancellation");
                Err(cancelled())
            }
            result = fut => {
                if self.token.is_cancelled() {
                    Err(cancelled())
                } else {
                    result
                }
            }
        }
    }
}
