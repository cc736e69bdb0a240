//! Resilient call executor: timeout, retry and backoff around remote calls.
//!
//! Attempt 0 waits a random jitter, attempt `n` waits `base * 2^(n-1)`, and a
//! network-classified failure adds a random penalty on top. Authentication
//! failures are returned after the first attempt. When every attempt fails
//! the last error is returned unchanged.

use crate::single_flight::SingleFlight;
use condor_core::{CondorError, CondorResult, ErrorClass, RemoteError, RetryConfig};
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Wraps remote calls with the configured retry policy. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Executor {
    config: Arc<RetryConfig>,
}

impl Executor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `call` until it succeeds, fails with an authentication error, or
    /// the attempt budget is spent.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> CondorResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CondorResult<T>>,
    {
        let started = Instant::now();
        let max_attempts = self.config.max_attempts.max(1);
        let mut penalty = Duration::ZERO;

        for attempt in 0..max_attempts {
            let delay = self.delay_before(attempt) + penalty;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            tracing::debug!(
                operation = %operation,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Calling remote"
            );

            let timeout = self.config.attempt_timeout();
            let result = match tokio::time::timeout(timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(RemoteError::Timeout {
                    operation: operation.to_string(),
                    timeout_ms: self.config.attempt_timeout_ms,
                }
                .into()),
            };

            let err = match result {
                Ok(value) => {
                    tracing::debug!(
                        operation = %operation,
                        attempt = attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Remote call succeeded"
                    );
                    return Ok(value);
                }
                Err(err) => err,
            };

            let class = err.classify();
            if class == ErrorClass::Authentication {
                tracing::error!(
                    operation = %operation,
                    attempt = attempt,
                    error = %err,
                    "Authentication failure, not retrying"
                );
                return Err(err);
            }
            if attempt + 1 >= max_attempts {
                tracing::error!(
                    operation = %operation,
                    attempts = attempt + 1,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %err,
                    "Remote call failed after final attempt"
                );
                return Err(err);
            }

            penalty = if class == ErrorClass::Network {
                random_between(
                    self.config.network_penalty_min_ms,
                    self.config.network_penalty_max_ms,
                )
            } else {
                Duration::ZERO
            };
            tracing::warn!(
                operation = %operation,
                attempt = attempt,
                network = class == ErrorClass::Network,
                error = %err,
                "Remote call failed, retrying"
            );
        }

        // max_attempts >= 1, so the loop always returns.
        Err(CondorError::Remote(RemoteError::Transport {
            reason: format!("{} made no attempt", operation),
        }))
    }

    /// Like [`execute`](Self::execute), but concurrent callers sharing
    /// `operation` on the same `flight` receive one shared result.
    pub async fn execute_coalesced<T, F, Fut>(
        &self,
        flight: &SingleFlight<T>,
        operation: &str,
        call: F,
    ) -> CondorResult<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = CondorResult<T>> + Send + 'static,
    {
        let executor = self.clone();
        let name = operation.to_string();
        flight
            .run(operation, move || async move { executor.execute(&name, call).await })
            .await
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            random_between(
                self.config.initial_delay_min_ms,
                self.config.initial_delay_max_ms,
            )
        } else {
            self.config.backoff_for(attempt)
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

fn random_between(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::rng().random_range(min_ms..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn transport() -> CondorError {
        RemoteError::Transport {
            reason: "connection reset".to_string(),
        }
        .into()
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_makes_one_attempt() {
        let executor = Executor::default();
        let calls = AtomicUsize::new(0);

        let result: CondorResult<()> = executor
            .execute("auth.me", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(RemoteError::Unauthenticated {
                        reason: "expired".to_string(),
                    }
                    .into())
                }
            })
            .await;

        assert!(result.unwrap_err().is_authentication());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_follow_backoff_schedule() {
        let executor = Executor::default();
        let calls = AtomicUsize::new(0);
        let started = Instant::now();

        let result: CondorResult<()> = executor
            .execute("entities.list", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transport()) }
            })
            .await;

        assert_eq!(result.unwrap_err(), transport());
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        // jitter 0.3..0.8s + 3 + 6 + 12 + 24s + four penalties of 3..4s
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(45_300 + 12_000), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(45_800 + 16_000), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_network_failure_skips_penalty() {
        let executor = Executor::new(RetryConfig {
            max_attempts: 2,
            ..RetryConfig::default()
        });
        let started = Instant::now();

        let result: CondorResult<()> = executor
            .execute("entities.get", || async {
                Err(RemoteError::Remote {
                    status: 503,
                    message: "maintenance".to_string(),
                }
                .into())
            })
            .await;

        assert!(result.is_err());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(3_300), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(3_800), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_network_failure() {
        let executor = Executor::new(RetryConfig::immediate(2));
        let calls = AtomicUsize::new(0);

        let result: CondorResult<u8> = executor
            .execute("entities.list", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(120)).await;
                    Ok(1)
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, CondorError::Remote(RemoteError::Timeout { .. })));
        assert_eq!(err.classify(), ErrorClass::Network);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failure() {
        let executor = Executor::default();
        let calls = AtomicUsize::new(0);

        let result = executor
            .execute("entities.list", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(transport())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesced_calls_hit_remote_once() {
        let executor = Executor::new(RetryConfig::immediate(1));
        let flight = SingleFlight::new(Duration::from_secs(3));
        let calls = Arc::new(AtomicUsize::new(0));

        let call = |calls: Arc<AtomicUsize>| {
            move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, CondorError>("me".to_string())
                }
            }
        };

        let (a, b) = tokio::join!(
            executor.execute_coalesced(&flight, "auth.me", call(Arc::clone(&calls))),
            executor.execute_coalesced(&flight, "auth.me", call(Arc::clone(&calls))),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
