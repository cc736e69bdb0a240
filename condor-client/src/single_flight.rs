//! Per-key de-duplication of in-flight calls.
//!
//! Concurrent callers of the same key share one pending future. A failure
//! clears the key as soon as it settles; a success keeps answering new
//! callers until its cooldown has elapsed.

use condor_core::CondorResult;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type SharedCall<T> = Shared<BoxFuture<'static, CondorResult<T>>>;

struct Flight<T> {
    id: u64,
    call: SharedCall<T>,
    settled_at: Option<Instant>,
}

/// Coalesces concurrent calls per key.
pub struct SingleFlight<T> {
    slots: Arc<Mutex<HashMap<String, Flight<T>>>>,
    cooldown: Duration,
    next_id: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(cooldown: Duration) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            cooldown,
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `make()` unless a flight for `key` is pending or cooling down, in
    /// which case its result is shared instead.
    pub async fn run<F, Fut>(&self, key: &str, make: F) -> CondorResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CondorResult<T>> + Send + 'static,
    {
        let call = {
            let mut slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());
            match slots.get(key) {
                Some(flight) if self.is_live(flight) => {
                    tracing::debug!(key = %key, "Joining in-flight call");
                    flight.call.clone()
                }
                _ => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let call = self.settle_into_slot(key, id, make());
                    slots.insert(
                        key.to_string(),
                        Flight {
                            id,
                            call: call.clone(),
                            settled_at: None,
                        },
                    );
                    call
                }
            }
        };
        call.await
    }

    /// Drop any pending or cooling flight for `key`. Current waiters keep
    /// their shared future.
    pub fn forget(&self, key: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());
        slots.remove(key);
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());
        slots.get(key).is_some_and(|flight| self.is_live(flight))
    }

    fn is_live(&self, flight: &Flight<T>) -> bool {
        match flight.settled_at {
            None => true,
            Some(settled_at) => settled_at.elapsed() < self.cooldown,
        }
    }

    fn settle_into_slot<Fut>(&self, key: &str, id: u64, fut: Fut) -> SharedCall<T>
    where
        Fut: Future<Output = CondorResult<T>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        let key = key.to_string();
        async move {
            let result = fut.await;
            let mut slots = slots.lock().unwrap_or_else(|err| err.into_inner());
            let owned = slots.get(&key).is_some_and(|flight| flight.id == id);
            if owned {
                match &result {
                    Ok(_) => {
                        if let Some(flight) = slots.get_mut(&key) {
                            flight.settled_at = Some(Instant::now());
                        }
                    }
                    Err(_) => {
                        slots.remove(&key);
                    }
                }
            }
            result
        }
        .boxed()
        .shared()
    }
}

impl<T> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.lock().map(|slots| slots.len()).unwrap_or(0);
        f.debug_struct("SingleFlight")
            .field("slots", &slots)
            .field("cooldown", &self.cooldown)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use condor_core::{CondorError, RemoteError};
    use std::sync::atomic::AtomicUsize;

    fn counting_call(
        counter: &Arc<AtomicUsize>,
        result: CondorResult<u32>,
    ) -> impl Future<Output = CondorResult<u32>> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            result
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_call() {
        let flight = SingleFlight::new(Duration::from_secs(3));
        let counter = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            flight.run("me", || counting_call(&counter, Ok(7))),
            flight.run("me", || counting_call(&counter, Ok(8))),
        );

        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_reused_during_cooldown_only() {
        let flight = SingleFlight::new(Duration::from_secs(3));
        let counter = Arc::new(AtomicUsize::new(0));

        flight.run("me", || counting_call(&counter, Ok(1))).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(flight.run("me", || counting_call(&counter, Ok(2))).await.unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(flight.run("me", || counting_call(&counter, Ok(3))).await.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_clears_slot_immediately() {
        let flight = SingleFlight::new(Duration::from_secs(3));
        let counter = Arc::new(AtomicUsize::new(0));
        let failure: CondorError = RemoteError::Transport {
            reason: "reset".to_string(),
        }
        .into();

        assert!(flight
            .run("me", || counting_call(&counter, Err(failure)))
            .await
            .is_err());
        assert!(!flight.is_in_flight("me"));
        assert_eq!(flight.run("me", || counting_call(&counter, Ok(5))).await.unwrap(), 5);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let flight = SingleFlight::new(Duration::from_secs(3));
        let counter = Arc::new(AtomicUsize::new(0));
        let (a, b) = tokio::join!(
            flight.run("a", || counting_call(&counter, Ok(1))),
            flight.run("b", || counting_call(&counter, Ok(2))),
        );
        assert_eq!((a.unwrap(), b.unwrap()), (1, 2));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forget_starts_fresh_call() {
        let flight = SingleFlight::new(Duration::from_secs(3));
        let counter = Arc::new(AtomicUsize::new(0));
        flight.run("me", || counting_call(&counter, Ok(1))).await.unwrap();
        flight.forget("me");
        assert_eq!(flight.run("me", || counting_call(&counter, Ok(2))).await.unwrap(), 2);
    }
}
