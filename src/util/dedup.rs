//! Request deduplication for concurrent async operations.
//!
//! [`Dedup`] collapses concurrent requests with the same key into one
//! execution. The first caller (the leader) runs the operation; later callers
//! (followers) wait for its result.
//!
//! # Cancellation
//!
//! Dropping the leader's future abandons its flight. Waiting followers wake,
//! and one of them starts the operation again as the new leader. A follower
//! therefore never observes a result the leader did not finish producing.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, OnceCell};

/// One in-flight execution.
struct Flight<V, E> {
    result: OnceCell<Result<V, E>>,
    abandoned: AtomicBool,
    notify: Notify,
}

impl<V, E> Flight<V, E> {
    fn new() -> Self {
        Self {
            result: OnceCell::new(),
            abandoned: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }
}

/// Request deduplication keyed by `K`.
pub struct Dedup<K, V, E> {
    in_flight: Mutex<HashMap<K, Arc<Flight<V, E>>>>,
}

/// Retires a flight when the leader finishes or is dropped mid-operation.
struct LeaderGuard<'a, K: Hash + Eq, V, E> {
    dedup: &'a Dedup<K, V, E>,
    key: K,
    flight: Arc<Flight<V, E>>,
}

impl<K: Hash + Eq, V, E> Drop for LeaderGuard<'_, K, V, E> {
    fn drop(&mut self) {
        if self.flight.result.get().is_none() {
            self.flight.abandoned.store(true, Ordering::SeqCst);
        }
        {
            let mut map = self.dedup.in_flight.lock().unwrap();
            if map
                .get(&self.key)
                .is_some_and(|current| Arc::ptr_eq(current, &self.flight))
            {
                map.remove(&self.key);
            }
        }
        self.flight.notify.notify_waiters();
    }
}

impl<K, V, E> Dedup<K, V, E>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
    E: Clone + Send,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Execute an async operation with request deduplication.
    ///
    /// If a request with this key is already in flight, wait for it and
    /// return a clone of its result. Otherwise run `f`.
    pub async fn call<F, Fut>(&self, key: K, f: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        loop {
            let (flight, is_leader) = {
                let mut map = self.in_flight.lock().unwrap();
                match map.get(&key) {
                    Some(flight) => (Arc::clone(flight), false),
                    None => {
                        let flight = Arc::new(Flight::new());
                        map.insert(key.clone(), Arc::clone(&flight));
                        (flight, true)
                    }
                }
            };

            if is_leader {
                let guard = LeaderGuard {
                    dedup: self,
                    key: key.clone(),
                    flight,
                };
                let result = f().await;
                let _ = guard.flight.result.set(result.clone());
                drop(guard);
                return result;
            }

            // The notified future sees notify_waiters() from the moment it is
            // created, so register before checking state.
            loop {
                let notified = flight.notify.notified();
                if let Some(result) = flight.result.get() {
                    return result.clone();
                }
                if flight.abandoned.load(Ordering::SeqCst) {
                    break;
                }
                notified.await;
            }
        }
    }

    /// Returns the number of requests currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }
}

impl<K, V, E> Default for Dedup<K, V, E>
where
    K: Hash + Eq + Clone + Send,
    V: Clone + Send,
    E: Clone + Send,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_single_call() {
        let dedup: Dedup<String, i32, String> = Dedup::new();
        assert_eq!(dedup.call("key".to_string(), || async { Ok(42) }).await, Ok(42));
        assert_eq!(
            dedup
                .call("key".to_string(), || async { Err("boom".to_string()) })
                .await,
            Err("boom".to_string())
        );
        assert_eq!(dedup.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_same_key_runs_once() {
        let dedup: Arc<Dedup<String, i32, ()>> = Arc::new(Dedup::new());
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = vec![];
        for _ in 0..5 {
            let dedup = Arc::clone(&dedup);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                dedup
                    .call("pull".to_string(), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        sleep(Duration::from_millis(50)).await;
                        Ok(7)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dedup.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_sequential_calls_both_run() {
        let dedup: Dedup<String, i32, ()> = Dedup::new();
        assert_eq!(dedup.call("k".to_string(), || async { Ok(1) }).await, Ok(1));
        assert_eq!(dedup.call("k".to_string(), || async { Ok(2) }).await, Ok(2));
    }

    #[tokio::test]
    async fn test_cancelled_leader_hands_over() {
        let dedup: Arc<Dedup<String, i32, ()>> = Arc::new(Dedup::new());

        let leader = {
            let dedup = Arc::clone(&dedup);
            tokio::spawn(async move {
                dedup
                    .call("key".to_string(), || async {
                        sleep(Duration::from_secs(60)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        sleep(Duration::from_millis(10)).await;
        assert_eq!(dedup.in_flight_count(), 1);

        let follower = {
            let dedup = Arc::clone(&dedup);
            tokio::spawn(async move {
                dedup
                    .call("key".to_string(), || async { Ok(2) })
                    .await
            })
        };
        sleep(Duration::from_millis(10)).await;

        leader.abort();
        let _ = leader.await;

        let result = tokio::time::timeout(Duration::from_secs(5), follower)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Ok(2));
        assert_eq!(dedup.in_flight_count(), 0);
    }
}
