//! Cached Call Module
//!
//! Wraps an asynchronous producer with a cache lookup: a hit short-circuits
//! the producer, a miss runs it and stores the result when the result reports
//! success.
//!
//! [`cached_call`] is the plain wrapper and makes no attempt to coalesce
//! concurrent misses. [`SingleFlight`] adds an in-flight map so concurrent
//! misses on one key share a single producer run and its outcome.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::cache::CacheStore;

/// A store shared between tasks.
pub type SharedStore<V> = Arc<RwLock<CacheStore<V>>>;

// == Cacheable ==
/// Decides whether a produced value may be stored.
pub trait Cacheable {
    fn is_cacheable(&self) -> bool;
}

/// JSON results are cached unless they are `null` or carry
/// `"isSuccess": false`. A missing flag counts as success.
impl Cacheable for Value {
    fn is_cacheable(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Object(map) => map.get("isSuccess").and_then(Value::as_bool) != Some(false),
            _ => true,
        }
    }
}

// == Cached Call ==
/// Returns the cached value for `key`, or runs `producer` and caches its
/// result.
///
/// A producer error is returned as-is and nothing is stored. Concurrent
/// callers that miss on the same key each run their own producer.
pub async fn cached_call<V, E, F, Fut>(
    store: &SharedStore<V>,
    key: &str,
    ttl: Option<Duration>,
    producer: F,
) -> Result<V, E>
where
    V: Clone + Cacheable,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    let hit = store.write().await.get(key);
    if let Some(value) = hit {
        debug!(key, "cache hit");
        return Ok(value);
    }

    debug!(key, "cache miss, calling producer");
    let value = producer().await?;
    if value.is_cacheable() {
        store.write().await.set(key, value.clone(), ttl);
    }
    Ok(value)
}

type Flight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

// == Single Flight ==
/// Cached calls with in-flight coalescing.
///
/// While a producer for a key is running, further callers for that key await
/// the same run instead of starting their own. Each run is driven by its own
/// task, so it completes and releases its key even when every caller has
/// gone away. The result is written to the store before the key leaves the
/// in-flight map, so a caller arriving after the run settles finds it in the
/// store.
pub struct SingleFlight<V, E> {
    in_flight: Arc<Mutex<HashMap<String, Flight<V, E>>>>,
}

impl<V, E> Default for SingleFlight<V, E> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<V, E> Clone for SingleFlight<V, E> {
    fn clone(&self) -> Self {
        Self {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<V, E> SingleFlight<V, E>
where
    V: Clone + Cacheable + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Same contract as [`cached_call`], with concurrent misses coalesced.
    pub async fn cached_call<F, Fut>(
        &self,
        store: &SharedStore<V>,
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let flight = {
            let mut in_flight = self.in_flight.lock().await;

            if let Some(existing) = in_flight.get(key) {
                debug!(key, "joining in-flight request");
                existing.clone()
            } else {
                let hit = store.write().await.get(key);
                if let Some(value) = hit {
                    debug!(key, "cache hit");
                    return Ok(value);
                }

                debug!(key, "cache miss, calling producer");
                // The map lock is held until the flight is inserted, so the
                // task cannot remove the key before it is registered.
                let task = tokio::spawn(run_flight(
                    Arc::clone(store),
                    Arc::clone(&self.in_flight),
                    key.to_string(),
                    ttl,
                    producer(),
                ));
                let flight = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(err) => match err.try_into_panic() {
                            Ok(panic) => std::panic::resume_unwind(panic),
                            // Only reachable while the runtime shuts down.
                            Err(err) => std::panic::resume_unwind(Box::new(err.to_string())),
                        },
                    }
                }
                .boxed()
                .shared();
                in_flight.insert(key.to_string(), flight.clone());
                flight
            }
        };

        flight.await
    }

    /// Number of keys with a producer currently running.
    pub async fn in_flight(&self) -> usize {
        self.in_flight.lock().await.len()
    }
}

async fn run_flight<V, E, Fut>(
    store: SharedStore<V>,
    in_flight: Arc<Mutex<HashMap<String, Flight<V, E>>>>,
    key: String,
    ttl: Option<Duration>,
    producer: Fut,
) -> Result<V, E>
where
    V: Clone + Cacheable + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send,
{
    let outcome = AssertUnwindSafe(producer).catch_unwind().await;

    let cacheable = match &outcome {
        Ok(Ok(value)) if value.is_cacheable() => Some(value.clone()),
        _ => None,
    };
    if let Some(value) = cacheable {
        store.write().await.set(key.clone(), value, ttl);
    }
    in_flight.lock().await.remove(&key);

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shared_store() -> SharedStore<Value> {
        Arc::new(RwLock::new(CacheStore::new(
            "test",
            10,
            Duration::from_secs(60),
        )))
    }

    #[test]
    fn test_value_cacheable() {
        assert!(json!({"isSuccess": true, "data": 1}).is_cacheable());
        assert!(json!({"data": 1}).is_cacheable());
        assert!(json!([1, 2]).is_cacheable());
        assert!(!json!({"isSuccess": false}).is_cacheable());
        assert!(!Value::Null.is_cacheable());
    }

    #[tokio::test]
    async fn test_hit_skips_producer() {
        let store = shared_store();
        store.write().await.set("k", json!({"v": 1}), None);

        let result: Result<Value, String> = cached_call(&store, "k", None, || async {
            Err("producer must not run".to_string())
        })
        .await;

        assert_eq!(result.unwrap(), json!({"v": 1}));
    }

    #[tokio::test]
    async fn test_miss_stores_success() {
        let store = shared_store();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let result: Result<Value, String> = cached_call(&store, "k", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"isSuccess": true}))
            })
            .await;
            assert!(result.is_ok());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_result_is_not_cached() {
        let store = shared_store();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result: Result<Value, String> = cached_call(&store, "k", None, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"isSuccess": false, "data": "fail-network"}))
            })
            .await;
            assert_eq!(result.unwrap()["isSuccess"], json!(false));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_producer_error_propagates() {
        let store = shared_store();

        let result: Result<Value, String> =
            cached_call(&store, "k", None, || async { Err("network down".to_string()) }).await;

        assert_eq!(result, Err("network down".to_string()));
        assert!(store.read().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_ttl_is_applied() {
        let store = shared_store();
        let _: Result<Value, String> = cached_call(
            &store,
            "k",
            Some(Duration::from_secs(5)),
            || async { Ok(json!(1)) },
        )
        .await;

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.write().await.get("k"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_coalesces_concurrent_misses() {
        let store = shared_store();
        let flight: SingleFlight<Value, String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let store = Arc::clone(&store);
            let flight = flight.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flight
                    .cached_call(&store, "k", None, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(json!({"price": 42}))
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), json!({"price": 42}));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight().await, 0);
        assert!(store.read().await.contains_key("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_shares_errors() {
        let store = shared_store();
        let flight: SingleFlight<Value, String> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..3 {
            let store = Arc::clone(&store);
            let flight = flight.clone();
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                flight
                    .cached_call(&store, "k", None, move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<Value, _>("upstream 502".to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Err("upstream 502".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The slot is released, so the next call retries.
        let retry = flight
            .cached_call(&store, "k", None, || async { Ok(json!(7)) })
            .await;
        assert_eq!(retry, Ok(json!(7)));
    }

    #[tokio::test]
    async fn test_single_flight_does_not_cache_failures() {
        let store = shared_store();
        let flight: SingleFlight<Value, String> = SingleFlight::new();

        let first = flight
            .cached_call(&store, "k", None, || async { Ok(json!({"isSuccess": false})) })
            .await;
        assert!(first.is_ok());
        assert!(store.read().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_completes_after_caller_drops() {
        let store = shared_store();
        let flight: SingleFlight<Value, String> = SingleFlight::new();
        let completed = Arc::new(AtomicUsize::new(0));

        let done = Arc::clone(&completed);
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            flight.cached_call(&store, "k", None, move || async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"price": 1}))
            }),
        )
        .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(flight.in_flight().await, 0);
        assert_eq!(store.write().await.get("k"), Some(json!({"price": 1})));
    }
}
