//! C4: read-through cache — wraps a composite source and a
//! content-addressed store, serving from the store when possible and
//! falling through to the network otherwise.

use async_trait::async_trait;
use gateway_composite_source::CompositeSource;
use gateway_types::GatewayError;
use tracing::{instrument, warn};

/// The store half of the cache. Implemented over `gateway-store`'s
/// `ChunkDataStore`/`ChunkMetadataStore` (or any other content-addressed
/// store) by a thin adapter in the caller's crate.
#[async_trait]
pub trait CacheStore<V>: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<V>, GatewayError>;
    async fn put(&self, key: &[u8], value: V) -> Result<(), GatewayError>;
}

pub struct ReadThroughCache<P, V> {
    composite: CompositeSource<P, V>,
    store: Box<dyn CacheStore<V>>,
    key_fn: Box<dyn Fn(&P) -> Vec<u8> + Send + Sync>,
}

impl<P, V> ReadThroughCache<P, V>
where
P: Clone + Send + Sync + 'static,
V: Clone + Send + 'static,
{
    pub fn new(
        composite: CompositeSource<P, V>,
        store: Box<dyn CacheStore<V>>,
        key_fn: impl Fn(&P) -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        Self {
            composite,
            store,
            key_fn: Box::new(key_fn),
        }
    }

    #[instrument(skip(self, params))]
    pub async fn get(&self, params: &P) -> Result<V, GatewayError> {
        let key = (self.key_fn)(params);

        if let Some(value) = self.store.get(&key).await? {
            return Ok(value);
        }

        let value = self.composite.get(params).await?;

        if let Err(e) = self.store.put(&key, value.clone()).await {
            warn!(error = %e, "read-through cache store write failed, serving fetched value anyway");
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_composite_source::Source;
    use std::num::NonZeroUsize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        value: &'static str,
    }

    #[async_trait]
    impl Source<(), String> for CountingSource {
        async fn get(&self, _: &()) -> Result<String, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.to_string())
        }
        fn name(&self) -> &str {
            "counting"
        }
    }

    struct MapStore {
        map: Mutex<std::collections::HashMap<Vec<u8>, String>>,
    }

    #[async_trait]
    impl CacheStore<String> for MapStore {
        async fn get(&self, key: &[u8]) -> Result<Option<String>, GatewayError> {
            Ok(self.map.lock().await.get(key).cloned())
        }
        async fn put(&self, key: &[u8], value: String) -> Result<(), GatewayError> {
            self.map.lock().await.insert(key.to_vec(), value);
            Ok(())
        }
    }

    #[tokio::test]
    async fn miss_then_hit_calls_upstream_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let composite = CompositeSource::sequential(vec![Arc::new(CountingSource {
                        calls: calls.clone(),
                        value: "payload",
        })]);
        let cache = ReadThroughCache::new(
            composite,
            Box::new(MapStore {
                    map: Mutex::new(std::collections::HashMap::new()),
            }),
            |_: &()| b"k".to_vec(),
        );

        let first = cache.get(&()).await.unwrap();
        assert_eq!(first, "payload");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let second = cache.get(&()).await.unwrap();
        assert_eq!(second, "payload");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "hit must not call upstream");
    }

    struct FailingStore;

    #[async_trait]
    impl CacheStore<String> for FailingStore {
        async fn get(&self, _key: &[u8]) -> Result<Option<String>, GatewayError> {
            Ok(None)
        }
        async fn put(&self, _key: &[u8], _value: String) -> Result<(), GatewayError> {
            Err(GatewayError::Unavailable("disk full".into()))
        }
    }

    #[tokio::test]
    async fn store_write_failure_does_not_fail_the_read() {
        let calls = Arc::new(AtomicUsize::new(0));
        let composite = CompositeSource::sequential(vec![Arc::new(CountingSource {
                        calls,
                        value: "ok-anyway",
        })]);
        let cache = ReadThroughCache::new(composite, Box::new(FailingStore), |_: &()| b"k".to_vec());
        let result = cache.get(&()).await.unwrap();
        assert_eq!(result, "ok-anyway");
    }

    #[tokio::test]
    async fn works_with_parallel_composite() {
        let calls = Arc::new(AtomicUsize::new(0));
        let composite = gateway_composite_source::CompositeSource::new(
            vec![Arc::new(CountingSource {
                        calls,
                        value: "v",
            })],
            NonZeroUsize::new(2).unwrap(),
        );
        let cache = ReadThroughCache::new(composite, Box::new(FailingStore), |_: &()| b"k2".to_vec());
        assert_eq!(cache.get(&()).await.unwrap(), "v");
    }
}
