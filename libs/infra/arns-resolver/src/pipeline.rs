//! C7: ArNS resolver pipeline — cache-then-fan-out name resolution.
//!
//! **Open question 1 (resolver ordering).** Resolvers are tried in
//! strict preference order: resolver `k+1` is only consulted once
//! resolver `k` has settled (succeeded, failed, or timed out). This
//! matches the test suite's assumption of "strict preference order with
//! a concurrency cap" rather than a first-to-settle race. The
//! concurrency cap instead bounds how many distinct *names* this
//! pipeline resolves at once.
//!
//! **Open question 2 (exhaustion policy).** When every resolver is
//! exhausted without success, the pipeline returns a negative
//! resolution rather than serving a stale cache entry. Callers that
//! want stale-while-revalidate behavior can read the stale entry
//! themselves before calling `resolve`.

use async_trait::async_trait;
use gateway_types::{ArnsResolution, GatewayError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{instrument, warn};

#[async_trait]
pub trait NameResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<ArnsResolution, GatewayError>;

    fn name(&self) -> &str;
}

pub struct ArnsResolverPipeline {
    resolvers: Vec<Arc<dyn NameResolver>>,
    cache: Mutex<HashMap<String, ArnsResolution>>,
    concurrency: Arc<Semaphore>,
    resolver_timeout: Duration,
}

impl ArnsResolverPipeline {
    pub fn new(resolvers: Vec<Arc<dyn NameResolver>>, max_concurrent: usize, resolver_timeout: Duration) -> Self {
        Self {
            resolvers,
            cache: Mutex::new(HashMap::new()),
            concurrency: Arc::new(Semaphore::new(max_concurrent.max(1))),
            resolver_timeout,
        }
    }

    fn cached(&self, name: &str, now_ms: u64) -> Option<ArnsResolution> {
        let cache = self.cache.lock().unwrap();
        let entry = cache.get(name)?;
        if entry.is_fresh(now_ms) {
            Some(entry.clone())
        } else {
            None
        }
    }

    #[instrument(skip(self), fields(name = %name))]
    pub async fn resolve(&self, name: &str, now_ms: u64) -> ArnsResolution {
        if let Some(hit) = self.cached(name, now_ms) {
            return hit;
        }

        let _permit = self.concurrency.acquire().await.expect("semaphore never closed");
        // Re-check: another caller may have populated the cache while we
        // waited for a permit.
        if let Some(hit) = self.cached(name, now_ms) {
            return hit;
        }

        match self.resolve_in_order(name).await {
            Some(resolution) => {
                self.cache.lock().unwrap().insert(name.to_string(), resolution.clone());
                resolution
            }
            None => ArnsResolution::negative(name, now_ms),
        }
    }

    async fn resolve_in_order(&self, name: &str) -> Option<ArnsResolution> {
        for resolver in &self.resolvers {
            match timeout(self.resolver_timeout, resolver.resolve(name)).await {
                Ok(Ok(resolution)) => return Some(resolution),
                Ok(Err(e)) => {
                    warn!(resolver = resolver.name(), error = %e, "resolver failed");
                }
                Err(_elapsed) => {
                    warn!(resolver = resolver.name(), "resolver timed out");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    struct FixedResolver {
        label: &'static str,
        outcome: Result<ArnsResolution, GatewayError>,
        delay: StdDuration,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl NameResolver for FixedResolver {
        async fn resolve(&self, name: &str) -> Result<ArnsResolution, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match &self.outcome {
                Ok(r) => Ok(ArnsResolution { name: name.to_string(),..r.clone() }),
                Err(e) => Err(e.clone()),
            }
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    fn ok_resolution(process_id: &str) -> ArnsResolution {
        ArnsResolution {
            name: String::new(),
            resolved_id: Some("tx-id".into()),
            resolved_at_ms: 0,
            ttl_s: 300,
            process_id: Some(process_id.into()),
            limit: None,
            index: None,
        }
    }

    #[tokio::test]
    async fn s5_fresh_cache_entry_never_touches_resolvers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = Arc::new(FixedResolver {
                label: "r1",
                outcome: Ok(ok_resolution("proc")),
                delay: StdDuration::ZERO,
                calls: calls.clone(),
        });
        let pipeline = ArnsResolverPipeline::new(vec![resolver], 4, Duration::from_millis(500));
        pipeline.cache.lock().unwrap().insert(
            "foo".into(),
            ArnsResolution {
                name: "foo".into(),
                resolved_id: Some("cached-tx".into()),
                resolved_at_ms: 100_000 - 100_000,
                ttl_s: 300,
                process_id: None,
                limit: None,
                index: None,
            },
        );
        let result = pipeline.resolve("foo", 100_000 - 100_000 + 100 * 1000).await;
        assert_eq!(result.resolved_id.as_deref(), Some("cached-tx"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn s5_expired_cache_entry_consults_resolvers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = Arc::new(FixedResolver {
                label: "r1",
                outcome: Ok(ok_resolution("proc")),
                delay: StdDuration::ZERO,
                calls: calls.clone(),
        });
        let pipeline = ArnsResolverPipeline::new(vec![resolver], 4, Duration::from_millis(500));
        pipeline.cache.lock().unwrap().insert(
            "foo".into(),
            ArnsResolution {
                name: "foo".into(),
                resolved_id: Some("cached-tx".into()),
                resolved_at_ms: 0,
                ttl_s: 300,
                process_id: None,
                limit: None,
                index: None,
            },
        );
        let result = pipeline.resolve("foo", 301_000).await;
        assert_eq!(result.process_id.as_deref(), Some("proc"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn strict_preference_order_prefers_first_resolver_even_if_slower() {
        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_calls = Arc::new(AtomicUsize::new(0));
        let first = Arc::new(FixedResolver {
                label: "first",
                outcome: Ok(ok_resolution("from-first")),
                delay: StdDuration::from_millis(20),
                calls: first_calls.clone(),
        });
        let second = Arc::new(FixedResolver {
                label: "second",
                outcome: Ok(ok_resolution("from-second")),
                delay: StdDuration::ZERO,
                calls: second_calls.clone(),
        });
        let pipeline = ArnsResolverPipeline::new(vec![first, second], 4, Duration::from_millis(500));
        let result = pipeline.resolve("foo", 0).await;
        assert_eq!(result.process_id.as_deref(), Some("from-first"));
        assert_eq!(second_calls.load(Ordering::SeqCst), 0, "second resolver never consulted");
    }

    #[tokio::test]
    async fn falls_through_to_next_resolver_on_failure() {
        let first = Arc::new(FixedResolver {
                label: "first",
                outcome: Err(GatewayError::Unavailable("down".into())),
                delay: StdDuration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
        });
        let second = Arc::new(FixedResolver {
                label: "second",
                outcome: Ok(ok_resolution("from-second")),
                delay: StdDuration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
        });
        let pipeline = ArnsResolverPipeline::new(vec![first, second], 4, Duration::from_millis(500));
        let result = pipeline.resolve("foo", 0).await;
        assert_eq!(result.process_id.as_deref(), Some("from-second"));
    }

    #[tokio::test]
    async fn a_hung_resolver_does_not_delay_past_its_timeout() {
        let hung = Arc::new(FixedResolver {
                label: "hung",
                outcome: Ok(ok_resolution("unreachable")),
                delay: StdDuration::from_secs(60),
                calls: Arc::new(AtomicUsize::new(0)),
        });
        let second = Arc::new(FixedResolver {
                label: "second",
                outcome: Ok(ok_resolution("from-second")),
                delay: StdDuration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
        });
        let pipeline = ArnsResolverPipeline::new(vec![hung, second], 4, Duration::from_millis(50));
        let started = tokio::time::Instant::now();
        let result = pipeline.resolve("foo", 0).await;
        assert!(started.elapsed() < StdDuration::from_secs(1));
        assert_eq!(result.process_id.as_deref(), Some("from-second"));
    }

    #[tokio::test]
    async fn exhaustion_yields_a_negative_resolution_not_stale_cache() {
        let first = Arc::new(FixedResolver {
                label: "first",
                outcome: Err(GatewayError::NotFound),
                delay: StdDuration::ZERO,
                calls: Arc::new(AtomicUsize::new(0)),
        });
        let pipeline = ArnsResolverPipeline::new(vec![first], 4, Duration::from_millis(500));
        pipeline.cache.lock().unwrap().insert(
            "foo".into(),
            ArnsResolution {
                name: "foo".into(),
                resolved_id: Some("stale-tx".into()),
                resolved_at_ms: 0,
                ttl_s: 1,
                process_id: None,
                limit: None,
                index: None,
            },
        );
        let result = pipeline.resolve("foo", 10_000).await;
        assert!(result.resolved_id.is_none());
        assert_eq!(result.ttl_s, 0);
    }
}
