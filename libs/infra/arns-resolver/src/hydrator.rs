//! Debounced, hydrated ArNS registry cache.

use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use gateway_types::{ArnsRegistryRecord, GatewayError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex as TokioMutex;
use tracing::{instrument, warn};

fn now_ms() -> u64 {
    SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64
}

/// One page of the upstream registry listing.
pub type RegistryPage = (Vec<ArnsRegistryRecord>, Option<String>);

#[async_trait]
pub trait RegistryFetcher: Send + Sync {
    /// Fetches one page given an opaque cursor (`None` for the first
    /// page). The second element of the return value is the cursor for
    /// the next page, or `None` if this was the last page.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<RegistryPage, GatewayError>;
}

type RefreshFuture = Shared<BoxFuture<'static, Result<(), GatewayError>>>;

pub struct RegistryHydrator<F> {
    fetcher: F,
    store: Mutex<HashMap<String, ArnsRegistryRecord>>,
    last_refresh_ms: AtomicU64,
    in_flight: TokioMutex<Option<RefreshFuture>>,
}

impl<F> RegistryHydrator<F>
where
F: RegistryFetcher + Send + Sync + 'static,
{
    pub fn new(fetcher: F) -> Arc<Self> {
        Arc::new(Self {
                fetcher,
                store: Mutex::new(HashMap::new()),
                last_refresh_ms: AtomicU64::new(0),
                in_flight: TokioMutex::new(None),
        })
    }

    pub fn get(&self, name: &str) -> Option<ArnsRegistryRecord> {
        self.store.lock().unwrap().get(name).cloned()
    }

    fn last_refresh_ms(&self) -> u64 {
        self.last_refresh_ms.load(Ordering::SeqCst)
    }

    /// Single-flight refresh: a refresh already in progress is shared,
    /// not duplicated.
    async fn start_or_join_refresh(self: &Arc<Self>) -> RefreshFuture {
        let mut guard = self.in_flight.lock().await;
        if let Some(existing) = guard.as_ref() {
            return existing.clone();
        }
        let this = self.clone();
        let fut: BoxFuture<'static, Result<(), GatewayError>> = Box::pin(async move {
                let result = this.do_hydrate().await;
                *this.in_flight.lock().await = None;
                result
        });
        let shared = fut.shared();
        *guard = Some(shared.clone());
        shared
    }

    async fn fetch_page_with_retries(&self, cursor: Option<&str>) -> Result<RegistryPage, GatewayError> {
        let mut delay_ms = 100u64;
        let mut last_err = None;
        for attempt in 0..=3 {
            match self.fetcher.fetch_page(cursor).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    warn!(attempt, error = %e, "registry page fetch failed");
                    last_err = Some(e);
                    if attempt < 3 {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms *= 2;
                    }
                }
            }
        }
        Err(last_err.unwrap())
    }

    #[instrument(skip(self))]
    async fn do_hydrate(&self) -> Result<(), GatewayError> {
        let mut all_records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let (records, next_cursor) = self.fetch_page_with_retries(cursor.as_deref()).await?;
            all_records.extend(records);
            match next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        {
            let mut store = self.store.lock().unwrap();
            for record in all_records {
                store.insert(record.name.clone(), record);
            }
        }
        self.last_refresh_ms.store(now_ms(), Ordering::SeqCst);
        Ok(())
    }

    pub async fn hydrate_now(self: &Arc<Self>) -> Result<(), GatewayError> {
        let shared = self.start_or_join_refresh().await;
        shared.await
    }

    /// Called on a miss path: the caller awaits the refresh if the
    /// registry is stale by at least `miss_ttl_ms`.
    pub async fn refresh_after_miss(self: &Arc<Self>, miss_ttl_ms: u64) {
        if now_ms().saturating_sub(self.last_refresh_ms()) >= miss_ttl_ms {
            let _ = self.hydrate_now().await;
        }
    }

    /// Called on a hit path: fire-and-forget, never blocks the caller.
    pub fn refresh_after_hit(self: &Arc<Self>, hit_ttl_ms: u64) {
        if now_ms().saturating_sub(self.last_refresh_ms()) >= hit_ttl_ms {
            let this = self.clone();
            tokio::spawn(async move {
                    let _ = this.hydrate_now().await;
            });
        }
    }
}
