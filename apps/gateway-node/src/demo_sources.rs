//! Narrow stand-ins for the external interfaces this binary composes
//! over: a fixed-layout chain
//! index and an in-memory chunk source. A production deployment swaps
//! these for HTTP peers and the real chain/data index; the composition
//! of C3 → C4 → C6 around them is unaffected.

use async_trait::async_trait;
use gateway_composite_source::Source as CompositeSourceTrait;
use gateway_read_through_cache::CacheStore;
use gateway_tx_assembler::ChainSource;
use gateway_types::{GatewayError, TxOffset};
use std::collections::HashMap;
use std::sync::Mutex;

/// A chain index with a handful of known transactions, standing in for
/// a real GraphQL/L1 chain source.
pub struct FixedChainIndex {
    offsets: HashMap<String, TxOffset>,
}

impl FixedChainIndex {
    pub fn new(offsets: HashMap<String, TxOffset>) -> Self {
        Self { offsets }
    }
}

#[async_trait]
impl ChainSource for FixedChainIndex {
    async fn get_tx_offset(&self, tx_id: &str) -> Result<TxOffset, GatewayError> {
        self.offsets.get(tx_id).copied().ok_or(GatewayError::NotFound)
    }
}

/// A single in-memory chunk source keyed by absolute offset, standing
/// in for a peer's `/chunk/{offset}` endpoint.
pub struct InMemoryChunkSource {
    chunks: HashMap<u64, Vec<u8>>,
}

impl InMemoryChunkSource {
    pub fn new(chunks: HashMap<u64, Vec<u8>>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl CompositeSourceTrait<u64, Vec<u8>> for InMemoryChunkSource {
    async fn get(&self, offset: &u64) -> Result<Vec<u8>, GatewayError> {
        self.chunks.get(offset).cloned().ok_or(GatewayError::NotFound)
    }

    fn name(&self) -> &str {
        "in-memory-chunk-source"
    }
}

/// Adapts `gateway_store::buffer_store::BufferStore` onto the cache's
/// `CacheStore<Vec<u8>>` capability.
pub struct BufferStoreCacheAdapter {
    inner: std::sync::Arc<dyn gateway_store::BufferStore>,
}

impl BufferStoreCacheAdapter {
    pub fn new(inner: std::sync::Arc<dyn gateway_store::BufferStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CacheStore<Vec<u8>> for BufferStoreCacheAdapter {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, GatewayError> {
        self.inner
        .get(key)
        .await
        .map_err(|e| GatewayError::Unavailable(e.to_string()))
    }

    async fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), GatewayError> {
        self.inner
        .put(key, value)
        .await
        .map_err(|e| GatewayError::Unavailable(e.to_string()))
    }
}

/// Adapts the read-through cache onto the assembler's
/// `ChunkByOffsetSource` capability (spec's "C6→C4→C3" composition).
pub struct CachedChunkByOffsetSource {
    cache: std::sync::Arc<gateway_read_through_cache::ReadThroughCache<u64, Vec<u8>>>,
}

impl CachedChunkByOffsetSource {
    pub fn new(cache: std::sync::Arc<gateway_read_through_cache::ReadThroughCache<u64, Vec<u8>>>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl gateway_tx_assembler::ChunkByOffsetSource for CachedChunkByOffsetSource {
    async fn get_chunk_at(&self, absolute_offset: u64) -> Result<Vec<u8>, GatewayError> {
        self.cache.get(&absolute_offset).await
    }
}

impl Clone for CachedChunkByOffsetSource {
    fn clone(&self) -> Self {
        Self { cache: self.cache.clone() }
    }
}

/// A poor-man's hop/ArNS-record ledger so repeated requests for the
/// same few demo names don't require a real resolver deployment.
pub struct InMemoryArnsRegistry {
    records: Mutex<HashMap<String, gateway_types::ArnsRegistryRecord>>,
}

impl Default for InMemoryArnsRegistry {
    fn default() -> Self {
        Self { records: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl gateway_arns_resolver::RegistryFetcher for InMemoryArnsRegistry {
    async fn fetch_page(
        &self,
        _cursor: Option<&str>,
    ) -> Result<gateway_arns_resolver::RegistryPage, GatewayError> {
        let records = self.records.lock().unwrap().values().cloned().collect();
        Ok((records, None))
    }
}
