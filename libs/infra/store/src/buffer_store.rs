//! C1: unified key→bytes mapping with lifecycle (fs / in-memory LRU).
//! Every key in this system is content-addressed, so a `put` under a key
//! that already holds a value is treated as a successful no-op rather
//! than an error or overwrite.

use crate::errors::StoreError;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::warn;

#[async_trait]
pub trait BufferStore: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    async fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError>;
    async fn has(&self, key: &[u8]) -> Result<bool, StoreError>;
    async fn del(&self, key: &[u8]) -> Result<(), StoreError>;
}

/// Content-addressed filesystem store. Keys are hex-encoded; the first
/// byte becomes a two-hex-char fan-out subdirectory so no single
/// directory accumulates an unbounded number of entries.
pub struct FsBufferStore {
    base_dir: PathBuf,
}

impl FsBufferStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, key: &[u8]) -> PathBuf {
        let hex_key = hex::encode(key);
        let (fan_out, rest) = hex_key.split_at(hex_key.len().min(2));
        self.base_dir.join(fan_out).join(rest)
    }
}

#[async_trait]
impl BufferStore for FsBufferStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write to a temp file and rename, so a concurrent duplicate
        // write racing this one never observes a partial file.
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &value).await?;
        match tokio::fs::rename(&tmp_path, &path).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "store write race, discarding duplicate write");
                let _ = tokio::fs::remove_file(&tmp_path).await;
                Ok(())
            }
        }
    }

    async fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.path_for(key)).await?)
    }

    async fn del(&self, key: &[u8]) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory bounded LRU store, used as the hot tier in front of an
/// `FsBufferStore` or as the sole store in tests.
pub struct MemoryBufferStore {
    cache: Mutex<LruCache<Vec<u8>, Vec<u8>>>,
}

impl MemoryBufferStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }
}

#[async_trait]
impl BufferStore for MemoryBufferStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.cache.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        self.cache.lock().await.put(key.to_vec(), value);
        Ok(())
    }

    async fn has(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.cache.lock().await.contains(key))
    }

    async fn del(&self, key: &[u8]) -> Result<(), StoreError> {
        self.cache.lock().await.pop(key);
        Ok(())
    }
}
