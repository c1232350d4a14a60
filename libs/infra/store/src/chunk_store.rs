//! C2: content-addressed chunk data and chunk-metadata stores, keyed by
//! `chunk_key = data_root ‖ relative_offset`.

use crate::buffer_store::BufferStore;
use crate::errors::StoreError;
use gateway_types::{Chunk, ChunkKey, ChunkMetadata};
use std::sync::Arc;

pub struct ChunkDataStore {
    inner: Arc<dyn BufferStore>,
}

impl ChunkDataStore {
    pub fn new(inner: Arc<dyn BufferStore>) -> Self {
        Self { inner }
    }

    pub async fn get(&self, key: ChunkKey) -> Result<Option<Chunk>, StoreError> {
        let bytes = self.inner.get(&key.to_bytes()).await?;
        Ok(bytes.map(|bytes| Chunk {
                    data_root: key.data_root,
                    relative_offset: key.relative_offset,
                    bytes,
        }))
    }

    pub async fn put(&self, key: ChunkKey, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.inner.put(&key.to_bytes(), bytes).await
    }

    pub async fn has(&self, key: ChunkKey) -> Result<bool, StoreError> {
        self.inner.has(&key.to_bytes()).await
    }
}

pub struct ChunkMetadataStore {
    inner: Arc<dyn BufferStore>,
}

impl ChunkMetadataStore {
    pub fn new(inner: Arc<dyn BufferStore>) -> Self {
        Self { inner }
    }

    pub async fn get(&self, key: ChunkKey) -> Result<Option<ChunkMetadata>, StoreError> {
        let Some(bytes) = self.inner.get(&key.to_bytes()).await? else {
            return Ok(None);
        };
        let metadata = rmp_serde::from_slice(&bytes)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(Some(metadata))
    }

    pub async fn put(&self, key: ChunkKey, metadata: &ChunkMetadata) -> Result<(), StoreError> {
        let bytes =
        rmp_serde::to_vec(metadata).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.inner.put(&key.to_bytes(), bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_store::MemoryBufferStore;
    use gateway_types::Digest32;

    #[tokio::test]
    async fn chunk_data_round_trips() {
        let store = ChunkDataStore::new(Arc::new(MemoryBufferStore::new(16)));
        let key = ChunkKey::new(Digest32::from_bytes([9u8; 32]), 4096);
        assert!(store.get(key).await.unwrap().is_none());
        store.put(key, vec![1, 2, 3]).await.unwrap();
        let chunk = store.get(key).await.unwrap().unwrap();
        assert_eq!(chunk.bytes, vec![1, 2, 3]);
        assert_eq!(chunk.relative_offset, 4096);
    }

    #[tokio::test]
    async fn chunk_metadata_round_trips() {
        let store = ChunkMetadataStore::new(Arc::new(MemoryBufferStore::new(16)));
        let key = ChunkKey::new(Digest32::from_bytes([3u8; 32]), 0);
        let metadata = ChunkMetadata {
            data_root: [3u8; 32],
            data_size: 1000,
            data_path: vec![0xAA; 64],
            hash: [5u8; 32],
            offset: 0,
        };
        store.put(key, &metadata).await.unwrap();
        let round_tripped = store.get(key).await.unwrap().unwrap();
        assert_eq!(round_tripped.data_size, 1000);
        assert_eq!(round_tripped.data_path, vec![0xAA; 64]);
    }
}
