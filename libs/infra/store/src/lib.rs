//! C1 KV Buffer Store and C2 Chunk Data/Metadata Store.

pub mod buffer_store;
pub mod chunk_store;
pub mod errors;

pub use buffer_store::{BufferStore, FsBufferStore, MemoryBufferStore};
pub use chunk_store::{ChunkDataStore, ChunkMetadataStore};
pub use errors::StoreError;
