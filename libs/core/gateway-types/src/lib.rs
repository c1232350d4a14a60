//! Shared data model for the gateway's chunk-and-data retrieval core:
//! identifiers, chunks, data items, ArNS resolutions, peers, request
//! attributes, and the caller-visible error kinds.

pub mod arns;
pub mod chunk;
pub mod data_item;
pub mod error;
pub mod id;
pub mod peer;
pub mod request_attributes;

pub use arns::{ArnsRegistryRecord, ArnsResolution};
pub use chunk::{Chunk, ChunkKey, ChunkMetadata, TxOffset, MAX_CHUNK_SIZE};
pub use data_item::{DataItem, SignatureType, UnbundleEvent};
pub use error::{GatewayError, SourceFailure};
pub use id::Digest32;
pub use peer::{Peer, PeerCategory};
pub use request_attributes::{RequestAttributes, DEFAULT_MAX_HOPS};
