//! Chunk and chunk-metadata data model.

use crate::id::Digest32;

/// Maximum chunk payload size: 256 KiB.
pub const MAX_CHUNK_SIZE: usize = 256 * 1024;

/// `chunk_key = data_root ‖ relative_offset`, the content-addressed key
/// shared by the chunk data store and the chunk metadata store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ChunkKey {
    pub data_root: Digest32,
    pub relative_offset: u64,
}

impl ChunkKey {
    pub fn new(data_root: Digest32, relative_offset: u64) -> Self {
        Self {
            data_root,
            relative_offset,
        }
    }

    /// Serializes to the 40-byte on-disk/in-memory key form.
    pub fn to_bytes(&self) -> [u8; 40] {
        let mut out = [0u8; 40];
        out[..32].copy_from_slice(self.data_root.as_bytes());
        out[32..].copy_from_slice(&self.relative_offset.to_be_bytes());
        out
    }
}

/// A validated chunk: bytes plus the Merkle proof that ties them to
/// `data_root` at `offset`.
#[derive(Clone, Debug)]
pub struct Chunk {
    pub data_root: Digest32,
    pub relative_offset: u64,
    pub bytes: Vec<u8>,
}

/// `(data_root, data_size, data_path, hash, offset)` as specified in §3.
/// `data_path` is the serialized Merkle proof; it is opaque to everything
/// except the data-root verifier.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ChunkMetadata {
    pub data_root: [u8; 32],
    pub data_size: u64,
    pub data_path: Vec<u8>,
    pub hash: [u8; 32],
    pub offset: u64,
}

/// `(absolute_end_offset, size)` as returned by a chain source.
#[derive(Clone, Copy, Debug)]
pub struct TxOffset {
    pub absolute_end_offset: u64,
    pub size: u64,
}

impl TxOffset {
    /// The absolute offset of the transaction's first byte.
    pub fn start(&self) -> u64 {
        self.absolute_end_offset - self.size + 1
    }

    /// Whether `absolute` falls within this transaction's byte range.
    pub fn contains(&self, absolute: u64) -> bool {
        absolute >= self.start() && absolute <= self.absolute_end_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_offset_start_and_contains() {
        let t = TxOffset {
            absolute_end_offset: 1000,
            size: 300,
        };
        assert_eq!(t.start(), 701);
        assert!(t.contains(701));
        assert!(t.contains(1000));
        assert!(!t.contains(700));
        assert!(!t.contains(1001));
    }
}
