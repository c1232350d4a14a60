//! CDB64 reader: a constant database
//! keyed by 32-byte ids, used as the root-tx-id index. Single-file and
//! 256-way-partitioned forms.
//!
//! Wire format (this crate's own, since only the key/value *contract*
//! is externally specified): an 8-byte magic, a `u64` record count, then
//! that many fixed 44-byte index entries `(key:32B, value_offset:u64,
//! value_len:u32)` sorted ascending by key, followed by the
//! MessagePack-encoded value bytes themselves.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

const MAGIC: &[u8; 8] = b"CDB64\0\0\0";
const INDEX_ENTRY_LEN: usize = 32 + 8 + 4;

#[derive(Debug, Error)]
pub enum CdbError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad magic: not a CDB64 file")]
    BadMagic,
    #[error("messagepack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("value's `r` field is not 32 bytes")]
    BadRootId,
}

/// The decoded value stored under a key: `{r}` (simple) or
/// `{r, item_offset, data_offset}` (complete).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CdbValue {
    pub r: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub item_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data_offset: Option<u64>,
}

impl CdbValue {
    pub fn root_tx_id(&self) -> Result<[u8; 32], CdbError> {
        self.r.clone().try_into().map_err(|_| CdbError::BadRootId)
    }

    /// `isCompleteValue`: both offsets present.
    pub fn is_complete(&self) -> bool {
        self.item_offset.is_some() && self.data_offset.is_some()
    }
}

struct IndexEntry {
    key: [u8; 32],
    value_offset: u64,
    value_len: u32,
}

pub struct Cdb64File {
    file: File,
    index: Vec<IndexEntry>,
}

impl Cdb64File {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CdbError> {
        let mut file = File::open(path)?;
        let mut header = [0u8; 16];
        file.read_exact(&mut header)?;
        if &header[0..8] != MAGIC {
            return Err(CdbError::BadMagic);
        }
        let count = LittleEndian::read_u64(&header[8..16]) as usize;

        let mut index_bytes = vec![0u8; count * INDEX_ENTRY_LEN];
        file.read_exact(&mut index_bytes)?;
        let mut index = Vec::with_capacity(count);
        for i in 0..count {
            let entry = &index_bytes[i * INDEX_ENTRY_LEN..(i + 1) * INDEX_ENTRY_LEN];
            let mut key = [0u8; 32];
            key.copy_from_slice(&entry[0..32]);
            let value_offset = LittleEndian::read_u64(&entry[32..40]);
            let value_len = LittleEndian::read_u32(&entry[40..44]);
            index.push(IndexEntry { key, value_offset, value_len });
        }
        Ok(Self { file, index })
    }

    pub fn get(&mut self, key: &[u8; 32]) -> Result<Option<CdbValue>, CdbError> {
        let found = self.index.binary_search_by(|e| e.key.cmp(key));
        let entry = match found {
            Ok(i) => &self.index[i],
            Err(_) => return Ok(None),
        };
        self.file.seek(SeekFrom::Start(entry.value_offset))?;
        let mut buf = vec![0u8; entry.value_len as usize];
        self.file.read_exact(&mut buf)?;
        Ok(Some(rmp_serde::from_slice(&buf)?))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// The 256-way partitioned form: `{dir}/00.cdb`.. `{dir}/ff.cdb`,
/// sharded on a key's first byte, plus a manifest listing each
/// partition's record count.
pub struct PartitionedCdb64 {
    dir: std::path::PathBuf,
    manifest: [u64; 256],
}

impl PartitionedCdb64 {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CdbError> {
        let dir = dir.as_ref().to_path_buf();
        let manifest_bytes = std::fs::read(dir.join("manifest"))?;
        if manifest_bytes.len() != 256 * 8 {
            return Err(CdbError::BadMagic);
        }
        let mut manifest = [0u64; 256];
        for (i, slot) in manifest.iter_mut().enumerate() {
            *slot = LittleEndian::read_u64(&manifest_bytes[i * 8..i * 8 + 8]);
        }
        Ok(Self { dir, manifest })
    }

    pub fn partition_size(&self, first_byte: u8) -> u64 {
        self.manifest[first_byte as usize]
    }

    pub fn get(&self, key: &[u8; 32]) -> Result<Option<CdbValue>, CdbError> {
        let partition = key[0];
        let path = self.dir.join(format!("{partition:02x}.cdb"));
        if !path.exists() {
            return Ok(None);
        }
        let mut file = Cdb64File::open(path)?;
        file.get(key)
    }
}

#[cfg(test)]
pub(crate) fn write_cdb64_file(path: impl AsRef<Path>, entries: &[([u8; 32], CdbValue)]) -> std::io::Result<()> {
    use std::io::Write;

    let mut sorted: Vec<_> = entries.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut value_blobs = Vec::new();
    let mut index = Vec::new();
    let mut offset = 0u64;
    for (key, value) in &sorted {
        let encoded = rmp_serde::to_vec(value).unwrap();
        index.push((*key, offset, encoded.len() as u32));
        offset += encoded.len() as u64;
        value_blobs.extend_from_slice(&encoded);
    }

    let header_and_index_len = 16 + index.len() * INDEX_ENTRY_LEN;
    let mut out = Vec::with_capacity(header_and_index_len + value_blobs.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(sorted.len() as u64).to_le_bytes());
    for (key, rel_offset, len) in &index {
        out.extend_from_slice(key);
        out.extend_from_slice(&(rel_offset + header_and_index_len as u64).to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
    }
    out.extend_from_slice(&value_blobs);

    let mut file = File::create(path)?;
    file.write_all(&out)
}
