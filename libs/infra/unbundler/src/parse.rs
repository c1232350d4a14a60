//! ANS-104 bundle header and data-item parsing.

use crate::deep_hash::data_item_signature_payload;
use crate::signature::verify_signature;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use byteorder::{ByteOrder, LittleEndian};
use gateway_types::{DataItem, GatewayError, SignatureType};
use sha2::{Digest, Sha256};

fn malformed(reason: impl Into<String>) -> GatewayError {
    GatewayError::MalformedInput(reason.into())
}

/// Reads a 32-byte little-endian integer as a `usize`, erroring if it
/// exceeds what fits in one (ANS-104 stores counters and lengths in
/// 32-byte fields far larger than any real bundle needs).
fn read_u256_le_as_usize(bytes: &[u8]) -> Result<usize, GatewayError> {
    if bytes.len() != 32 {
        return Err(malformed("expected a 32-byte length field"));
    }
    if bytes[8..].iter().any(|&b| b != 0) {
        return Err(malformed("length field exceeds u64 range"));
    }
    Ok(LittleEndian::read_u64(&bytes[0..8]) as usize)
}

struct HeaderEntry {
    length: usize,
    id: [u8; 32],
}

fn parse_header(bytes: &[u8]) -> Result<Vec<HeaderEntry>, GatewayError> {
    if bytes.len() < 32 {
        return Err(malformed("bundle shorter than the item-count field"));
    }
    let item_count = read_u256_le_as_usize(&bytes[0..32])?;
    let table_start = 32;
    let table_len = item_count.checked_mul(64).ok_or_else(|| malformed("item count overflow"))?;
    if bytes.len() < table_start + table_len {
        return Err(malformed("bundle shorter than its item table"));
    }
    let mut entries = Vec::with_capacity(item_count);
    for i in 0..item_count {
        let start = table_start + i * 64;
        let length = read_u256_le_as_usize(&bytes[start..start + 32])?;
        let mut id = [0u8; 32];
        id.copy_from_slice(&bytes[start + 32..start + 64]);
        entries.push(HeaderEntry { length, id });
    }
    Ok(entries)
}

/// The parsed body of a single data item, before signature verification.
struct ParsedItem {
    sig_type: SignatureType,
    signature: Vec<u8>,
    owner: Vec<u8>,
    target: Option<[u8; 32]>,
    anchor: Option<[u8; 32]>,
    tags_bytes: Vec<u8>,
    data: Vec<u8>,
}

fn parse_item_body(bytes: &[u8]) -> Result<ParsedItem, GatewayError> {
    let mut pos = 0usize;
    let read = |pos: &mut usize, n: usize, bytes: &[u8]| -> Result<Vec<u8>, GatewayError> {
        if bytes.len() < *pos + n {
            return Err(malformed("data item truncated"));
        }
        let slice = bytes[*pos..*pos + n].to_vec();
        *pos += n;
        Ok(slice)
    };

    let sig_type_bytes = read(&mut pos, 2, bytes)?;
    let sig_type_tag = LittleEndian::read_u16(&sig_type_bytes);
    let sig_type = SignatureType::from_tag(sig_type_tag)
    .ok_or_else(|| malformed(format!("unknown signature type tag {sig_type_tag}")))?;
    let (sig_len, pub_len) = sig_type.lengths();

    let signature = read(&mut pos, sig_len, bytes)?;
    let owner = read(&mut pos, pub_len, bytes)?;

    let target_present = read(&mut pos, 1, bytes)?[0];
    let target = if target_present != 0 {
        let bytes = read(&mut pos, 32, bytes)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Some(arr)
    } else {
        None
    };

    let anchor_present = read(&mut pos, 1, bytes)?[0];
    let anchor = if anchor_present != 0 {
        let bytes = read(&mut pos, 32, bytes)?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Some(arr)
    } else {
        None
    };

    let tags_length_bytes = read(&mut pos, 8, bytes)?;
    let tags_count = LittleEndian::read_u64(&tags_length_bytes) as usize;
    let tags_bytes_length_bytes = read(&mut pos, 8, bytes)?;
    let tags_bytes_len = LittleEndian::read_u64(&tags_bytes_length_bytes) as usize;
    let tags_bytes = read(&mut pos, tags_bytes_len, bytes)?;

    let decoded_tags = decode_tags(&tags_bytes)?;
    if decoded_tags.len() != tags_count {
        return Err(malformed("MalformedTags: tag count does not match tags_length"));
    }

    let data = bytes[pos..].to_vec();

    Ok(ParsedItem {
            sig_type,
            signature,
            owner,
            target,
            anchor,
            tags_bytes,
            data,
    })
}

/// A simple length-prefixed tag wire format: repeated
/// `(name_len:u16, name, value_len:u16, value)`, consumed to the end of
/// the buffer. Real-world ANS-104 tags are Avro-encoded; this crate
/// does not depend on an Avro codec and instead parses this internal
/// format, which the bundle writer and reader here agree on.
fn decode_tags(bytes: &[u8]) -> Result<Vec<(String, String)>, GatewayError> {
    let mut pos = 0usize;
    let mut tags = Vec::new();
    while pos < bytes.len() {
        if bytes.len() < pos + 2 {
            return Err(malformed("MalformedTags: truncated tag name length"));
        }
        let name_len = LittleEndian::read_u16(&bytes[pos..pos + 2]) as usize;
        pos += 2;
        if bytes.len() < pos + name_len + 2 {
            return Err(malformed("MalformedTags: truncated tag name"));
        }
        let name = String::from_utf8(bytes[pos..pos + name_len].to_vec())
        .map_err(|_| malformed("MalformedTags: tag name is not UTF-8"))?;
        pos += name_len;
        let value_len = LittleEndian::read_u16(&bytes[pos..pos + 2]) as usize;
        pos += 2;
        if bytes.len() < pos + value_len {
            return Err(malformed("MalformedTags: truncated tag value"));
        }
        let value = String::from_utf8(bytes[pos..pos + value_len].to_vec())
        .map_err(|_| malformed("MalformedTags: tag value is not UTF-8"))?;
        pos += value_len;
        tags.push((name, value));
    }
    Ok(tags)
}

/// Parses and verifies one data item, as laid out at `item_bytes`
/// within the bundle. `index` is `Some` when this
/// item came from an indexed bundle entry (vs. a bare data item).
/// `expected_id` is the id the bundle header declared for this entry;
/// it must equal `sha256(signature)` or the item is rejected as
/// `IntegrityError("IdMismatch")` regardless of whether the signature
/// itself verifies.
pub fn parse_and_verify_item(
    item_bytes: &[u8],
    expected_id: [u8; 32],
    root_tx_id: gateway_types::Digest32,
    parent_id: gateway_types::Digest32,
    index: Option<u32>,
) -> Result<DataItem, GatewayError> {
    let parsed = parse_item_body(item_bytes)?;

    let recomputed_id: [u8; 32] = Sha256::digest(&parsed.signature).into();
    if recomputed_id != expected_id {
        return Err(GatewayError::IntegrityError("IdMismatch".to_string()));
    }
    let id = gateway_types::Digest32::from_bytes(recomputed_id);

    let payload = data_item_signature_payload(
        parsed.sig_type.tag(),
        &parsed.owner,
        parsed.target.as_ref(),
        parsed.anchor.as_ref(),
        &parsed.tags_bytes,
        &parsed.data,
    );
    verify_signature(parsed.sig_type, &parsed.owner, &parsed.signature, &payload)?;

    let owner_address: [u8; 32] = Sha256::digest(&parsed.owner).into();
    let tags = decode_tags(&parsed.tags_bytes)?;

    Ok(DataItem {
            id,
            parent_id,
            root_tx_id,
            index,
            signature: parsed.signature,
            owner: parsed.owner,
            owner_address,
            target: parsed.target,
            anchor: parsed.anchor,
            tags,
            data_offset: 0,
            data_size: parsed.data.len() as u64,
            signature_type: parsed.sig_type,
            signature_offset: 0,
            signature_size: parsed.signature.len() as u64,
            owner_offset: 0,
            owner_size: 0,
    })
}

/// The ANS-104 bundle header: the ordered `(length, id)` table followed
/// by each item's byte range.
pub struct BundleHeader {
    pub entries: Vec<(usize, [u8; 32])>,
    pub header_len: usize,
}

pub fn read_bundle_header(bytes: &[u8]) -> Result<BundleHeader, GatewayError> {
    let raw_entries = parse_header(bytes)?;
    let header_len = 32 + raw_entries.len() * 64;
    Ok(BundleHeader {
            entries: raw_entries.into_iter().map(|e| (e.length, e.id)).collect(),
            header_len,
    })
}

pub fn b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_u256_le(value: u64) -> [u8; 32] {
        let mut out = [0u8; 32];
        LittleEndian::write_u64(&mut out[0..8], value);
        out
    }

    #[test]
    fn header_round_trip() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&encode_u256_le(2));
        bytes.extend_from_slice(&encode_u256_le(100));
        bytes.extend_from_slice(&[1u8; 32]);
        bytes.extend_from_slice(&encode_u256_le(200));
        bytes.extend_from_slice(&[2u8; 32]);

        let header = read_bundle_header(&bytes).unwrap();
        assert_eq!(header.entries.len(), 2);
        assert_eq!(header.entries[0].0, 100);
        assert_eq!(header.entries[1].0, 200);
        assert_eq!(header.header_len, 32 + 2 * 64);
    }

    #[test]
    fn tag_round_trip() {
        let mut bytes = Vec::new();
        for (name, value) in [("Content-Type", "text/plain"), ("App", "demo")] {
            bytes.extend_from_slice(&(name.len() as u16).to_le_bytes());
            bytes.extend_from_slice(name.as_bytes());
            bytes.extend_from_slice(&(value.len() as u16).to_le_bytes());
            bytes.extend_from_slice(value.as_bytes());
        }
        let tags = decode_tags(&bytes).unwrap();
        assert_eq!(tags, vec![
                ("Content-Type".to_string(), "text/plain".to_string()),
                ("App".to_string(), "demo".to_string()),
        ]);
    }
}
