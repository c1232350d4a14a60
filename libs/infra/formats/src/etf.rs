//! ETF ("External Term Format") sync-buckets blob parser: byte 0 version tag, a 2-tuple of `(bucket_size,
//! buckets_map)`, where `buckets_map` keys are small integers and
//! values are 8-byte IEEE-754 doubles.

use byteorder::{BigEndian, ByteOrder};
use std::collections::BTreeMap;
use thiserror::Error;

const ETF_VERSION: u8 = 131;
const SMALL_TUPLE_EXT: u8 = 104;
const SMALL_INTEGER_EXT: u8 = 97;
const INTEGER_EXT: u8 = 98;
const SMALL_BIG_EXT: u8 = 110;
const MAP_EXT: u8 = 116;
const NEW_FLOAT_EXT: u8 = 70;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EtfParseError {
    #[error("unexpected end of input")]
    Eof,
    #[error("bad version byte: expected 131")]
    BadVersion,
    #[error("expected a small tuple of arity 2")]
    NotArity2Tuple,
    #[error("bucket size is not a small/big integer")]
    BadBucketSize,
    #[error("expected a map term")]
    NotAMap,
    #[error("map key is not a small/big integer")]
    BadMapKey,
    #[error("map value is not a NEW_FLOAT_EXT term")]
    BadMapValue,
    #[error("trailing bytes after the top-level term")]
    TrailingBytes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncBuckets {
    pub bucket_size: u64,
    pub buckets: BTreeMap<i64, f64>,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], EtfParseError> {
        if self.pos + n > self.bytes.len() {
            return Err(EtfParseError::Eof);
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_u8(&mut self) -> Result<u8, EtfParseError> {
        Ok(self.take(1)?[0])
    }
}

/// Reads a small/big integer term (`SMALL_INTEGER_EXT`, `INTEGER_EXT`,
/// or unsigned `SMALL_BIG_EXT`) into an `i64`.
fn read_integer_term(cursor: &mut Cursor, bad: EtfParseError) -> Result<i64, EtfParseError> {
    let tag = cursor.take_u8()?;
    match tag {
        SMALL_INTEGER_EXT => Ok(cursor.take_u8()? as i64),
        INTEGER_EXT => Ok(BigEndian::read_i32(cursor.take(4)?) as i64),
        SMALL_BIG_EXT => {
            let n = cursor.take_u8()? as usize;
            let sign = cursor.take_u8()?;
            let digits = cursor.take(n)?;
            let mut value: u128 = 0;
            for (i, &byte) in digits.iter().enumerate() {
                value += (byte as u128) << (8 * i);
            }
            let value = value as i64;
            Ok(if sign == 0 { value } else { -value })
        }
        _ => Err(bad),
    }
}

fn read_new_float(cursor: &mut Cursor) -> Result<f64, EtfParseError> {
    let tag = cursor.take_u8()?;
    if tag != NEW_FLOAT_EXT {
        return Err(EtfParseError::BadMapValue);
    }
    let bytes = cursor.take(8)?;
    Ok(BigEndian::read_f64(bytes))
}

/// Parses a sync-buckets blob.
pub fn parse_sync_buckets(bytes: &[u8]) -> Result<SyncBuckets, EtfParseError> {
    let mut cursor = Cursor { bytes, pos: 0 };

    if cursor.take_u8()? != ETF_VERSION {
        return Err(EtfParseError::BadVersion);
    }

    if cursor.take_u8()? != SMALL_TUPLE_EXT {
        return Err(EtfParseError::NotArity2Tuple);
    }
    if cursor.take_u8()? != 2 {
        return Err(EtfParseError::NotArity2Tuple);
    }

    let bucket_size = read_integer_term(&mut cursor, EtfParseError::BadBucketSize)?;
    if bucket_size < 0 {
        return Err(EtfParseError::BadBucketSize);
    }

    if cursor.take_u8()? != MAP_EXT {
        return Err(EtfParseError::NotAMap);
    }
    let arity = BigEndian::read_u32(cursor.take(4)?);

    let mut buckets = BTreeMap::new();
    for _ in 0..arity {
        let key = read_integer_term(&mut cursor, EtfParseError::BadMapKey)?;
        let value = read_new_float(&mut cursor)?;
        buckets.insert(key, value);
    }

    if cursor.pos != cursor.bytes.len() {
        return Err(EtfParseError::TrailingBytes);
    }

    Ok(SyncBuckets {
            bucket_size: bucket_size as u64,
            buckets,
    })
}

#[cfg(test)]
pub(crate) fn encode_sync_buckets(bucket_size: u64, entries: &[(i64, f64)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(ETF_VERSION);
    out.push(SMALL_TUPLE_EXT);
    out.push(2);

    if bucket_size <= u8::MAX as u64 {
        out.push(SMALL_INTEGER_EXT);
        out.push(bucket_size as u8);
    } else {
        let bytes = bucket_size.to_le_bytes();
        let significant: Vec<u8> = bytes.iter().copied().rev().skip_while(|&b| b == 0).collect::<Vec<_>>().into_iter().rev().collect();
        out.push(SMALL_BIG_EXT);
        out.push(significant.len() as u8);
        out.push(0); // sign
        out.extend_from_slice(&significant);
    }

    out.push(MAP_EXT);
    out.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for (key, value) in entries {
        out.push(SMALL_INTEGER_EXT);
        out.push(*key as u8);
        out.push(NEW_FLOAT_EXT);
        out.extend_from_slice(&value.to_be_bytes());
    }
    out
}
