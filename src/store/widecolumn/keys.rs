//! Index key encoding
//!
//! Sorted index keys are `name \0 partition \0 sort(8) id`, where `sort` is the
//! big-endian nanosecond timestamp with its sign bit flipped so byte order
//! matches time order. Unique index keys are `name \0 value` and hold the
//! owning record id.

use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::model::to_nanos;

const SEP: u8 = 0;
const SORT_LEN: usize = 8;

pub fn encode_sort(at: DateTime<Utc>) -> StoreResult<[u8; SORT_LEN]> {
    let nanos = to_nanos(at)?;
    Ok(((nanos as u64) ^ (1 << 63)).to_be_bytes())
}

/// Every key of one index partition starts with this.
pub fn sorted_prefix(name: &str, partition: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(name.len() + partition.len() + 2);
    key.extend_from_slice(name.as_bytes());
    key.push(SEP);
    key.extend_from_slice(partition.as_bytes());
    key.push(SEP);
    key
}

pub fn sorted_key(name: &str, partition: &str, at: DateTime<Utc>, id: &str) -> StoreResult<Vec<u8>> {
    let mut key = sorted_prefix(name, partition);
    key.extend_from_slice(&encode_sort(at)?);
    key.extend_from_slice(id.as_bytes());
    Ok(key)
}

pub fn unique_key(name: &str, value: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(name.len() + value.len() + 1);
    key.extend_from_slice(name.as_bytes());
    key.push(SEP);
    key.extend_from_slice(value.as_bytes());
    key
}

/// Smallest key greater than every key starting with `prefix`.
pub fn upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.pop() {
        if last < u8::MAX {
            bound.push(last + 1);
            return bound;
        }
    }
    vec![u8::MAX; prefix.len() + 1]
}

/// Record id carried at the end of a sorted key.
pub fn id_of<'a>(key: &'a [u8], prefix: &[u8]) -> StoreResult<&'a str> {
    let raw = key
        .get(prefix.len() + SORT_LEN..)
        .ok_or_else(|| StoreError::corrupt("short index key"))?;
    std::str::from_utf8(raw).map_err(|_| StoreError::corrupt("index key id is not utf-8"))
}
