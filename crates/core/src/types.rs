//! Primitive data types shared across the engine: keys, values, shard ids,
//! and the in-memory record representation.

use crate::error::{EngineError, Result};
use crate::hints::Hints;
use crate::limits::{MAX_KEY_LEN, MAX_VALUE_LEN, N_SHARDS};

/// An opaque byte string key, `1..=MAX_KEY_LEN` bytes. UTF-8 is not required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Vec<u8>);

impl Key {
    /// Validate and wrap raw bytes as a `Key`.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() || bytes.len() > MAX_KEY_LEN {
            return Err(EngineError::KeyTooLarge { len: bytes.len() });
        }
        Ok(Key(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An opaque byte string value, `0..=MAX_VALUE_LEN` bytes. Stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value(Vec<u8>);

impl Value {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() > MAX_VALUE_LEN {
            return Err(EngineError::ValueTooLarge { len: bytes.len() });
        }
        Ok(Value(bytes))
    }

    /// Construct without validating length. Used internally by the WAL
    /// reader, which trusts the on-disk `vlen` it already bounds-checked
    /// against the record length.
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Value(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Value {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A validated shard identifier, `0 <= id < N_SHARDS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId(u8);

impl ShardId {
    pub fn new(id: usize) -> Self {
        debug_assert!(id < N_SHARDS, "shard id {id} out of range 0..{N_SHARDS}");
        ShardId(id as u8)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// All shard ids in `0..N_SHARDS`, in order.
    pub fn all() -> impl Iterator<Item = ShardId> {
        (0..N_SHARDS).map(ShardId::new)
    }
}

impl std::fmt::Display for ShardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-key metadata tracked alongside the value. `score` is recomputed by
/// the cache layer on every access and is never persisted.
#[derive(Debug, Clone, Copy)]
pub struct RecordMetadata {
    pub shard_id: ShardId,
    pub inserted_at_seq: u64,
    pub last_access_seq: u64,
}

/// The in-memory `(key, value, metadata)` triple a shard holds for a live
/// key. Cloning a `Record` is cheap relative to cloning its `Value`'s bytes
/// only when necessary; callers should prefer borrowing.
#[derive(Debug, Clone)]
pub struct Record {
    pub value: Value,
    pub metadata: RecordMetadata,
}

impl Record {
    pub fn new(value: Value, shard_id: ShardId, seq: u64) -> Self {
        Record {
            value,
            metadata: RecordMetadata {
                shard_id,
                inserted_at_seq: seq,
                last_access_seq: seq,
            },
        }
    }
}

/// Hints attached to a put, stored nowhere but consumed immediately by the
/// router and cache. Re-exported here so callers can build a full put
/// request from `horizon_core` alone.
pub type PutHints = Hints;
