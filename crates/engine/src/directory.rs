//! In-memory `key -> shard id` reverse directory.
//!
//! `get`/`delete` need to know which shard owns a key without re-running
//! [`horizon_storage::route`] (hints are only known at insert time and are
//! not persisted), so the engine keeps this directory up to date on every
//! `put`/`delete` and rebuilds it from the WALs during recovery. It is
//! never itself persisted.

use dashmap::DashMap;
use horizon_core::ShardId;

#[derive(Default)]
pub struct Directory {
    map: DashMap<Vec<u8>, ShardId>,
}

impl Directory {
    pub fn new() -> Self {
        Directory {
            map: DashMap::new(),
        }
    }

    pub fn lookup(&self, key: &[u8]) -> Option<ShardId> {
        self.map.get(key).map(|entry| *entry)
    }

    pub fn record(&self, key: &[u8], shard_id: ShardId) {
        self.map.insert(key.to_vec(), shard_id);
    }

    pub fn forget(&self, key: &[u8]) {
        self.map.remove(key);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
