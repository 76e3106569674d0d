//! One independent storage partition: an in-memory map paired with its own
//! write-ahead log.

use std::sync::Arc;

use horizon_core::{Record, Result, ShardId, Value};
use horizon_durability::{Op, ShardLog};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct ShardStats {
    pub size: usize,
    pub last_seq: u64,
}

/// Owns the map for one shard and coordinates every mutation through its
/// log before applying it in memory, so the two never drift apart.
pub struct Shard {
    id: ShardId,
    map: RwLock<FxHashMap<Vec<u8>, Record>>,
    log: Arc<ShardLog>,
}

impl Shard {
    pub fn new(id: ShardId, log: Arc<ShardLog>) -> Self {
        Shard {
            id,
            map: RwLock::new(FxHashMap::default()),
            log,
        }
    }

    pub fn id(&self) -> ShardId {
        self.id
    }

    /// Used by recovery to populate the map directly from already-logged
    /// entries, without re-appending them.
    pub fn load_recovered(&self, key: Vec<u8>, value: Value, seq: u64) {
        self.map
            .write()
            .insert(key, Record::new(value, self.id, seq));
    }

    pub fn remove_recovered(&self, key: &[u8]) {
        self.map.write().remove(key);
    }

    /// Append to the log, then update the map only if the append succeeded,
    /// so a logging failure never leaves the map ahead of disk.
    pub fn put(&self, key: &[u8], value: Value) -> Result<u64> {
        let seq = self.log.append(Op::Put, key, value.as_bytes())?;
        self.map
            .write()
            .insert(key.to_vec(), Record::new(value, self.id, seq));
        Ok(seq)
    }

    pub fn get(&self, key: &[u8]) -> Option<Value> {
        self.map.read().get(key).map(|record| record.value.clone())
    }

    /// Logs a tombstone, then removes from the map. Returns whether the key
    /// existed.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.log.append(Op::Delete, key, &[])?;
        Ok(self.map.write().remove(key).is_some())
    }

    /// Snapshot of every live `(key, value)` pair at call time. Iteration
    /// order is unspecified and not guaranteed to reflect concurrent
    /// mutations made after this call returns.
    pub fn scan(&self) -> Vec<(Vec<u8>, Value)> {
        self.map
            .read()
            .iter()
            .map(|(k, record)| (k.clone(), record.value.clone()))
            .collect()
    }

    pub fn size(&self) -> usize {
        self.map.read().len()
    }

    pub fn stats(&self) -> ShardStats {
        ShardStats {
            size: self.size(),
            last_seq: self.log.last_durable_seq(),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.log.flush_all()
    }

    pub fn is_poisoned(&self) -> bool {
        self.log.is_poisoned()
    }

    pub fn close(&self) -> Result<()> {
        self.log.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_durability::DurabilityMode;
    use tempfile::tempdir;

    fn test_shard(dir: &std::path::Path) -> Shard {
        let log = ShardLog::open(
            dir,
            0,
            DurabilityMode::Sync,
            1,
            horizon_core::limits::SEGMENT_MAX_BYTES,
        )
        .unwrap();
        Shard::new(ShardId::new(0), log)
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let shard = test_shard(dir.path());
        shard.put(b"k", Value::new(b"v".to_vec()).unwrap()).unwrap();
        assert_eq!(shard.get(b"k"), Some(Value::new(b"v".to_vec()).unwrap()));
    }

    #[test]
    fn put_overwrites_existing_value() {
        let dir = tempdir().unwrap();
        let shard = test_shard(dir.path());
        shard.put(b"k", Value::new(b"v1".to_vec()).unwrap()).unwrap();
        shard.put(b"k", Value::new(b"v2".to_vec()).unwrap()).unwrap();
        assert_eq!(shard.get(b"k"), Some(Value::new(b"v2".to_vec()).unwrap()));
        assert_eq!(shard.size(), 1);
    }

    #[test]
    fn delete_reports_prior_existence() {
        let dir = tempdir().unwrap();
        let shard = test_shard(dir.path());
        assert!(!shard.delete(b"k").unwrap());
        shard.put(b"k", Value::new(b"v".to_vec()).unwrap()).unwrap();
        assert!(shard.delete(b"k").unwrap());
        assert!(!shard.delete(b"k").unwrap());
        assert_eq!(shard.get(b"k"), None);
    }

    #[test]
    fn scan_reflects_a_snapshot_of_live_keys() {
        let dir = tempdir().unwrap();
        let shard = test_shard(dir.path());
        shard.put(b"a", Value::new(b"1".to_vec()).unwrap()).unwrap();
        shard.put(b"b", Value::new(b"2".to_vec()).unwrap()).unwrap();
        let mut entries = shard.scan();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                (b"a".to_vec(), Value::new(b"1".to_vec()).unwrap()),
                (b"b".to_vec(), Value::new(b"2".to_vec()).unwrap())
            ]
        );
    }

    #[test]
    fn load_recovered_populates_map_without_touching_log() {
        let dir = tempdir().unwrap();
        let shard = test_shard(dir.path());
        shard.load_recovered(b"k".to_vec(), Value::new(b"v".to_vec()).unwrap(), 5);
        assert_eq!(shard.get(b"k"), Some(Value::new(b"v".to_vec()).unwrap()));
        assert_eq!(shard.size(), 1);
    }
}
