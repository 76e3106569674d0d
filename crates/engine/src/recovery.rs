//! Rebuilds one shard's in-memory state from its WAL segments at startup.
//!
//! Recovery has to run *before* a shard's [`horizon_durability::ShardLog`] is
//! opened, because the log needs to know the next sequence number to resume
//! from. So this module only reads raw segment files; the caller
//! ([`crate::engine::Engine::open`]) is responsible for opening the log with
//! the returned `next_seq` and then applying the entries to the shard.

use std::path::Path;

use horizon_core::{Result, ShardId, Value};
use horizon_durability::codec::Op;
use horizon_durability::wal::{self, ReplayResult};
use horizon_storage::Shard;
use tracing::{info, warn};

use crate::directory::Directory;

/// Replay `<dir>/shard-<id>/wal-*.log` without constructing a log or shard.
pub fn replay_shard(dir: &Path, shard_id: usize) -> Result<ReplayResult> {
    let shard_dir = dir.join(format!("shard-{shard_id}"));
    let result = wal::replay(&shard_dir)?;
    if result.truncated {
        warn!(shard_id, "recovery truncated a corrupt WAL tail");
    }
    info!(
        shard_id,
        entries_applied = result.entries.len(),
        next_seq = result.next_seq,
        "shard recovery complete"
    );
    Ok(result)
}

/// Apply a replayed entry to `shard`'s in-memory map and update the reverse
/// `directory` accordingly. Used by both startup recovery and tests; never
/// re-appends to the log (the entries are already durable).
pub fn apply_recovered(shard: &Shard, shard_id: ShardId, directory: &Directory, entry: &horizon_durability::LogEntry) {
    match entry.op {
        Op::Put => {
            shard.load_recovered(entry.key.clone(), Value::from_raw(entry.value.clone()), entry.seq);
            directory.record(&entry.key, shard_id);
        }
        Op::Delete => {
            shard.remove_recovered(&entry.key);
            directory.forget(&entry.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_core::limits::SEGMENT_MAX_BYTES;
    use horizon_durability::{DurabilityMode, ShardLog};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn replay_then_apply_recovers_puts_and_deletes_in_order() {
        let dir = tempdir().unwrap();
        {
            let log =
                ShardLog::open(dir.path(), 0, DurabilityMode::Sync, 1, SEGMENT_MAX_BYTES).unwrap();
            log.append(Op::Put, b"a", b"1").unwrap();
            log.append(Op::Put, b"b", b"2").unwrap();
            log.append(Op::Delete, b"a", b"").unwrap();
            log.close().unwrap();
        }

        let result = replay_shard(dir.path(), 0).unwrap();
        assert_eq!(result.entries.len(), 3);
        assert_eq!(result.next_seq, 4);
        assert!(!result.truncated);

        let log = ShardLog::open(
            dir.path(),
            0,
            DurabilityMode::Sync,
            result.next_seq,
            SEGMENT_MAX_BYTES,
        )
        .unwrap();
        let shard = Arc::new(Shard::new(ShardId::new(0), log));
        let directory = Directory::new();
        for entry in &result.entries {
            apply_recovered(&shard, ShardId::new(0), &directory, entry);
        }

        assert_eq!(shard.get(b"a"), None);
        assert_eq!(shard.get(b"b"), Some(Value::new(b"2".to_vec()).unwrap()));
        assert_eq!(directory.lookup(b"a"), None);
        assert_eq!(directory.lookup(b"b"), Some(ShardId::new(0)));
    }

    #[test]
    fn replaying_empty_shard_directory_yields_next_seq_one() {
        let dir = tempdir().unwrap();
        let result = replay_shard(dir.path(), 3).unwrap();
        assert!(result.entries.is_empty());
        assert_eq!(result.next_seq, 1);
    }
}
