//! Public API: composes the router, cache, and shards, and orchestrates
//! recovery on open.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use horizon_core::limits::N_SHARDS;
use horizon_core::{EngineError, Hints, Key, Result, ShardId, Value};
use horizon_durability::{DirectoryLock, Manifest};
use horizon_storage::{router, Cache, CacheStats, Shard, ShardStats};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::directory::Directory;
use crate::recovery;

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Point-in-time snapshot returned by [`Engine::stats`].
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub shards: Vec<ShardStats>,
    pub cache: CacheStats,
    pub directory_size: usize,
}

/// The embedded key-value engine. Owns the data directory's exclusive lock
/// for its whole lifetime; dropping or calling [`Engine::close`] releases it.
pub struct Engine {
    dir: PathBuf,
    shards: Vec<Arc<Shard>>,
    cache: Cache,
    directory: Directory,
    manifest: Mutex<Manifest>,
    _lock: DirectoryLock,
    closed: AtomicBool,
}

impl Engine {
    /// Open or create a data directory. Runs recovery on every shard before
    /// returning, so the engine is immediately consistent with what was
    /// durably logged.
    pub fn open(dir: impl AsRef<Path>, config: EngineConfig) -> Result<Engine> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let lock = DirectoryLock::acquire(&dir)?;

        let manifest = match horizon_durability::manifest::load(&dir)? {
            Some(existing) => {
                existing.check_compatible()?;
                existing
            }
            None => {
                let fresh = Manifest::for_new_database(now_ns());
                horizon_durability::manifest::persist(&dir, &fresh)?;
                fresh
            }
        };

        let directory = Directory::new();
        let mut shards = Vec::with_capacity(N_SHARDS);
        for shard_id in 0..N_SHARDS {
            let replayed = recovery::replay_shard(&dir, shard_id)?;
            let log = horizon_durability::ShardLog::open(
                &dir,
                shard_id,
                config.durability,
                replayed.next_seq,
                config.segment_max_bytes,
            )?;
            let shard = Arc::new(Shard::new(ShardId::new(shard_id), log));
            for entry in &replayed.entries {
                recovery::apply_recovered(&shard, ShardId::new(shard_id), &directory, entry);
            }
            shards.push(shard);
        }

        info!(
            dir = %dir.display(),
            n_shards = N_SHARDS,
            keys_recovered = directory.len(),
            "engine opened"
        );

        Ok(Engine {
            dir,
            shards,
            cache: Cache::new(),
            directory,
            manifest: Mutex::new(manifest),
            _lock: lock,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EngineError::Closed);
        }
        Ok(())
    }

    fn shard(&self, id: ShardId) -> &Arc<Shard> {
        &self.shards[id.as_usize()]
    }

    /// Insert or overwrite `key`. `hints` influence which shard owns the key
    /// (only consulted the first time a key is written; later overwrites
    /// route by the key's already-recorded shard so hints on an update
    /// cannot move a key after the fact) and which cache tier admits it.
    pub fn put(&self, key: &[u8], value: &[u8], hints: Hints) -> Result<()> {
        self.ensure_open()?;
        let key = Key::new(key.to_vec())?;
        let value = Value::new(value.to_vec())?;

        let shard_id = self
            .directory
            .lookup(key.as_bytes())
            .unwrap_or_else(|| router::route(key.as_bytes(), &hints));

        let shard = self.shard(shard_id);
        shard.put(key.as_bytes(), value.clone())?;
        self.directory.record(key.as_bytes(), shard_id);
        self.cache.admit(key.as_bytes(), value.as_bytes(), &hints);
        Ok(())
    }

    /// Look up `key`. Checks the cache first; on a miss, reads the owning
    /// shard directly and admits the value into the cache with balanced
    /// hints (the original put-time hints are not retained).
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        if let Some(cached) = self.cache.lookup(key) {
            return Ok(Some(cached));
        }

        let Some(shard_id) = self.directory.lookup(key) else {
            return Ok(None);
        };
        let shard = self.shard(shard_id);
        match shard.get(key) {
            Some(value) => {
                self.cache.admit(key, value.as_bytes(), &Hints::default());
                Ok(Some(value.into_bytes()))
            }
            None => Ok(None),
        }
    }

    /// Delete `key`, returning whether it previously existed. Invalidates
    /// the cache before returning so the cache never holds a deleted key.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        let Some(shard_id) = self.directory.lookup(key) else {
            return Ok(false);
        };
        let shard = self.shard(shard_id);
        let existed = shard.delete(key)?;
        self.directory.forget(key);
        self.cache.invalidate(key);
        Ok(existed)
    }

    /// Block until every shard's buffered writes are fsynced.
    pub fn flush(&self) -> Result<()> {
        self.ensure_open()?;
        for shard in &self.shards {
            shard.flush()?;
        }
        Ok(())
    }

    /// Manifest as loaded/created at open time, updated by `close`. Exposed
    /// read-only for diagnostic tooling (e.g. the CLI's `open` command).
    pub fn manifest(&self) -> Manifest {
        self.manifest.lock().clone()
    }

    /// Snapshot of per-shard sizes/seqs, cache stats, and directory size.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            shards: self.shards.iter().map(|s| s.stats()).collect(),
            cache: self.cache.stats(),
            directory_size: self.directory.len(),
        }
    }

    /// Drain and fsync every shard, persist a manifest recording the clean
    /// shutdown and final per-shard sequence numbers, and release the
    /// directory lock. Idempotent: a second call is a no-op.
    ///
    /// Every shard is given a chance to close even if an earlier one fails,
    /// but the first error encountered is still returned to the caller
    /// instead of being logged and discarded; a shutdown that couldn't
    /// confirm its last writes reached disk is not marked as clean.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut first_error = None;
        for shard in &self.shards {
            if let Err(e) = shard.close() {
                warn!(error = %e, "error closing shard log during engine close");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        let mut manifest = self.manifest.lock();
        for (i, shard) in self.shards.iter().enumerate() {
            manifest.record_shard_seq(i, shard.stats().last_seq);
        }
        if first_error.is_none() {
            manifest.mark_clean_shutdown(now_ns());
        }
        horizon_durability::manifest::persist(&self.dir, &manifest)?;

        if let Some(e) = first_error {
            return Err(e);
        }

        info!(dir = %self.dir.display(), "engine closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::Acquire) {
            if let Err(e) = self.close() {
                warn!(error = %e, "error closing engine on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_core::{AccessPattern, Priority};
    use tempfile::tempdir;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        engine.put(b"a", b"1", Hints::default()).unwrap();
        engine.flush().unwrap();
        assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn overwrite_keeps_exactly_one_key() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        engine.put(b"k", b"v1", Hints::default()).unwrap();
        engine.put(b"k", b"v2", Hints::default()).unwrap();
        engine.flush().unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Some(b"v2".to_vec()));
        let total: usize = engine.stats().shards.iter().map(|s| s.size).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        engine.put(b"k", b"v", Hints::default()).unwrap();
        assert!(engine.delete(b"k").unwrap());
        assert!(!engine.delete(b"k").unwrap());
        engine.flush().unwrap();
        assert_eq!(engine.get(b"k").unwrap(), None);
    }

    #[test]
    fn reopen_after_close_recovers_state() {
        let dir = tempdir().unwrap();
        {
            let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
            engine.put(b"a", b"1", Hints::default()).unwrap();
            engine
                .put(b"b", b"22", Hints::new(AccessPattern::Cold, Priority::Normal))
                .unwrap();
            engine.flush().unwrap();
            engine.close().unwrap();
        }
        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        assert_eq!(engine.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(engine.get(b"b").unwrap(), Some(b"22".to_vec()));
    }

    #[test]
    fn deleted_key_does_not_resurrect_after_reopen() {
        let dir = tempdir().unwrap();
        {
            let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
            engine.put(b"k", b"v1", Hints::default()).unwrap();
            engine.put(b"k", b"v2", Hints::default()).unwrap();
            engine.delete(b"k").unwrap();
            engine.flush().unwrap();
        }
        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        assert_eq!(engine.get(b"k").unwrap(), None);
    }

    #[test]
    fn second_open_on_same_directory_is_already_locked() {
        let dir = tempdir().unwrap();
        let _engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        let second = Engine::open(dir.path(), EngineConfig::default());
        assert!(matches!(second, Err(EngineError::AlreadyLocked { .. })));
    }

    #[test]
    fn operations_after_close_fail_with_closed_error() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        engine.close().unwrap();
        assert!(matches!(
            engine.put(b"k", b"v", Hints::default()),
            Err(EngineError::Closed)
        ));
    }

    #[test]
    fn key_too_large_is_rejected_without_side_effects() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        let oversized_key = vec![0u8; horizon_core::limits::MAX_KEY_LEN + 1];
        let err = engine.put(&oversized_key, b"v", Hints::default()).unwrap_err();
        assert!(matches!(err, EngineError::KeyTooLarge { .. }));
        assert_eq!(engine.stats().directory_size, 0);
    }

    #[test]
    fn stats_reports_nonzero_shard_size_after_put() {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        engine.put(b"a", b"1", Hints::default()).unwrap();
        engine
            .put(b"b", b"22", Hints::new(AccessPattern::Cold, Priority::Normal))
            .unwrap();
        engine.flush().unwrap();
        let stats = engine.stats();
        let total: usize = stats.shards.iter().map(|s| s.size).sum();
        assert_eq!(total, 2);
    }
}
