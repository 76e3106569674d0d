//! Directory manifest: the single file that pins a database directory to
//! the shard count and hash algorithm it was created with, so a later
//! `open` with different build defaults fails loudly instead of silently
//! misrouting keys. Also carries the last-seq-per-shard bookkeeping used at
//! clean shutdown.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use horizon_core::limits::{ENTRY_MAGIC, HASH_ALGORITHM_NAME, MANIFEST_FORMAT_VERSION, N_SHARDS};
use horizon_core::EngineError;
use serde::{Deserialize, Serialize};

/// `<dir>/manifest.json` contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub n_shards: usize,
    pub hash_algorithm: String,
    pub format_magic: String,
    pub created_at_unix_ns: u64,
    pub last_clean_shutdown_unix_ns: Option<u64>,
    pub shard_last_seq: Vec<u64>,
}

impl Manifest {
    pub fn for_new_database(created_at_unix_ns: u64) -> Manifest {
        Manifest {
            version: MANIFEST_FORMAT_VERSION,
            n_shards: N_SHARDS,
            hash_algorithm: HASH_ALGORITHM_NAME.to_string(),
            format_magic: format!("{ENTRY_MAGIC:#010x}"),
            created_at_unix_ns,
            last_clean_shutdown_unix_ns: None,
            shard_last_seq: vec![0; N_SHARDS],
        }
    }

    /// Check this manifest (loaded from disk) against the runtime build's
    /// expectations. An empty directory has no manifest to check against;
    /// callers create one instead of calling this.
    pub fn check_compatible(&self) -> Result<(), EngineError> {
        if self.n_shards != N_SHARDS || self.hash_algorithm != HASH_ALGORITHM_NAME {
            return Err(EngineError::VersionMismatch {
                manifest_n_shards: self.n_shards,
                manifest_hash: self.hash_algorithm.clone(),
                runtime_n_shards: N_SHARDS,
                runtime_hash: HASH_ALGORITHM_NAME.to_string(),
            });
        }
        Ok(())
    }

    /// Record `last_seq` for `shard_id`, growing the vector if the shard
    /// count grew since the manifest was first created (defensive; in
    /// practice `n_shards` is frozen for the directory's lifetime).
    pub fn record_shard_seq(&mut self, shard_id: usize, last_seq: u64) {
        if shard_id >= self.shard_last_seq.len() {
            self.shard_last_seq.resize(shard_id + 1, 0);
        }
        self.shard_last_seq[shard_id] = last_seq;
    }

    pub fn mark_clean_shutdown(&mut self, at_unix_ns: u64) {
        self.last_clean_shutdown_unix_ns = Some(at_unix_ns);
    }
}

fn manifest_path(dir: &Path) -> PathBuf {
    dir.join("manifest.json")
}

/// Load the manifest from `dir` if present.
pub fn load(dir: &Path) -> Result<Option<Manifest>, EngineError> {
    let path = manifest_path(dir);
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(&path)?;
    let manifest: Manifest =
        serde_json::from_str(&contents).map_err(|e| EngineError::CorruptData {
            path: path.clone(),
            reason: format!("manifest is not valid JSON: {e}"),
        })?;
    Ok(Some(manifest))
}

/// Persist `manifest` to `dir` atomically: write to a temp file in the same
/// directory, fsync it, rename over the target, then fsync the directory so
/// the rename itself survives a crash.
pub fn persist(dir: &Path, manifest: &Manifest) -> Result<(), EngineError> {
    fs::create_dir_all(dir)?;
    let target = manifest_path(dir);
    let temp_path = dir.join("manifest.json.tmp");

    let body = serde_json::to_vec_pretty(manifest).map_err(|e| EngineError::CorruptData {
        path: target.clone(),
        reason: format!("failed to serialize manifest: {e}"),
    })?;

    {
        let mut temp = File::create(&temp_path)?;
        temp.write_all(&body)?;
        temp.sync_all()?;
    }
    fs::rename(&temp_path, &target)?;

    let dir_handle = File::open(dir)?;
    dir_handle.sync_all()?;

    Ok(())
}
