//! Unified error type for the engine, per the error taxonomy: callers match
//! on variants rather than strings, and every variant carries enough context
//! to log or display without a source lookup.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// All errors the engine can return.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Key exceeds `MAX_KEY_LEN`, or is empty. Caller fault, no side effect.
    #[error("key too large: {len} bytes")]
    KeyTooLarge { len: usize },

    /// Value exceeds `MAX_VALUE_LEN`. Caller fault, no side effect.
    #[error("value too large: {len} bytes")]
    ValueTooLarge { len: usize },

    /// The log is poisoned (a prior fsync failed) or the engine is closing.
    /// Fatal for this engine instance.
    #[error("log unavailable for shard {shard_id}: {reason}")]
    LogUnavailable { shard_id: u8, reason: String },

    /// Disk full while fsyncing. The engine stays open; caller may retry.
    #[error("no space left on device (shard {shard_id})")]
    NoSpace { shard_id: u8 },

    /// Corruption detected while opening a data directory.
    #[error("corrupt data at {path}: {reason}")]
    CorruptData { path: PathBuf, reason: String },

    /// Manifest disagrees with the compiled `N_SHARDS`/hash algorithm.
    #[error(
        "version mismatch: manifest has n_shards={manifest_n_shards} hash={manifest_hash}, \
         runtime expects n_shards={runtime_n_shards} hash={runtime_hash}"
    )]
    VersionMismatch {
        manifest_n_shards: usize,
        manifest_hash: String,
        runtime_n_shards: usize,
        runtime_hash: String,
    },

    /// Another process already holds the directory lock.
    #[error("data directory already locked: {path}")]
    AlreadyLocked { path: PathBuf },

    /// Generic I/O error. Fatal for the current operation only.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The engine has already been closed; contract violation by the caller.
    #[error("operation attempted on a closed engine")]
    Closed,
}

impl EngineError {
    /// Whether this error poisons the whole engine instance (vs. being
    /// scoped to a single failed operation).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::LogUnavailable { .. } | EngineError::Closed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_too_large_is_not_fatal() {
        let e = EngineError::KeyTooLarge { len: 5000 };
        assert!(!e.is_fatal());
    }

    #[test]
    fn log_unavailable_is_fatal() {
        let e = EngineError::LogUnavailable {
            shard_id: 0,
            reason: "fsync failed".into(),
        };
        assert!(e.is_fatal());
    }

    #[test]
    fn display_messages_are_informative() {
        let e = EngineError::AlreadyLocked {
            path: PathBuf::from("/tmp/db"),
        };
        assert!(e.to_string().contains("/tmp/db"));
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: EngineError = io_err.into();
        assert!(matches!(e, EngineError::Io(_)));
    }
}
