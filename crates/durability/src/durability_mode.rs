//! The one canonical durability mode. Earlier phases of this engine's
//! ancestry accumulated several divergent durability enums across modules;
//! this is the single replacement used everywhere.

use horizon_core::limits::{GROUP_COMMIT_INTERVAL_MS, GROUP_COMMIT_MAX_BYTES};

/// Controls when an `append` to a [`crate::wal::ShardLog`] is considered
/// complete from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityMode {
    /// `append` does not return until the entry is fsynced. Highest
    /// durability, lowest throughput.
    Sync,

    /// A background flusher fsyncs batches on a timer or byte threshold,
    /// whichever comes first. `append` completes once the batch containing
    /// it is fsynced. The default.
    GroupCommit {
        interval_ms: u64,
        max_buffered_bytes: usize,
    },

    /// Like `GroupCommit`, but `append` returns immediately without waiting
    /// for the flush to complete. Callers accept loss of in-flight writes on
    /// crash.
    AsyncAck {
        interval_ms: u64,
        max_buffered_bytes: usize,
    },
}

impl Default for DurabilityMode {
    fn default() -> Self {
        DurabilityMode::GroupCommit {
            interval_ms: GROUP_COMMIT_INTERVAL_MS,
            max_buffered_bytes: GROUP_COMMIT_MAX_BYTES,
        }
    }
}

impl DurabilityMode {
    /// Whether `append` should block the caller until the batch is fsynced.
    pub fn blocks_caller(&self) -> bool {
        !matches!(self, DurabilityMode::AsyncAck { .. })
    }

    /// The flush interval this mode uses, if it batches at all.
    pub fn interval_ms(&self) -> Option<u64> {
        match self {
            DurabilityMode::Sync => None,
            DurabilityMode::GroupCommit { interval_ms, .. }
            | DurabilityMode::AsyncAck { interval_ms, .. } => Some(*interval_ms),
        }
    }

    /// The buffered-bytes threshold this mode uses, if it batches at all.
    pub fn max_buffered_bytes(&self) -> Option<usize> {
        match self {
            DurabilityMode::Sync => None,
            DurabilityMode::GroupCommit {
                max_buffered_bytes, ..
            }
            | DurabilityMode::AsyncAck {
                max_buffered_bytes, ..
            } => Some(*max_buffered_bytes),
        }
    }

    /// Parse the `ENGINE_DURABILITY` environment variable's value.
    pub fn parse(value: &str) -> Option<DurabilityMode> {
        match value {
            "sync" => Some(DurabilityMode::Sync),
            "group_commit" => Some(DurabilityMode::default()),
            "async_ack" => Some(DurabilityMode::AsyncAck {
                interval_ms: GROUP_COMMIT_INTERVAL_MS,
                max_buffered_bytes: GROUP_COMMIT_MAX_BYTES,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_group_commit() {
        assert!(matches!(
            DurabilityMode::default(),
            DurabilityMode::GroupCommit { .. }
        ));
    }

    #[test]
    fn sync_and_group_commit_block_caller() {
        assert!(DurabilityMode::Sync.blocks_caller());
        assert!(DurabilityMode::default().blocks_caller());
    }

    #[test]
    fn async_ack_does_not_block_caller() {
        let mode = DurabilityMode::AsyncAck {
            interval_ms: 5,
            max_buffered_bytes: 1024,
        };
        assert!(!mode.blocks_caller());
    }

    #[test]
    fn parse_recognizes_all_three_modes() {
        assert!(matches!(
            DurabilityMode::parse("sync"),
            Some(DurabilityMode::Sync)
        ));
        assert!(matches!(
            DurabilityMode::parse("group_commit"),
            Some(DurabilityMode::GroupCommit { .. })
        ));
        assert!(matches!(
            DurabilityMode::parse("async_ack"),
            Some(DurabilityMode::AsyncAck { .. })
        ));
        assert!(DurabilityMode::parse("bogus").is_none());
    }
}
