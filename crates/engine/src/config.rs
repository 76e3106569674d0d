//! Engine configuration, with optional environment variable overrides for
//! the CLI and other process-level entry points.

use horizon_core::limits::SEGMENT_MAX_BYTES;
use horizon_durability::DurabilityMode;

/// Tunables for one `Engine::open` call. Library callers construct this
/// directly; the CLI binary builds it from environment variables via
/// [`EngineConfig::from_env`].
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub durability: DurabilityMode,
    pub segment_max_bytes: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            durability: DurabilityMode::default(),
            segment_max_bytes: SEGMENT_MAX_BYTES,
        }
    }
}

impl EngineConfig {
    /// Apply `ENGINE_DURABILITY`, `ENGINE_GROUP_COMMIT_MS`, and
    /// `ENGINE_SEGMENT_MAX_BYTES` on top of the defaults. Unset or
    /// unrecognized values fall back silently to the default for that
    /// field; the CLI is responsible for surfacing a warning if it cares.
    pub fn from_env() -> Self {
        let mut config = EngineConfig::default();

        if let Ok(raw) = std::env::var("ENGINE_DURABILITY") {
            if let Some(mode) = DurabilityMode::parse(raw.trim()) {
                config.durability = mode;
            }
        }

        if let Ok(raw) = std::env::var("ENGINE_GROUP_COMMIT_MS") {
            if let Ok(interval_ms) = raw.trim().parse::<u64>() {
                config.durability = match config.durability {
                    DurabilityMode::Sync => DurabilityMode::Sync,
                    DurabilityMode::GroupCommit {
                        max_buffered_bytes, ..
                    } => DurabilityMode::GroupCommit {
                        interval_ms,
                        max_buffered_bytes,
                    },
                    DurabilityMode::AsyncAck {
                        max_buffered_bytes, ..
                    } => DurabilityMode::AsyncAck {
                        interval_ms,
                        max_buffered_bytes,
                    },
                };
            }
        }

        if let Ok(raw) = std::env::var("ENGINE_SEGMENT_MAX_BYTES") {
            if let Ok(bytes) = raw.trim().parse::<u64>() {
                config.segment_max_bytes = bytes;
            }
        }

        config
    }
}
