//! Caller-supplied routing and caching hints.
//!
//! Hints never persist to the log as first-class fields; they only influence
//! which shard a key lands on (at insert time) and which cache tier admits
//! it. See [`crate::limits`] for the weights that consume these values.

use serde::{Deserialize, Serialize};

/// Declared access pattern for a key, used by the router's pattern affinity
/// and by cache tier placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessPattern {
    Hot,
    Warm,
    Cold,
    Balanced,
}

impl Default for AccessPattern {
    fn default() -> Self {
        AccessPattern::Balanced
    }
}

/// Declared priority for a key, used by the router's priority affinity and
/// to pick the initial cache tier on admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
    Background,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl Priority {
    /// Numeric weight in `[0, 1]` used by the cache score function.
    pub fn weight(self) -> f64 {
        match self {
            Priority::Critical => 1.0,
            Priority::High => 0.75,
            Priority::Normal => 0.5,
            Priority::Low => 0.25,
            Priority::Background => 0.0,
        }
    }

    /// Cache tier an entry with this priority is admitted into on a miss.
    pub fn admit_tier(self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low | Priority::Background => 3,
        }
    }
}

/// Optional per-put hints. All fields default to the value that makes the
/// router/cache treat the key as ordinary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Hints {
    pub access_pattern: AccessPattern,
    pub priority: Priority,
}

impl Hints {
    pub fn new(access_pattern: AccessPattern, priority: Priority) -> Self {
        Hints {
            access_pattern,
            priority,
        }
    }
}
