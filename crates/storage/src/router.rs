//! Deterministic `(key, hints) -> shard id` routing.

use horizon_core::limits::{
    KEY_HASH_SEED, N_SHARDS, ROUTER_WEIGHT_HASH, ROUTER_WEIGHT_PATTERN, ROUTER_WEIGHT_PRIORITY,
};
use horizon_core::{AccessPattern, Hints, Priority, ShardId};
use xxhash_rust::xxh64::xxh64;

/// A shard's declared position on the hot/cold spectrum. Shard 0 is
/// hottest, the last shard is coldest; shards between are warm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TierProfile {
    Hot,
    Warm,
    Cold,
}

fn tier_profile(shard: usize, n_shards: usize) -> TierProfile {
    if shard == 0 {
        TierProfile::Hot
    } else if shard + 1 == n_shards {
        TierProfile::Cold
    } else {
        TierProfile::Warm
    }
}

fn hash_affinity(h: u64, shard: usize, n_shards: usize) -> f64 {
    let home = (h % n_shards as u64) as i64;
    let distance = (home - shard as i64).unsigned_abs();
    1.0 - (distance as f64 / n_shards as f64)
}

fn pattern_affinity(pattern: AccessPattern, shard: usize, n_shards: usize) -> f64 {
    let tier = tier_profile(shard, n_shards);
    match (pattern, tier) {
        (AccessPattern::Hot, TierProfile::Hot) => 1.0,
        (AccessPattern::Hot, TierProfile::Warm) => 0.5,
        (AccessPattern::Hot, TierProfile::Cold) => 0.0,
        (AccessPattern::Cold, TierProfile::Cold) => 1.0,
        (AccessPattern::Cold, TierProfile::Warm) => 0.5,
        (AccessPattern::Cold, TierProfile::Hot) => 0.0,
        (AccessPattern::Warm, _) | (AccessPattern::Balanced, _) => 0.5,
    }
}

fn priority_affinity(priority: Priority, shard: usize, n_shards: usize) -> f64 {
    if n_shards <= 1 {
        return 0.5;
    }
    // Linear position in [0, 1]: 0 at shard 0 (hottest), 1 at the coldest shard.
    let position = shard as f64 / (n_shards - 1) as f64;
    match priority {
        Priority::Critical | Priority::High => 1.0 - position,
        Priority::Low | Priority::Background => position,
        Priority::Normal => 0.5,
    }
}

/// Score a single shard for `(key_hash, hints)`. Exposed for tests and for
/// `stats`/diagnostic tooling; `route` is the function callers use.
fn score(h: u64, shard: usize, hints: &Hints, n_shards: usize) -> f64 {
    ROUTER_WEIGHT_HASH * hash_affinity(h, shard, n_shards)
        + ROUTER_WEIGHT_PATTERN * pattern_affinity(hints.access_pattern, shard, n_shards)
        + ROUTER_WEIGHT_PRIORITY * priority_affinity(hints.priority, shard, n_shards)
}

/// Hash `key` with the fixed, on-disk-contract hash function.
pub fn hash_key(key: &[u8]) -> u64 {
    xxh64(key, KEY_HASH_SEED)
}

/// Deterministically route `key` (already hashed) with `hints` to a shard.
/// Pure function: same inputs always yield the same shard, which is the
/// property recovery depends on.
pub fn route(key: &[u8], hints: &Hints) -> ShardId {
    route_with_shard_count(key, hints, N_SHARDS)
}

/// `route`, parameterized by shard count; used by tests that want to probe
/// routing behavior at shard counts other than the compiled-in default.
pub fn route_with_shard_count(key: &[u8], hints: &Hints, n_shards: usize) -> ShardId {
    let h = hash_key(key);
    let mut best_shard = 0usize;
    let mut best_score = f64::MIN;
    for shard in 0..n_shards {
        let s = score(h, shard, hints, n_shards);
        if s > best_score {
            best_score = s;
            best_shard = shard;
        }
    }
    ShardId::new(best_shard)
}
