//! Four-tier front cache: event horizon, photon sphere, deep cache, and
//! singularity, in decreasing priority and increasing capacity.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use horizon_core::limits::{
    CACHE_TIER_CAPACITIES, COMPRESS_THRESHOLD_BYTES, PROMOTION_THRESHOLDS, SCORE_WEIGHT_FREQUENCY,
    SCORE_WEIGHT_PRIORITY, SCORE_WEIGHT_RECENCY,
};
use horizon_core::Hints;
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Names match the tiers' declared order; used only for logging.
pub const TIER_NAMES: [&str; 4] = ["event horizon", "photon sphere", "deep cache", "singularity"];

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub tier_sizes: [usize; 4],
    pub evictions: u64,
}

struct Entry {
    value: Vec<u8>,
    compressed: bool,
    priority_weight: f64,
    access_count: u64,
    last_access_unix_s: f64,
}

impl Entry {
    fn score(&self, now_unix_s: f64) -> f64 {
        let recency = 1.0 / (1.0 + (now_unix_s - self.last_access_unix_s).max(0.0));
        let frequency = (self.access_count as f64 / 100.0).min(1.0);
        SCORE_WEIGHT_RECENCY * recency
            + SCORE_WEIGHT_FREQUENCY * frequency
            + SCORE_WEIGHT_PRIORITY * self.priority_weight
    }
}

struct Tier {
    capacity: usize,
    entries: HashMap<Vec<u8>, Entry>,
}

impl Tier {
    fn new(capacity: usize) -> Self {
        Tier {
            capacity,
            entries: HashMap::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Evict the lowest-scoring entry, returning `(key, entry)` if one
    /// existed.
    fn evict_lowest(&mut self, now_unix_s: f64) -> Option<(Vec<u8>, Entry)> {
        let worst_key = self
            .entries
            .iter()
            .min_by(|(_, a), (_, b)| {
                a.score(now_unix_s)
                    .partial_cmp(&b.score(now_unix_s))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(k, _)| k.clone())?;
        self.entries.remove(&worst_key).map(|e| (worst_key, e))
    }
}

fn now_unix_s() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn maybe_compress(tier_index: usize, value: &[u8]) -> (Vec<u8>, bool) {
    match tier_index {
        3 => (
            zstd::encode_all(value, 0).unwrap_or_else(|_| value.to_vec()),
            true,
        ),
        2 if value.len() > COMPRESS_THRESHOLD_BYTES => (
            zstd::encode_all(value, 0).unwrap_or_else(|_| value.to_vec()),
            true,
        ),
        _ => (value.to_vec(), false),
    }
}

fn decompress_if_needed(entry: &Entry) -> Vec<u8> {
    if entry.compressed {
        zstd::decode_all(entry.value.as_slice()).unwrap_or_else(|_| entry.value.clone())
    } else {
        entry.value.clone()
    }
}

/// A bounded, tiered read cache in front of the shard maps. The engine
/// guarantees the cache's contents are always a subset of the owning
/// shard's contents.
pub struct Cache {
    tiers: [Mutex<Tier>; 4],
    stats: Mutex<CacheStats>,
}

impl Cache {
    pub fn new() -> Self {
        Cache {
            tiers: [
                Mutex::new(Tier::new(CACHE_TIER_CAPACITIES[0])),
                Mutex::new(Tier::new(CACHE_TIER_CAPACITIES[1])),
                Mutex::new(Tier::new(CACHE_TIER_CAPACITIES[2])),
                Mutex::new(Tier::new(CACHE_TIER_CAPACITIES[3])),
            ],
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Check each tier in order; on hit, bumps access bookkeeping and
    /// promotes the entry toward tier 0 if its score now warrants it.
    pub fn lookup(&self, key: &[u8]) -> Option<Vec<u8>> {
        let now = now_unix_s();
        for tier_index in 0..4 {
            let mut tier = self.tiers[tier_index].lock();
            if let Some(entry) = tier.entries.get_mut(key) {
                entry.access_count += 1;
                entry.last_access_unix_s = now;
                let value = decompress_if_needed(entry);
                let score = entry.score(now);
                drop(tier);

                self.stats.lock().hits += 1;
                trace!(tier = TIER_NAMES[tier_index], score, "cache hit");

                if tier_index > 0 && score > PROMOTION_THRESHOLDS[tier_index - 1] {
                    self.promote(key, tier_index, now);
                }
                return Some(value);
            }
        }
        self.stats.lock().misses += 1;
        None
    }

    fn promote(&self, key: &[u8], from_tier: usize, now: f64) {
        let to_tier = from_tier - 1;
        let entry = {
            let mut tier = self.tiers[from_tier].lock();
            match tier.entries.remove(key) {
                Some(e) => e,
                None => return,
            }
        };

        let displaced = {
            let mut dest = self.tiers[to_tier].lock();
            let displaced = if dest.is_full() {
                dest.evict_lowest(now)
            } else {
                None
            };
            dest.entries.insert(key.to_vec(), entry);
            displaced
        };

        if let Some((displaced_key, displaced_entry)) = displaced {
            self.demote_into(from_tier, displaced_key, displaced_entry);
            debug!(
                from = TIER_NAMES[to_tier],
                to = TIER_NAMES[from_tier],
                "promotion displaced an entry, demoting it"
            );
        }
    }

    /// Place an already-evicted entry into `tier_index`, recompressing if
    /// that tier's rules require it, or drop it if `tier_index` has no room
    /// and there is nowhere colder to send it.
    fn demote_into(&self, tier_index: usize, key: Vec<u8>, mut entry: Entry) {
        if tier_index >= 4 {
            self.stats.lock().evictions += 1;
            return;
        }
        let raw = if entry.compressed {
            zstd::decode_all(entry.value.as_slice()).unwrap_or_else(|_| entry.value.clone())
        } else {
            entry.value.clone()
        };
        let (stored, compressed) = maybe_compress(tier_index, &raw);
        entry.value = stored;
        entry.compressed = compressed;

        let now = now_unix_s();
        let displaced = {
            let mut tier = self.tiers[tier_index].lock();
            let displaced = if tier.is_full() {
                tier.evict_lowest(now)
            } else {
                None
            };
            tier.entries.insert(key, entry);
            displaced
        };
        if let Some((displaced_key, displaced_entry)) = displaced {
            self.demote_into(tier_index + 1, displaced_key, displaced_entry);
        }
    }

    /// Insert into the tier implied by `hints.priority`. If that tier is
    /// full, evicts its lowest-scoring entry (demoting it one tier colder
    /// if room exists there). A key is never resident in more than one tier:
    /// if `key` already occupies a different tier (e.g. a re-put with a
    /// different priority hint), it is removed from there first.
    pub fn admit(&self, key: &[u8], value: &[u8], hints: &Hints) {
        let tier_index = hints.priority.admit_tier();
        self.invalidate(key);
        let now = now_unix_s();
        let (stored, compressed) = maybe_compress(tier_index, value);
        let entry = Entry {
            value: stored,
            compressed,
            priority_weight: hints.priority.weight(),
            access_count: 1,
            last_access_unix_s: now,
        };

        let displaced = {
            let mut tier = self.tiers[tier_index].lock();
            let displaced = if tier.is_full() {
                tier.evict_lowest(now)
            } else {
                None
            };
            tier.entries.insert(key.to_vec(), entry);
            displaced
        };

        if let Some((displaced_key, displaced_entry)) = displaced {
            self.demote_into(tier_index + 1, displaced_key, displaced_entry);
        }
    }

    /// Remove `key` from whatever tier holds it. Invariant I5 requires
    /// callers to invalidate before a `delete` returns.
    pub fn invalidate(&self, key: &[u8]) {
        for tier in &self.tiers {
            tier.lock().entries.remove(key);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().clone();
        for (i, tier) in self.tiers.iter().enumerate() {
            stats.tier_sizes[i] = tier.lock().entries.len();
        }
        stats
    }
}

impl Default for Cache {
    fn default() -> Self {
        Cache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horizon_core::{AccessPattern, Priority};

    fn hints_with_priority(priority: Priority) -> Hints {
        Hints::new(AccessPattern::Balanced, priority)
    }

    #[test]
    fn admit_then_lookup_round_trips() {
        let cache = Cache::new();
        let hints = hints_with_priority(Priority::Normal);
        cache.admit(b"k", b"v", &hints);
        assert_eq!(cache.lookup(b"k"), Some(b"v".to_vec()));
    }

    #[test]
    fn lookup_miss_is_counted() {
        let cache = Cache::new();
        assert_eq!(cache.lookup(b"missing"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn critical_priority_admits_into_tier_zero() {
        let cache = Cache::new();
        let hints = hints_with_priority(Priority::Critical);
        cache.admit(b"k", b"v", &hints);
        assert_eq!(cache.stats().tier_sizes[0], 1);
    }

    #[test]
    fn background_priority_admits_into_tier_three_and_is_compressed() {
        let cache = Cache::new();
        let hints = hints_with_priority(Priority::Background);
        let value = vec![7u8; 100];
        cache.admit(b"k", &value, &hints);
        assert_eq!(cache.stats().tier_sizes[3], 1);
        assert_eq!(cache.lookup(b"k"), Some(value));
    }

    #[test]
    fn invalidate_removes_from_every_tier() {
        let cache = Cache::new();
        let hints = hints_with_priority(Priority::Critical);
        cache.admit(b"k", b"v", &hints);
        cache.invalidate(b"k");
        assert_eq!(cache.lookup(b"k"), None);
    }

    #[test]
    fn admitting_same_key_twice_does_not_double_count_tier_size() {
        let cache = Cache::new();
        let hints = hints_with_priority(Priority::Critical);
        cache.admit(b"k", b"v1", &hints);
        cache.admit(b"k", b"v2", &hints);
        assert_eq!(cache.stats().tier_sizes[0], 1);
        assert_eq!(cache.lookup(b"k"), Some(b"v2".to_vec()));
    }

    #[test]
    fn re_admitting_a_key_with_a_different_priority_moves_it_instead_of_duplicating() {
        let cache = Cache::new();
        cache.admit(b"k", b"v1", &hints_with_priority(Priority::Critical));
        cache.admit(b"k", b"v2", &hints_with_priority(Priority::Background));

        // The key must not be left behind in tier 0.
        assert_eq!(cache.stats().tier_sizes[0], 0);
        assert_eq!(cache.stats().tier_sizes[3], 1);
        // And lookup must find the new value, not a stale tier-0 copy.
        assert_eq!(cache.lookup(b"k"), Some(b"v2".to_vec()));
    }

    #[test]
    fn stats_report_per_tier_sizes() {
        let cache = Cache::new();
        cache.admit(b"a", b"1", &hints_with_priority(Priority::Critical));
        cache.admit(b"b", b"2", &hints_with_priority(Priority::Low));
        let stats = cache.stats();
        assert_eq!(stats.tier_sizes[0], 1);
        assert_eq!(stats.tier_sizes[3], 1);
    }
}
