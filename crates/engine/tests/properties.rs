//! Property-based tests over randomized key/value/hint inputs, covering the
//! round-trip, overwrite, and delete-idempotence invariants.

use horizon_core::{AccessPattern, Hints, Priority};
use horizon_engine::{Engine, EngineConfig};
use proptest::prelude::*;
use tempfile::tempdir;

fn access_pattern_strategy() -> impl Strategy<Value = AccessPattern> {
    prop_oneof![
        Just(AccessPattern::Hot),
        Just(AccessPattern::Warm),
        Just(AccessPattern::Cold),
        Just(AccessPattern::Balanced),
    ]
}

fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Critical),
        Just(Priority::High),
        Just(Priority::Normal),
        Just(Priority::Low),
        Just(Priority::Background),
    ]
}

fn hints_strategy() -> impl Strategy<Value = Hints> {
    (access_pattern_strategy(), priority_strategy())
        .prop_map(|(access_pattern, priority)| Hints::new(access_pattern, priority))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// P1: put then flush then get round-trips the exact bytes written.
    #[test]
    fn put_then_get_round_trips(
        key in prop::collection::vec(any::<u8>(), 1..256),
        value in prop::collection::vec(any::<u8>(), 0..4096),
        hints in hints_strategy(),
    ) {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        engine.put(&key, &value, hints).unwrap();
        engine.flush().unwrap();
        prop_assert_eq!(engine.get(&key).unwrap(), Some(value));
    }

    /// P2: the second of two puts to the same key wins, and the key is
    /// never duplicated across shards. `hints1`/`hints2` are sampled
    /// independently: the spec's `put(key, value, hints?)` signature allows
    /// hints to differ across overwrites of the same key (only the
    /// first put's hints affect routing; see `Engine::put`), so this
    /// exercises a re-put landing in a different cache tier than the
    /// original put, not just same-tier overwrites.
    #[test]
    fn overwrite_keeps_only_the_latest_value(
        key in prop::collection::vec(any::<u8>(), 1..256),
        v1 in prop::collection::vec(any::<u8>(), 0..1024),
        v2 in prop::collection::vec(any::<u8>(), 0..1024),
        hints1 in hints_strategy(),
        hints2 in hints_strategy(),
    ) {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        engine.put(&key, &v1, hints1).unwrap();
        engine.put(&key, &v2, hints2).unwrap();
        engine.flush().unwrap();
        prop_assert_eq!(engine.get(&key).unwrap(), Some(v2));
        let total: usize = engine.stats().shards.iter().map(|s| s.size).sum();
        prop_assert_eq!(total, 1);
    }

    /// P3: deleting twice is equivalent to deleting once; the second call
    /// always reports the key as already absent.
    #[test]
    fn double_delete_is_idempotent(
        key in prop::collection::vec(any::<u8>(), 1..256),
        value in prop::collection::vec(any::<u8>(), 0..1024),
        hints in hints_strategy(),
    ) {
        let dir = tempdir().unwrap();
        let engine = Engine::open(dir.path(), EngineConfig::default()).unwrap();
        engine.put(&key, &value, hints).unwrap();
        let first = engine.delete(&key).unwrap();
        let second = engine.delete(&key).unwrap();
        engine.flush().unwrap();
        prop_assert!(first);
        prop_assert!(!second);
        prop_assert_eq!(engine.get(&key).unwrap(), None);
    }
}
