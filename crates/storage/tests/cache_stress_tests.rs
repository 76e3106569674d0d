//! Randomized admit/lookup/invalidate sequences, checking that the cache's
//! tier-capacity bound holds no matter the access pattern.

use horizon_core::{AccessPattern, Hints, Priority};
use horizon_storage::Cache;
use rand::prelude::*;

#[test]
fn tier_sizes_never_exceed_their_declared_capacity_under_random_load() {
    let cache = Cache::new();
    let mut rng = rand::thread_rng();
    let patterns = [
        AccessPattern::Hot,
        AccessPattern::Warm,
        AccessPattern::Cold,
        AccessPattern::Balanced,
    ];
    let priorities = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
        Priority::Background,
    ];

    let keys: Vec<Vec<u8>> = (0..500u32).map(|i| i.to_le_bytes().to_vec()).collect();

    for _ in 0..5_000 {
        let key = keys.choose(&mut rng).unwrap();
        match rng.gen_range(0..10) {
            0 => {
                cache.invalidate(key);
            }
            1..=3 => {
                cache.lookup(key);
            }
            _ => {
                let value_len = rng.gen_range(0..8192);
                let value: Vec<u8> = (0..value_len).map(|_| rng.gen()).collect();
                let hints = Hints::new(
                    *patterns.choose(&mut rng).unwrap(),
                    *priorities.choose(&mut rng).unwrap(),
                );
                cache.admit(key, &value, &hints);
            }
        }
    }

    let stats = cache.stats();
    let capacities = horizon_core::limits::CACHE_TIER_CAPACITIES;
    for (tier, (&size, &capacity)) in stats.tier_sizes.iter().zip(capacities.iter()).enumerate() {
        assert!(
            size <= capacity,
            "tier {tier} holds {size} entries, over its capacity of {capacity}"
        );
    }
}

#[test]
fn values_admitted_then_looked_up_immediately_round_trip() {
    let cache = Cache::new();
    let mut rng = rand::thread_rng();

    for i in 0..200u32 {
        let key = i.to_le_bytes().to_vec();
        let value: Vec<u8> = (0..rng.gen_range(1..2048)).map(|_| rng.gen()).collect();
        cache.admit(&key, &value, &Hints::default());
        assert_eq!(cache.lookup(&key), Some(value));
    }
}
