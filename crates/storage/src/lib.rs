//! Shard storage, routing, and the tiered front cache.

#![warn(clippy::all)]

pub mod cache;
pub mod router;
pub mod shard;

pub use cache::{Cache, CacheStats};
pub use router::{hash_key, route, route_with_shard_count};
pub use shard::{Shard, ShardStats};
