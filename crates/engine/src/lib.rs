//! Public API for the Horizon embedded key-value engine: composes the
//! router, the tiered cache, and the per-shard write-ahead logs, and
//! orchestrates crash recovery on open.
//!
//! ```no_run
//! use horizon_engine::{Engine, EngineConfig};
//! use horizon_core::Hints;
//!
//! let engine = Engine::open("/tmp/horizon-db", EngineConfig::default())?;
//! engine.put(b"key", b"value", Hints::default())?;
//! engine.flush()?;
//! assert_eq!(engine.get(b"key")?, Some(b"value".to_vec()));
//! engine.close()?;
//! # Ok::<(), horizon_core::EngineError>(())
//! ```

#![warn(clippy::all)]

mod config;
mod directory;
mod engine;
mod recovery;

pub use config::EngineConfig;
pub use engine::{Engine, EngineStats};

pub use horizon_core::{AccessPattern, EngineError, Hints, Priority, Result};
pub use horizon_durability::Manifest;
