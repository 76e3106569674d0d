//! Write-ahead logging, durability modes, the directory manifest, and the
//! directory lock file: everything that makes a shard's on-disk state
//! survive a crash.

#![warn(clippy::all)]

pub mod codec;
pub mod durability_mode;
pub mod lock;
pub mod manifest;
pub mod wal;

pub use codec::{DecodeError, LogEntry, Op};
pub use durability_mode::DurabilityMode;
pub use lock::DirectoryLock;
pub use manifest::Manifest;
pub use wal::{replay, verify, ReplayResult, ShardLog, VerifyFinding, VerifyResult};
