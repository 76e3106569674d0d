//! Minimal CLI surface for the Horizon embedded engine.
//!
//! Four subcommands: `open` and `verify` are diagnostic entry points used to
//! inspect a data directory without writing an application around the
//! library; `put`/`get` are thin one-shot wrappers for poking at a directory
//! from a shell. None of these are load-bearing for the engine's properties
//! — they are a convenience layer on top of `horizon-engine`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use horizon_core::limits::N_SHARDS;
use horizon_core::{AccessPattern, Hints, Priority};
use horizon_engine::{Engine, EngineConfig};

#[derive(Parser)]
#[command(name = "horizon", about = "Horizon embedded key-value engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a data directory, run recovery, report stats, and exit.
    Open { dir: PathBuf },

    /// Scan every shard's WAL segments for corruption without opening the
    /// engine. Exits 0 on clean, 1 if corruption was found, 2 on I/O error.
    Verify { dir: PathBuf },

    /// Convenience wrapper around open + put + flush + close.
    Put {
        dir: PathBuf,
        key: String,
        value: String,
        #[arg(long, value_enum, default_value_t = CliAccessPattern::Balanced)]
        access_pattern: CliAccessPattern,
        #[arg(long, value_enum, default_value_t = CliPriority::Normal)]
        priority: CliPriority,
    },

    /// Convenience wrapper around open + get + close.
    Get { dir: PathBuf, key: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum CliAccessPattern {
    Hot,
    Warm,
    Cold,
    Balanced,
}

impl From<CliAccessPattern> for AccessPattern {
    fn from(value: CliAccessPattern) -> Self {
        match value {
            CliAccessPattern::Hot => AccessPattern::Hot,
            CliAccessPattern::Warm => AccessPattern::Warm,
            CliAccessPattern::Cold => AccessPattern::Cold,
            CliAccessPattern::Balanced => AccessPattern::Balanced,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliPriority {
    Critical,
    High,
    Normal,
    Low,
    Background,
}

impl From<CliPriority> for Priority {
    fn from(value: CliPriority) -> Self {
        match value {
            CliPriority::Critical => Priority::Critical,
            CliPriority::High => Priority::High,
            CliPriority::Normal => Priority::Normal,
            CliPriority::Low => Priority::Low,
            CliPriority::Background => Priority::Background,
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Open { dir } => cmd_open(&dir),
        Commands::Verify { dir } => cmd_verify(&dir),
        Commands::Put {
            dir,
            key,
            value,
            access_pattern,
            priority,
        } => cmd_put(&dir, &key, &value, access_pattern.into(), priority.into()),
        Commands::Get { dir, key } => cmd_get(&dir, &key),
    }
}

fn format_unix_ns(unix_ns: u64) -> String {
    chrono::DateTime::from_timestamp((unix_ns / 1_000_000_000) as i64, (unix_ns % 1_000_000_000) as u32)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| format!("{unix_ns}ns"))
}

fn cmd_open(dir: &PathBuf) -> ExitCode {
    match Engine::open(dir, EngineConfig::from_env()) {
        Ok(engine) => {
            let manifest = engine.manifest();
            let stats = engine.stats();
            println!("opened {}", dir.display());
            println!(
                "  created_at={} n_shards={} hash={}",
                format_unix_ns(manifest.created_at_unix_ns),
                manifest.n_shards,
                manifest.hash_algorithm
            );
            for (i, shard) in stats.shards.iter().enumerate() {
                println!("  shard {i}: {} keys, last_seq={}", shard.size, shard.last_seq);
            }
            println!(
                "  cache: {} hits, {} misses, tiers={:?}",
                stats.cache.hits, stats.cache.misses, stats.cache.tier_sizes
            );
            engine.close().ok();
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("failed to open {}: {e}", dir.display());
            ExitCode::from(2)
        }
    }
}

fn cmd_verify(dir: &PathBuf) -> ExitCode {
    let mut any_corruption = false;
    for shard_id in 0..N_SHARDS {
        let shard_dir = dir.join(format!("shard-{shard_id}"));
        match horizon_durability::verify(&shard_dir) {
            Ok(result) => {
                println!(
                    "shard {shard_id}: {} good entries, {} findings",
                    result.good_entries,
                    result.findings.len()
                );
                for finding in &result.findings {
                    any_corruption = true;
                    println!(
                        "  segment {} offset {}: {}",
                        finding.segment_number, finding.offset, finding.reason
                    );
                }
            }
            Err(e) => {
                eprintln!("I/O error scanning shard {shard_id}: {e}");
                return ExitCode::from(2);
            }
        }
    }
    if any_corruption {
        ExitCode::from(1)
    } else {
        println!("clean");
        ExitCode::SUCCESS
    }
}

fn cmd_put(
    dir: &PathBuf,
    key: &str,
    value: &str,
    access_pattern: AccessPattern,
    priority: Priority,
) -> ExitCode {
    let engine = match Engine::open(dir, EngineConfig::from_env()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to open {}: {e}", dir.display());
            return ExitCode::from(2);
        }
    };
    let hints = Hints::new(access_pattern, priority);
    let result = engine
        .put(key.as_bytes(), value.as_bytes(), hints)
        .and_then(|_| engine.flush());
    engine.close().ok();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("put failed: {e}");
            ExitCode::from(2)
        }
    }
}

fn cmd_get(dir: &PathBuf, key: &str) -> ExitCode {
    let engine = match Engine::open(dir, EngineConfig::from_env()) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to open {}: {e}", dir.display());
            return ExitCode::from(2);
        }
    };
    let result = engine.get(key.as_bytes());
    engine.close().ok();
    match result {
        Ok(Some(value)) => {
            println!("{}", String::from_utf8_lossy(&value));
            ExitCode::SUCCESS
        }
        Ok(None) => {
            eprintln!("(not found)");
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("get failed: {e}");
            ExitCode::from(2)
        }
    }
}
