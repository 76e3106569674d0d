//! Per-shard write-ahead log: segment files, group-commit batching, and the
//! background flusher thread.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use crate::codec::{self, LogEntry, Op};
use crate::durability_mode::DurabilityMode;

/// Name pattern: `wal-<segment_number zero-padded to 10>.log`.
fn segment_path(shard_dir: &Path, segment_number: u64) -> PathBuf {
    shard_dir.join(format!("wal-{segment_number:010}.log"))
}

/// List `wal-*.log` segments in a shard directory, sorted by segment number.
pub fn list_segments(shard_dir: &Path) -> std::io::Result<Vec<(u64, PathBuf)>> {
    if !shard_dir.exists() {
        return Ok(Vec::new());
    }
    let mut segments = Vec::new();
    for entry in fs::read_dir(shard_dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(stripped) = name.strip_prefix("wal-").and_then(|s| s.strip_suffix(".log")) {
            if let Ok(number) = stripped.parse::<u64>() {
                segments.push((number, path));
            }
        }
    }
    segments.sort_by_key(|(n, _)| *n);
    Ok(segments)
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Best-effort detection of "disk full" so it can be reported as
/// [`horizon_core::EngineError::NoSpace`] instead of poisoning the log like
/// any other write failure. Checks the raw OS error for `ENOSPC` (28 on
/// Linux/macOS); anything else is treated as a fatal write failure.
fn is_out_of_space(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(28)
}

struct State {
    buffer: Vec<u8>,
    buffer_max_seq: u64,
    durable_seq: u64,
    file: File,
    segment_number: u64,
    segment_bytes: u64,
    closed: bool,
    force_flush: bool,
}

/// Durable append log for one shard.
pub struct ShardLog {
    shard_dir: PathBuf,
    shard_id: usize,
    durability: DurabilityMode,
    segment_max_bytes: u64,
    next_seq: AtomicU64,
    poisoned: AtomicBool,
    /// Set while the most recent flush attempt failed with `ENOSPC`, cleared
    /// as soon as a flush succeeds. Unlike `poisoned`, this is not fatal: the
    /// buffered bytes stay queued and the flusher keeps retrying.
    no_space: AtomicBool,
    state: Mutex<State>,
    not_empty: Condvar,
    durable_advanced: Condvar,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl ShardLog {
    /// Open or create the log for `shard_id` under `dir`, resuming from the
    /// highest existing segment. `starting_next_seq` should come from
    /// recovery (1 if the shard is new).
    pub fn open(
        dir: &Path,
        shard_id: usize,
        durability: DurabilityMode,
        starting_next_seq: u64,
        segment_max_bytes: u64,
    ) -> std::io::Result<Arc<ShardLog>> {
        let shard_dir = dir.join(format!("shard-{shard_id}"));
        fs::create_dir_all(&shard_dir)?;

        let segments = list_segments(&shard_dir)?;
        let (segment_number, file) = match segments.last() {
            Some((number, path)) => {
                let file = OpenOptions::new().append(true).open(path)?;
                (*number, file)
            }
            None => {
                let path = segment_path(&shard_dir, 0);
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)?;
                (0, file)
            }
        };
        let segment_bytes = fs::metadata(segment_path(&shard_dir, segment_number))?.len();

        let log = Arc::new(ShardLog {
            shard_dir,
            shard_id,
            durability,
            segment_max_bytes,
            next_seq: AtomicU64::new(starting_next_seq),
            poisoned: AtomicBool::new(false),
            no_space: AtomicBool::new(false),
            state: Mutex::new(State {
                buffer: Vec::new(),
                buffer_max_seq: starting_next_seq.saturating_sub(1),
                durable_seq: starting_next_seq.saturating_sub(1),
                file,
                segment_number,
                segment_bytes,
                closed: false,
                force_flush: false,
            }),
            not_empty: Condvar::new(),
            durable_advanced: Condvar::new(),
            flusher: Mutex::new(None),
        });

        if matches!(durability, DurabilityMode::Sync) {
            // No background thread: append writes and fsyncs inline.
            return Ok(log);
        }

        let worker_log = Arc::clone(&log);
        let handle = std::thread::Builder::new()
            .name(format!("horizon-flusher-shard-{shard_id}"))
            .spawn(move || worker_log.flusher_loop())
            .expect("failed to spawn group-commit flusher thread");
        *log.flusher.lock() = Some(handle);

        Ok(log)
    }

    /// Append a record, returning the assigned sequence number. Blocks until
    /// durable unless the configured mode is `AsyncAck`.
    pub fn append(&self, op: Op, key: &[u8], value: &[u8]) -> horizon_core::Result<u64> {
        if self.poisoned.load(AtomicOrdering::Acquire) {
            return Err(self.poisoned_error());
        }

        let seq = self.next_seq.fetch_add(1, AtomicOrdering::AcqRel);
        let entry = LogEntry {
            seq,
            op,
            key: key.to_vec(),
            value: value.to_vec(),
            timestamp_ns: now_ns(),
        };
        let encoded = codec::encode(&entry);
        let encoded_len = encoded.len();

        if matches!(self.durability, DurabilityMode::Sync) {
            self.write_and_sync_inline(&encoded, seq)?;
            return Ok(seq);
        }

        let threshold = self.durability.max_buffered_bytes().unwrap_or(usize::MAX);
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(self.closed_error());
            }
            state.buffer.extend_from_slice(&encoded);
            state.buffer_max_seq = seq;
            if state.buffer.len() >= threshold {
                self.not_empty.notify_one();
            }
        }

        if self.durability.blocks_caller() {
            self.wait_for_durable(seq)?;
        } else {
            self.not_empty.notify_one();
        }

        debug!(shard_id = self.shard_id, seq, bytes = encoded_len, "appended WAL entry");
        Ok(seq)
    }

    fn write_and_sync_inline(&self, encoded: &[u8], seq: u64) -> horizon_core::Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(self.closed_error());
        }
        self.rotate_if_needed_locked(&mut state, encoded.len() as u64);
        if let Err(e) = state.file.write_all(encoded).and_then(|_| state.file.sync_data()) {
            if is_out_of_space(&e) {
                warn!(shard_id = self.shard_id, "WAL write hit ENOSPC, entry not durable");
                return Err(self.no_space_error());
            }
            drop(state);
            self.poison(&e.to_string());
            return Err(self.poisoned_error());
        }
        state.segment_bytes += encoded.len() as u64;
        state.durable_seq = seq;
        self.no_space.store(false, AtomicOrdering::Release);
        Ok(())
    }

    fn wait_for_durable(&self, seq: u64) -> horizon_core::Result<()> {
        let mut state = self.state.lock();
        while state.durable_seq < seq {
            if self.poisoned.load(AtomicOrdering::Acquire) {
                return Err(self.poisoned_error());
            }
            if self.no_space.load(AtomicOrdering::Acquire) {
                return Err(self.no_space_error());
            }
            self.durable_advanced.wait(&mut state);
        }
        if self.poisoned.load(AtomicOrdering::Acquire) {
            return Err(self.poisoned_error());
        }
        Ok(())
    }

    /// Block until every entry with `seq <= target` is fsynced.
    pub fn flush_until(&self, target: u64) -> horizon_core::Result<()> {
        if matches!(self.durability, DurabilityMode::Sync) {
            let state = self.state.lock();
            if state.durable_seq >= target {
                return Ok(());
            }
            drop(state);
        }
        {
            let mut state = self.state.lock();
            state.force_flush = true;
        }
        self.not_empty.notify_one();
        self.wait_for_durable(target)
    }

    /// Block until the entire buffer at call time is fsynced.
    pub fn flush_all(&self) -> horizon_core::Result<()> {
        let target = {
            let state = self.state.lock();
            state.buffer_max_seq
        };
        self.flush_until(target)
    }

    fn flusher_loop(&self) {
        let interval = Duration::from_millis(self.durability.interval_ms().unwrap_or(5));
        loop {
            let mut state = self.state.lock();
            if state.closed && state.buffer.is_empty() {
                break;
            }
            if state.buffer.is_empty() && !state.force_flush {
                let timed_out = self.not_empty.wait_for(&mut state, interval).timed_out();
                if state.closed && state.buffer.is_empty() {
                    break;
                }
                if timed_out && state.buffer.is_empty() {
                    continue;
                }
            }
            state.force_flush = false;
            if state.buffer.is_empty() {
                continue;
            }
            let batch = std::mem::take(&mut state.buffer);
            let batch_max_seq = state.buffer_max_seq;
            self.rotate_if_needed_locked(&mut state, batch.len() as u64);

            let result = state.file.write_all(&batch).and_then(|_| state.file.sync_data());
            match result {
                Ok(()) => {
                    state.segment_bytes += batch.len() as u64;
                    state.durable_seq = batch_max_seq;
                    self.no_space.store(false, AtomicOrdering::Release);
                    drop(state);
                    self.durable_advanced.notify_all();
                }
                Err(e) if is_out_of_space(&e) => {
                    warn!(shard_id = self.shard_id, "WAL fsync hit ENOSPC, batch stays queued for retry");
                    // Put the batch back at the front so nothing is lost;
                    // waiters learn of the failure via `no_space` but the
                    // flusher keeps retrying once space frees up.
                    let mut restored = batch;
                    restored.extend_from_slice(&state.buffer);
                    state.buffer = restored;
                    self.no_space.store(true, AtomicOrdering::Release);
                    drop(state);
                    self.durable_advanced.notify_all();
                    std::thread::sleep(interval);
                }
                Err(e) => {
                    error!(shard_id = self.shard_id, error = %e, "WAL fsync failed, poisoning log");
                    drop(state);
                    self.poison(&e.to_string());
                    self.durable_advanced.notify_all();
                    break;
                }
            }
        }
    }

    fn rotate_if_needed_locked(&self, state: &mut State, incoming_bytes: u64) {
        if state.segment_bytes + incoming_bytes <= self.segment_max_bytes {
            return;
        }
        let next_number = state.segment_number + 1;
        let path = segment_path(&self.shard_dir, next_number);
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(new_file) => {
                debug!(
                    shard_id = self.shard_id,
                    from = state.segment_number,
                    to = next_number,
                    "rotated WAL segment"
                );
                state.file = new_file;
                state.segment_number = next_number;
                state.segment_bytes = 0;
            }
            Err(e) => {
                warn!(shard_id = self.shard_id, error = %e, "segment rotation failed, continuing on current segment");
            }
        }
    }

    /// Explicitly trigger a rotation check without writing data.
    pub fn rotate_if_needed(&self) {
        let mut state = self.state.lock();
        self.rotate_if_needed_locked(&mut state, 0);
    }

    fn poison(&self, reason: &str) {
        self.poisoned.store(true, AtomicOrdering::Release);
        let mut state = self.state.lock();
        state.closed = true;
        error!(shard_id = self.shard_id, reason, "shard log poisoned");
    }

    fn poisoned_error(&self) -> horizon_core::EngineError {
        horizon_core::EngineError::LogUnavailable {
            shard_id: self.shard_id as u8,
            reason: "log poisoned after fsync failure".to_string(),
        }
    }

    fn closed_error(&self) -> horizon_core::EngineError {
        horizon_core::EngineError::LogUnavailable {
            shard_id: self.shard_id as u8,
            reason: "log is closing".to_string(),
        }
    }

    fn no_space_error(&self) -> horizon_core::EngineError {
        horizon_core::EngineError::NoSpace {
            shard_id: self.shard_id as u8,
        }
    }

    /// Whether the most recent flush attempt failed with `ENOSPC`. Clears
    /// automatically once a subsequent flush succeeds.
    pub fn is_out_of_space(&self) -> bool {
        self.no_space.load(AtomicOrdering::Acquire)
    }

    /// Current highest assigned sequence number (may not yet be durable).
    pub fn last_assigned_seq(&self) -> u64 {
        self.next_seq.load(AtomicOrdering::Acquire).saturating_sub(1)
    }

    /// Current highest durable sequence number.
    pub fn last_durable_seq(&self) -> u64 {
        self.state.lock().durable_seq
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(AtomicOrdering::Acquire)
    }

    /// Drain outstanding buffers and stop the flusher thread. Idempotent.
    /// Returns the error from the final drain, if any, instead of
    /// discarding it: a `close()` that can't confirm its last buffered
    /// writes reached disk must say so, not report success.
    pub fn close(&self) -> horizon_core::Result<()> {
        if matches!(self.durability, DurabilityMode::Sync) {
            let mut state = self.state.lock();
            state.closed = true;
            return Ok(());
        }
        let flush_result = self.flush_all();
        {
            let mut state = self.state.lock();
            state.closed = true;
        }
        self.not_empty.notify_all();
        if let Some(handle) = self.flusher.lock().take() {
            let _ = handle.join();
        }
        flush_result
    }
}

/// Read and decode every well-formed record across every segment in
/// `shard_dir`, starting at segment 0. Stops at the first truncated,
/// corrupt, or unknown-version record and truncates that segment file to
/// the last known-good offset. Returns the entries applied in order and the
/// next sequence number to assign.
pub struct ReplayResult {
    pub entries: Vec<LogEntry>,
    pub next_seq: u64,
    pub truncated: bool,
}

pub fn replay(shard_dir: &Path) -> std::io::Result<ReplayResult> {
    let segments = list_segments(shard_dir)?;
    let mut entries = Vec::new();
    let mut max_seq = 0u64;
    let mut truncated = false;
    let mut stop_all = false;

    for (segment_number, path) in segments {
        if stop_all {
            break;
        }
        let mut file = File::open(&path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut offset = 0usize;
        loop {
            if offset >= bytes.len() {
                break;
            }
            match codec::decode(&bytes[offset..]) {
                Ok((entry, consumed)) => {
                    max_seq = max_seq.max(entry.seq);
                    offset += consumed;
                    entries.push(entry);
                }
                Err(codec::DecodeError::UnknownVersion { found }) => {
                    warn!(
                        segment = segment_number,
                        magic = format!("{found:#x}"),
                        "unknown WAL record version, stopping recovery for this and later segments"
                    );
                    stop_all = true;
                    break;
                }
                Err(e) => {
                    warn!(
                        segment = segment_number,
                        offset,
                        error = %e,
                        "truncating WAL segment at last known-good offset"
                    );
                    truncate_segment(&path, offset)?;
                    truncated = true;
                    break;
                }
            }
        }
    }

    Ok(ReplayResult {
        entries,
        next_seq: max_seq + 1,
        truncated,
    })
}

fn truncate_segment(path: &Path, good_offset: usize) -> std::io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_len(good_offset as u64)?;
    file.sync_all()?;
    Ok(())
}

/// One corruption finding from [`verify`]: which segment, what byte offset
/// it starts at, and why decoding stopped there.
#[derive(Debug, Clone)]
pub struct VerifyFinding {
    pub segment_number: u64,
    pub offset: usize,
    pub reason: String,
}

/// Outcome of a read-only scan of a shard's segments. Unlike [`replay`],
/// `verify` never writes to disk: a corrupt tail is reported, not healed.
#[derive(Debug, Clone, Default)]
pub struct VerifyResult {
    pub good_entries: usize,
    pub findings: Vec<VerifyFinding>,
}

impl VerifyResult {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Scan every segment in `shard_dir` and report, without mutating anything,
/// every point where decoding stopped early. Used by the `engine verify` CLI
/// command; `replay` is what actually runs at `Engine::open`.
pub fn verify(shard_dir: &Path) -> std::io::Result<VerifyResult> {
    let segments = list_segments(shard_dir)?;
    let mut result = VerifyResult::default();

    for (segment_number, path) in segments {
        let mut file = File::open(&path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut offset = 0usize;
        loop {
            if offset >= bytes.len() {
                break;
            }
            match codec::decode(&bytes[offset..]) {
                Ok((_, consumed)) => {
                    result.good_entries += 1;
                    offset += consumed;
                }
                Err(e) => {
                    result.findings.push(VerifyFinding {
                        segment_number,
                        offset,
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }
    }

    Ok(result)
}
