//! Wire encoding for WAL records.
//!
//! ```text
//! +-----------+-----------+---------+---------+----------+---------+-----------+
//! | magic u32 | len u32   | seq u64 | op u8   | ts u64   | klen u32| vlen u32  |
//! +-----------+-----------+---------+---------+----------+---------+-----------+
//! | key bytes (klen)  | value bytes (vlen)  | crc32 u32 over all prior bytes  |
//! +-------------------+---------------------+--------------------------------+
//! ```
//!
//! `len` excludes `magic` and `len` itself but includes the trailing `crc32`.
//! `encode` never fails. `decode` never panics on truncated or corrupt input;
//! it reports the failure so recovery can truncate the segment at the last
//! good offset.

use byteorder::{ByteOrder, LittleEndian};
use horizon_core::limits::ENTRY_MAGIC;
use thiserror::Error;

/// Fixed header size before the variable-length key/value payload:
/// seq(8) + op(1) + ts(8) + klen(4) + vlen(4).
const HEADER_AFTER_LEN: usize = 8 + 1 + 8 + 4 + 4;
/// magic(4) + len(4).
const PREFIX_LEN: usize = 8;
const CRC_LEN: usize = 4;

/// The operation a [`LogEntry`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Put = 1,
    Delete = 2,
}

impl Op {
    fn from_byte(b: u8) -> Option<Op> {
        match b {
            1 => Some(Op::Put),
            2 => Some(Op::Delete),
            _ => None,
        }
    }
}

/// A single persisted WAL record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub op: Op,
    pub key: Vec<u8>,
    /// Empty for `Delete`.
    pub value: Vec<u8>,
    pub timestamp_ns: u64,
}

/// Failure modes for [`decode`]. Recovery treats all three as "stop reading
/// this segment here", but distinguishes them for diagnostics (`verify`).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes are available than the header or declared length require.
    /// Expected on a crash mid-write; not logged as an anomaly on its own.
    #[error("truncated record: need at least {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// Magic matched but checksum, op byte, or length bookkeeping disagree.
    #[error("corrupt record: {reason}")]
    CorruptRecord { reason: String },

    /// Magic did not match the compiled format version. Distinguished from
    /// `CorruptRecord` because a byte-for-byte future format is not
    /// "corruption" — it is a version this build does not understand.
    #[error("unknown record version: magic = 0x{found:08x}")]
    UnknownVersion { found: u32 },
}

/// Encode a [`LogEntry`] to its wire representation. Never fails.
pub fn encode(entry: &LogEntry) -> Vec<u8> {
    let klen = entry.key.len() as u32;
    let vlen = entry.value.len() as u32;
    let body_len = HEADER_AFTER_LEN + entry.key.len() + entry.value.len() + CRC_LEN;

    let mut buf = Vec::with_capacity(PREFIX_LEN + body_len);
    let mut scratch = [0u8; 4];

    LittleEndian::write_u32(&mut scratch, ENTRY_MAGIC);
    buf.extend_from_slice(&scratch);
    LittleEndian::write_u32(&mut scratch, body_len as u32);
    buf.extend_from_slice(&scratch);

    let mut scratch8 = [0u8; 8];
    LittleEndian::write_u64(&mut scratch8, entry.seq);
    buf.extend_from_slice(&scratch8);

    buf.push(entry.op as u8);

    LittleEndian::write_u64(&mut scratch8, entry.timestamp_ns);
    buf.extend_from_slice(&scratch8);

    LittleEndian::write_u32(&mut scratch, klen);
    buf.extend_from_slice(&scratch);
    LittleEndian::write_u32(&mut scratch, vlen);
    buf.extend_from_slice(&scratch);

    buf.extend_from_slice(&entry.key);
    buf.extend_from_slice(&entry.value);

    let crc = crc32fast::hash(&buf);
    LittleEndian::write_u32(&mut scratch, crc);
    buf.extend_from_slice(&scratch);

    buf
}

/// Decode one record from the front of `bytes`.
///
/// Returns `Ok((entry, consumed))` on success, where `consumed` is the
/// number of bytes of `bytes` the record occupied (so callers can advance
/// past it and decode the next one).
pub fn decode(bytes: &[u8]) -> Result<(LogEntry, usize), DecodeError> {
    if bytes.len() < PREFIX_LEN {
        return Err(DecodeError::Truncated {
            needed: PREFIX_LEN,
            available: bytes.len(),
        });
    }

    let magic = LittleEndian::read_u32(&bytes[0..4]);
    if magic != ENTRY_MAGIC {
        return Err(DecodeError::UnknownVersion { found: magic });
    }

    let body_len = LittleEndian::read_u32(&bytes[4..8]) as usize;
    let total_len = PREFIX_LEN + body_len;

    if body_len < HEADER_AFTER_LEN + CRC_LEN {
        return Err(DecodeError::CorruptRecord {
            reason: format!("declared body length {body_len} too small for header+crc"),
        });
    }
    if bytes.len() < total_len {
        return Err(DecodeError::Truncated {
            needed: total_len,
            available: bytes.len(),
        });
    }

    let seq = LittleEndian::read_u64(&bytes[8..16]);
    let op_byte = bytes[16];
    let op = Op::from_byte(op_byte).ok_or_else(|| DecodeError::CorruptRecord {
        reason: format!("unknown op byte {op_byte}"),
    })?;
    let timestamp_ns = LittleEndian::read_u64(&bytes[17..25]);
    let klen = LittleEndian::read_u32(&bytes[25..29]) as usize;
    let vlen = LittleEndian::read_u32(&bytes[29..33]) as usize;

    let expected_body = HEADER_AFTER_LEN + klen + vlen + CRC_LEN;
    if expected_body != body_len {
        return Err(DecodeError::CorruptRecord {
            reason: format!(
                "klen/vlen imply body length {expected_body}, header declares {body_len}"
            ),
        });
    }

    let key_start = PREFIX_LEN + HEADER_AFTER_LEN;
    let key_end = key_start + klen;
    let value_end = key_end + vlen;
    let crc_start = value_end;
    let crc_end = crc_start + CRC_LEN;

    let key = bytes[key_start..key_end].to_vec();
    let value = bytes[key_end..value_end].to_vec();
    let expected_crc = LittleEndian::read_u32(&bytes[crc_start..crc_end]);
    let actual_crc = crc32fast::hash(&bytes[0..crc_start]);

    if actual_crc != expected_crc {
        return Err(DecodeError::CorruptRecord {
            reason: format!("checksum mismatch: expected {expected_crc:#x}, got {actual_crc:#x}"),
        });
    }

    Ok((
        LogEntry {
            seq,
            op,
            key,
            value,
            timestamp_ns,
        },
        total_len,
    ))
}
