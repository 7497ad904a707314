//! Journal Writer: Append-only ledger journal with checksums
//!
//! Every ledger mutation is written here as one framed entry before it is
//! applied in memory, so replaying the journal rebuilds the ledger exactly.
//!
//! # Binary Format (per entry)
//! ```text
//! [body_len: u32]
//! [sequence: u64]
//! [timestamp: i64]
//! [kind_len: u16][kind: bytes]
//! [payload_len: u32][payload: bytes]   // bincode LedgerRecord
//! [checksum: u32]  // CRC32C over sequence+timestamp+kind+payload
//! ```
//! All integers are little-endian.

use crc32c::crc32c;
use matching_engine::store::LedgerRecord;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

/// Largest body a frame may declare; anything bigger is treated as corruption
pub const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// Smallest possible body: seq + ts + kind_len + payload_len + crc
const MIN_BODY_LEN: usize = 8 + 8 + 2 + 4 + 4;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Malformed frame: {0}")]
    Frame(String),

    #[error("Sequence error: expected {expected}, got {got}")]
    SequenceError { expected: u64, got: u64 },

    #[error("Entry of {len} bytes exceeds the frame limit")]
    TooLarge { len: usize },

    #[error("Journal refuses writes after an earlier failure: {0}")]
    Poisoned(String),
}

// ── Journal Entry ───────────────────────────────────────────────────

/// One persisted ledger record
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    /// Gapless sequence starting at 1
    pub sequence: u64,
    /// Unix nanoseconds at which the record was written
    pub timestamp: i64,
    /// Record kind, e.g. `settlement_committed`
    pub kind: String,
    /// Bincode-serialized [`LedgerRecord`]
    pub payload: Vec<u8>,
    pub checksum: u32,
}

impl JournalEntry {
    pub fn new(sequence: u64, timestamp: i64, kind: String, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(sequence, timestamp, &kind, &payload);
        Self {
            sequence,
            timestamp,
            kind,
            payload,
            checksum,
        }
    }

    /// Frame a ledger record
    pub fn record(sequence: u64, timestamp: i64, record: &LedgerRecord) -> Result<Self, JournalError> {
        let payload = bincode::serialize(record).map_err(|e| JournalError::Encode(e.to_string()))?;
        if payload.len() > MAX_BODY_LEN - MIN_BODY_LEN - record.kind().len() {
            return Err(JournalError::TooLarge { len: payload.len() });
        }
        Ok(Self::new(sequence, timestamp, record.kind().to_string(), payload))
    }

    /// Decode the payload back into a ledger record
    pub fn decode_record(&self) -> Result<LedgerRecord, JournalError> {
        bincode::deserialize(&self.payload).map_err(|e| JournalError::Frame(e.to_string()))
    }

    pub fn compute_checksum(sequence: u64, timestamp: i64, kind: &str, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(16 + kind.len() + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(kind.as_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.sequence, self.timestamp, &self.kind, &self.payload)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let kind = self.kind.as_bytes();
        let body_len = MIN_BODY_LEN + kind.len() + self.payload.len();

        let mut buf = Vec::with_capacity(4 + body_len);
        buf.extend_from_slice(&(body_len as u32).to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&(kind.len() as u16).to_le_bytes());
        buf.extend_from_slice(kind);
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Parse one frame from the front of `data`
    ///
    /// Returns `(entry, bytes_consumed)`. The checksum is not verified here.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), JournalError> {
        let mut cursor = Cursor::new(data);
        let body_len = cursor.u32()? as usize;
        if !(MIN_BODY_LEN..=MAX_BODY_LEN).contains(&body_len) {
            return Err(JournalError::Frame(format!("implausible body length {body_len}")));
        }
        if data.len() < 4 + body_len {
            return Err(JournalError::Frame(format!(
                "incomplete entry: need {} bytes, have {}",
                4 + body_len,
                data.len()
            )));
        }

        let mut body = Cursor::new(&data[4..4 + body_len]);
        let sequence = body.u64()?;
        let timestamp = body.i64()?;
        let kind_len = body.u16()? as usize;
        let kind = String::from_utf8(body.take(kind_len)?.to_vec())
            .map_err(|e| JournalError::Frame(e.to_string()))?;
        let payload_len = body.u32()? as usize;
        let payload = body.take(payload_len)?.to_vec();
        let checksum = body.u32()?;
        if body.remaining() != 0 {
            return Err(JournalError::Frame(format!("{} trailing bytes in frame", body.remaining())));
        }

        Ok((
            Self {
                sequence,
                timestamp,
                kind,
                payload,
                checksum,
            },
            4 + body_len,
        ))
    }
}

/// Bounds-checked little-endian reads
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], JournalError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| JournalError::Frame(format!("field of {len} bytes overruns frame at {}", self.pos)))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], JournalError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, JournalError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, JournalError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, JournalError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, JournalError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

// ── Fsync Policy ────────────────────────────────────────────────────

/// When written entries are forced to stable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsyncPolicy {
    /// Fsync after every entry; a committed write survives power loss.
    EveryWrite,
    /// Fsync every N entries.
    EveryN(usize),
    /// Fsync only on rotation and explicit [`JournalWriter::sync`].
    OnRotation,
}

// ── Journal Writer Configuration ────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub dir: PathBuf,
    /// File size in bytes after which a new file is started (default 64 MiB)
    pub max_file_size: u64,
    pub fsync_policy: FsyncPolicy,
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: 64 * 1024 * 1024,
            fsync_policy: FsyncPolicy::EveryWrite,
        }
    }
}

// ── Journal Writer ──────────────────────────────────────────────────

/// Append-only writer with checksums, rotation and fsync control
///
/// Every append is flushed to the OS; durability beyond that follows the
/// configured [`FsyncPolicy`]. An I/O failure while appending may leave the
/// entry in the file, so the writer is poisoned and every later append is
/// refused: the file never holds anything past a failed write.
pub struct JournalWriter {
    config: JournalConfig,
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_file_size: u64,
    next_sequence: u64,
    writes_since_fsync: usize,
    file_index: u64,
    poisoned: Option<String>,
}

impl JournalWriter {
    /// Open the newest journal file for appending, creating the directory
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;

        let file_index = latest_index(&config.dir)?.unwrap_or(0);
        let current_file = journal_path(&config.dir, file_index);
        let file = OpenOptions::new().create(true).append(true).open(&current_file)?;
        let current_file_size = file.metadata()?.len();

        debug!(file = %current_file.display(), size = current_file_size, "Journal opened");
        Ok(Self {
            config,
            writer: BufWriter::new(file),
            current_file,
            current_file_size,
            next_sequence: 1,
            writes_since_fsync: 0,
            file_index,
            poisoned: None,
        })
    }

    /// Continue the sequence after recovery
    pub fn set_next_sequence(&mut self, seq: u64) {
        self.next_sequence = seq;
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn current_file_path(&self) -> &Path {
        &self.current_file
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Append an entry; its sequence must be the next one
    pub fn append(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        if let Some(cause) = &self.poisoned {
            return Err(JournalError::Poisoned(cause.clone()));
        }
        if entry.sequence != self.next_sequence {
            return Err(JournalError::SequenceError {
                expected: self.next_sequence,
                got: entry.sequence,
            });
        }

        if let Err(e) = self.write_entry(entry) {
            error!(sequence = entry.sequence, error = %e, "Journal append failed, refusing further writes");
            self.poisoned = Some(e.to_string());
            return Err(e);
        }
        Ok(())
    }

    fn write_entry(&mut self, entry: &JournalEntry) -> Result<(), JournalError> {
        if self.current_file_size >= self.config.max_file_size {
            self.rotate()?;
        }

        let bytes = entry.to_bytes();
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;

        self.current_file_size += bytes.len() as u64;
        self.next_sequence = entry.sequence + 1;
        self.writes_since_fsync += 1;

        let should_fsync = match self.config.fsync_policy {
            FsyncPolicy::EveryWrite => true,
            FsyncPolicy::EveryN(n) => self.writes_since_fsync >= n,
            FsyncPolicy::OnRotation => false,
        };
        if should_fsync {
            self.writer.get_ref().sync_data()?;
            self.writes_since_fsync = 0;
        }
        Ok(())
    }

    /// Frame `record` with the next sequence and append it
    pub fn append_record(&mut self, timestamp: i64, record: &LedgerRecord) -> Result<JournalEntry, JournalError> {
        let entry = JournalEntry::record(self.next_sequence, timestamp, record)?;
        self.append(&entry)?;
        Ok(entry)
    }

    /// Force flush + fsync
    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.writes_since_fsync = 0;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        self.sync()?;
        self.file_index += 1;
        self.current_file = journal_path(&self.config.dir, self.file_index);
        let file = OpenOptions::new().create(true).append(true).open(&self.current_file)?;
        self.writer = BufWriter::new(file);
        self.current_file_size = 0;
        info!(file = %self.current_file.display(), "Journal rotated");
        Ok(())
    }
}

pub(crate) fn journal_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("journal-{index:06}.bin"))
}

/// Index encoded in a journal file name
pub(crate) fn file_index(name: &str) -> Option<u64> {
    name.strip_prefix("journal-")?.strip_suffix(".bin")?.parse().ok()
}

fn latest_index(dir: &Path) -> Result<Option<u64>, JournalError> {
    let mut latest = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(index) = file_index(&entry.file_name().to_string_lossy()) {
            latest = latest.max(Some(index));
        }
    }
    Ok(latest)
}

// ── Tests ───────────────────────────────────────────────────────────
