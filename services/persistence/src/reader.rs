//! Journal Reader: Sequential reader with corruption detection
//!
//! Reads every journal file in index order, verifying each frame's CRC32C.
//!
//! A frame that cannot be parsed at the very end of the newest file is a
//! torn write from a crash: reading stops there and the tail is reported so
//! recovery can cut it off. Anything else that fails to parse or verify is
//! corruption and is an error.

use crate::journal::{file_index, JournalEntry};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Checksum mismatch at byte {offset} of {file}: entry seq={sequence}")]
    ChecksumMismatch {
        file: PathBuf,
        offset: u64,
        sequence: u64,
    },

    #[error("Corruption at byte {offset} of {file}: {detail}")]
    Corruption { file: PathBuf, offset: u64, detail: String },

    #[error("Sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },
}

/// Unreadable bytes at the end of the newest journal file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TornTail {
    pub file: PathBuf,
    /// Length of the valid prefix of `file`
    pub valid_len: u64,
    pub discarded: u64,
}

/// Sequential journal reader
pub struct JournalReader {
    files: Vec<PathBuf>,
    current_file_idx: usize,
    data: Vec<u8>,
    pos: usize,
    last_sequence: Option<u64>,
    torn_tail: Option<TornTail>,
}

impl JournalReader {
    /// Open a reader over all journal files in `dir`
    ///
    /// A missing directory reads as an empty journal.
    pub fn open(dir: &Path) -> Result<Self, ReaderError> {
        let files = discover_files(dir)?;
        let data = match files.first() {
            Some(path) => fs::read(path)?,
            None => Vec::new(),
        };
        Ok(Self {
            files,
            current_file_idx: 0,
            data,
            pos: 0,
            last_sequence: None,
            torn_tail: None,
        })
    }

    /// Next verified entry in sequence order, `None` at the end
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>, ReaderError> {
        loop {
            if self.pos >= self.data.len() {
                if !self.advance_file()? {
                    return Ok(None);
                }
                continue;
            }

            let offset = self.pos as u64;
            match JournalEntry::from_bytes(&self.data[self.pos..]) {
                Ok((entry, consumed)) => {
                    if !entry.verify_checksum() {
                        return Err(ReaderError::ChecksumMismatch {
                            file: self.current_file(),
                            offset,
                            sequence: entry.sequence,
                        });
                    }
                    if let Some(prev) = self.last_sequence {
                        if entry.sequence != prev + 1 {
                            return Err(ReaderError::SequenceGap {
                                expected: prev + 1,
                                got: entry.sequence,
                            });
                        }
                    }
                    self.pos += consumed;
                    self.last_sequence = Some(entry.sequence);
                    return Ok(Some(entry));
                }
                Err(e) if self.is_last_file() => {
                    let discarded = (self.data.len() - self.pos) as u64;
                    warn!(
                        file = %self.current_file().display(),
                        offset,
                        discarded,
                        error = %e,
                        "Torn journal tail ignored"
                    );
                    self.torn_tail = Some(TornTail {
                        file: self.current_file(),
                        valid_len: offset,
                        discarded,
                    });
                    self.pos = self.data.len();
                    return Ok(None);
                }
                Err(e) => {
                    return Err(ReaderError::Corruption {
                        file: self.current_file(),
                        offset,
                        detail: e.to_string(),
                    })
                }
            }
        }
    }

    /// Read every remaining entry
    pub fn read_all(&mut self) -> Result<Vec<JournalEntry>, ReaderError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    /// Set once the reader has hit a torn tail
    pub fn torn_tail(&self) -> Option<&TornTail> {
        self.torn_tail.as_ref()
    }

    fn current_file(&self) -> PathBuf {
        self.files.get(self.current_file_idx).cloned().unwrap_or_default()
    }

    fn is_last_file(&self) -> bool {
        self.current_file_idx + 1 >= self.files.len()
    }

    fn advance_file(&mut self) -> Result<bool, ReaderError> {
        if self.is_last_file() {
            return Ok(false);
        }
        self.current_file_idx += 1;
        self.data = fs::read(&self.files[self.current_file_idx])?;
        self.pos = 0;
        Ok(true)
    }
}

fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, ReaderError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<(u64, PathBuf)> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(index) = file_index(&entry.file_name().to_string_lossy()) {
            files.push((index, entry.path()));
        }
    }
    files.sort_by_key(|(index, _)| *index);
    Ok(files.into_iter().map(|(_, path)| path).collect())
}
