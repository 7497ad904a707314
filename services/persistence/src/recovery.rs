//! Recovery Flow: Rebuild the ledger by journal replay
//!
//! Recovery process:
//! 1. Open the journal reader over every journal file
//! 2. Decode each entry and check its kind against the record
//! 3. Apply it to an empty [`LedgerState`] with the same validation the
//!    live ledger uses
//! 4. Cut off a torn tail so new appends start at a frame boundary
//!
//! A record the state refuses means the journal and the rules disagree;
//! recovery aborts rather than start from a ledger that differs from the
//! one that was acknowledged.

use crate::journal::JournalError;
use crate::reader::{JournalReader, ReaderError, TornTail};
use matching_engine::errors::StoreError;
use matching_engine::store::LedgerState;
use std::fs::OpenOptions;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Undecodable record at sequence {sequence}: {source}")]
    Decode { sequence: u64, source: JournalError },

    #[error("Entry {sequence} is labelled {labelled} but holds {actual}")]
    KindMismatch {
        sequence: u64,
        labelled: String,
        actual: &'static str,
    },

    #[error("Journal does not start at sequence 1 (first is {first})")]
    MissingPrefix { first: u64 },

    #[error("Record at sequence {sequence} rejected on replay: {source}")]
    Apply { sequence: u64, source: StoreError },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a recovery
#[derive(Debug, Clone)]
pub struct Recovered {
    pub state: LedgerState,
    /// Sequence of the last replayed entry, 0 for an empty journal
    pub last_sequence: u64,
    pub replayed: u64,
    pub torn_tail: Option<TornTail>,
    pub elapsed_ms: u64,
}

/// Replay the journal in `dir` into a fresh ledger state
pub fn recover(dir: &Path) -> Result<Recovered, RecoveryError> {
    let started = Instant::now();
    let mut reader = JournalReader::open(dir)?;
    let mut state = LedgerState::new();
    let mut last_sequence = 0;
    let mut replayed = 0;

    while let Some(entry) = reader.next_entry()? {
        if replayed == 0 && entry.sequence != 1 {
            return Err(RecoveryError::MissingPrefix { first: entry.sequence });
        }
        let record = entry.decode_record().map_err(|source| RecoveryError::Decode {
            sequence: entry.sequence,
            source,
        })?;
        if record.kind() != entry.kind {
            return Err(RecoveryError::KindMismatch {
                sequence: entry.sequence,
                labelled: entry.kind,
                actual: record.kind(),
            });
        }
        state.apply(record).map_err(|source| RecoveryError::Apply {
            sequence: entry.sequence,
            source,
        })?;
        last_sequence = entry.sequence;
        replayed += 1;
    }

    let torn_tail = reader.torn_tail().cloned();
    if let Some(tail) = &torn_tail {
        truncate(tail)?;
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        replayed,
        last_sequence,
        orders = state.order_count(),
        pending = state.pending_orders().len(),
        elapsed_ms,
        "Ledger recovered"
    );
    Ok(Recovered {
        state,
        last_sequence,
        replayed,
        torn_tail,
        elapsed_ms,
    })
}

fn truncate(tail: &TornTail) -> Result<(), RecoveryError> {
    warn!(
        file = %tail.file.display(),
        valid_len = tail.valid_len,
        discarded = tail.discarded,
        "Truncating torn journal tail"
    );
    let file = OpenOptions::new().write(true).open(&tail.file)?;
    file.set_len(tail.valid_len)?;
    file.sync_all()?;
    Ok(())
}
