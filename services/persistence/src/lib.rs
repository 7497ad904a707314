//! Persistence Service
//!
//! Durable ledger for the marketplace: an append-only journal of ledger
//! records, a checksum-verifying reader, crash recovery by replay, and the
//! journaled [`LedgerStore`](matching_engine::store::LedgerStore) adapter.
//!
//! # Guarantees
//! - Every acknowledged ledger write is in the journal first
//! - Each frame carries a CRC32C; damage is detected, never replayed
//! - Sequences are gapless from 1; a torn tail from a crash is cut off
//! - Replay applies records with the same validation as live writes

pub mod journal;
pub mod ledger;
pub mod reader;
pub mod recovery;

pub use journal::{FsyncPolicy, JournalConfig};
pub use ledger::JournaledLedger;
pub use recovery::{recover, Recovered, RecoveryError};
