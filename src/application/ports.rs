//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::contact::ContactHistory;
use crate::domain::record::SendRecord;
use crate::domain::reputation::ReputationState;
use crate::error::LedgerError;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::time::Duration;

/// Port for obtaining the current local time.
///
/// This abstraction allows the application layer to work with time
/// without depending on system clock implementation details.
/// Infrastructure provides concrete implementations (SystemClock, ManualClock).
pub trait Clock: Send + Sync + Debug {
    /// Current local wall-clock time.
    fn now(&self) -> NaiveDateTime;

    /// Block the calling thread for `duration`.
    ///
    /// This is the only suspension point in the crate. Test clocks override
    /// it to advance virtual time instead of sleeping.
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Result of scanning the send log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendLogScan {
    /// Records newer than the requested cutoff, in log order
    pub recent: Vec<SendRecord>,
    /// Latest timestamp anywhere in the log
    pub last_send: Option<NaiveDateTime>,
}

/// Port for persisted admission-control state.
///
/// The send log behaves like a write-ahead log of [`SendRecord`]s: it is
/// append-only and is the source of truth for rolling-window counts. The
/// reputation, contact and engagement snapshots are checkpoints rewritten
/// in full on every change.
///
/// Infrastructure provides concrete implementations (FileLedger, MemoryLedger).
pub trait Ledger: Send + Sync + Debug {
    /// Append one record to the send log and flush it.
    fn append_send(&self, record: &SendRecord) -> Result<(), LedgerError>;

    /// Read the send log, keeping records strictly newer than `cutoff`.
    fn scan_sends(&self, cutoff: NaiveDateTime) -> Result<SendLogScan, LedgerError>;

    /// Load the reputation checkpoint, if one exists.
    fn load_reputation(&self) -> Result<Option<ReputationState>, LedgerError>;

    /// Replace the reputation checkpoint.
    fn save_reputation(&self, state: &ReputationState) -> Result<(), LedgerError>;

    /// Load all contact histories keyed by normalised email.
    fn load_contacts(&self) -> Result<BTreeMap<String, ContactHistory>, LedgerError>;

    /// Replace the contact-history checkpoint.
    fn save_contacts(&self, contacts: &BTreeMap<String, ContactHistory>)
        -> Result<(), LedgerError>;

    /// Load the cached engagement scores.
    fn load_engagement(&self) -> Result<BTreeMap<String, u8>, LedgerError>;

    /// Replace the cached engagement scores.
    fn save_engagement(&self, scores: &BTreeMap<String, u8>) -> Result<(), LedgerError>;
}
