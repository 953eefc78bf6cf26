//! In-memory ledger.
//!
//! Keeps everything in process memory. Useful for dry runs that must not
//! touch the tracking directory, and for tests. Cloning shares the state.

use crate::application::ports::{Ledger, SendLogScan};
use crate::domain::contact::ContactHistory;
use crate::domain::record::SendRecord;
use crate::domain::reputation::ReputationState;
use crate::error::LedgerError;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Contents {
    sends: Vec<SendRecord>,
    reputation: Option<ReputationState>,
    contacts: BTreeMap<String, ContactHistory>,
    engagement: BTreeMap<String, u8>,
}

/// Ledger held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    contents: Arc<Mutex<Contents>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the send log with existing records.
    pub fn with_sends(self, sends: impl IntoIterator<Item = SendRecord>) -> Self {
        self.lock().sends.extend(sends);
        self
    }

    /// Make every subsequent write fail (or succeed again).
    ///
    /// Simulates a full or read-only disk.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Every record appended so far, in order.
    pub fn sends(&self) -> Vec<SendRecord> {
        self.lock().sends.clone()
    }

    /// Last persisted contact histories.
    pub fn contacts(&self) -> BTreeMap<String, ContactHistory> {
        self.lock().contacts.clone()
    }

    /// Last persisted engagement scores.
    pub fn engagement(&self) -> BTreeMap<String, u8> {
        self.lock().engagement.clone()
    }

    /// Last persisted reputation.
    pub fn reputation(&self) -> Option<ReputationState> {
        self.lock().reputation.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Contents> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self, what: &str) -> Result<(), LedgerError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(LedgerError::io(
                PathBuf::from(format!("memory://{what}")),
                io::Error::other("writes disabled"),
            ));
        }
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    fn append_send(&self, record: &SendRecord) -> Result<(), LedgerError> {
        self.check_writable("send_log")?;
        self.lock().sends.push(record.clone());
        Ok(())
    }

    fn scan_sends(&self, cutoff: NaiveDateTime) -> Result<SendLogScan, LedgerError> {
        let contents = self.lock();
        Ok(SendLogScan {
            recent: contents
                .sends
                .iter()
                .filter(|r| r.timestamp > cutoff)
                .cloned()
                .collect(),
            last_send: contents.sends.iter().map(|r| r.timestamp).max(),
        })
    }

    fn load_reputation(&self) -> Result<Option<ReputationState>, LedgerError> {
        Ok(self.lock().reputation.clone())
    }

    fn save_reputation(&self, state: &ReputationState) -> Result<(), LedgerError> {
        self.check_writable("reputation")?;
        self.lock().reputation = Some(state.clone());
        Ok(())
    }

    fn load_contacts(&self) -> Result<BTreeMap<String, ContactHistory>, LedgerError> {
        Ok(self.lock().contacts.clone())
    }

    fn save_contacts(
        &self,
        contacts: &BTreeMap<String, ContactHistory>,
    ) -> Result<(), LedgerError> {
        self.check_writable("contact_history")?;
        self.lock().contacts = contacts.clone();
        Ok(())
    }

    fn load_engagement(&self) -> Result<BTreeMap<String, u8>, LedgerError> {
        Ok(self.lock().engagement.clone())
    }

    fn save_engagement(&self, scores: &BTreeMap<String, u8>) -> Result<(), LedgerError> {
        self.check_writable("engagement_scores")?;
        self.lock().engagement = scores.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_clones_share_state() {
        let ledger = MemoryLedger::new();
        let clone = ledger.clone();
        clone
            .append_send(&SendRecord::new(at(9), "a@x.com", "c", true))
            .unwrap();
        assert_eq!(ledger.sends().len(), 1);
    }

    #[test]
    fn test_scan_filters_by_cutoff() {
        let ledger = MemoryLedger::new().with_sends([
            SendRecord::new(at(6), "a@x.com", "c", true),
            SendRecord::new(at(9), "b@x.com", "c", true),
        ]);
        let scan = ledger.scan_sends(at(7)).unwrap();
        assert_eq!(scan.recent.len(), 1);
        assert_eq!(scan.last_send, Some(at(9)));
    }

    #[test]
    fn test_failing_writes() {
        let ledger = MemoryLedger::new();
        ledger.set_fail_writes(true);
        let err = ledger
            .append_send(&SendRecord::new(at(9), "a@x.com", "c", true))
            .unwrap_err();
        assert!(err.to_string().contains("send_log"));
        assert!(ledger.sends().is_empty());

        ledger.set_fail_writes(false);
        assert!(ledger.save_engagement(&BTreeMap::new()).is_ok());
    }
}
