//! JSON-file ledger.
//!
//! Layout inside the tracking directory:
//!
//! ```text
//! send_log.jsonl          one SendRecord per line, append-only
//! sender_reputation.json  reputation checkpoint
//! contact_history.json    {email: contact} checkpoint
//! engagement_scores.json  {email: score} cache
//! ```
//!
//! Checkpoints are written to a temporary file in the same directory and
//! renamed over the target, so readers never observe a partial file. The
//! log is appended and flushed record by record.
//!
//! A single process is assumed to own the directory; concurrent writers from
//! several processes are not coordinated.

use crate::application::ports::{Ledger, SendLogScan};
use crate::domain::contact::ContactHistory;
use crate::domain::record::SendRecord;
use crate::domain::reputation::ReputationState;
use crate::error::LedgerError;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

const SEND_LOG: &str = "send_log.jsonl";
const REPUTATION: &str = "sender_reputation.json";
const CONTACTS: &str = "contact_history.json";
const ENGAGEMENT: &str = "engagement_scores.json";

/// Ledger persisted as JSON files in one directory.
#[derive(Debug)]
pub struct FileLedger {
    dir: PathBuf,
    // Serialises appends issued through shared references.
    append_lock: Mutex<()>,
}

impl FileLedger {
    /// Open (and create if needed) a tracking directory.
    ///
    /// # Errors
    /// Returns `LedgerError::Io` if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| LedgerError::io(&dir, e))?;
        Ok(Self {
            dir,
            append_lock: Mutex::new(()),
        })
    }

    /// The tracking directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the append-only send log.
    pub fn send_log_path(&self) -> PathBuf {
        self.dir.join(SEND_LOG)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, LedgerError> {
        let path = self.path(name);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LedgerError::io(path, e)),
        };
        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|e| LedgerError::serde(path, e))
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), LedgerError> {
        let path = self.path(name);
        let mut tmp =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| LedgerError::io(&self.dir, e))?;

        serde_json::to_writer_pretty(tmp.as_file_mut(), value)
            .map_err(|e| LedgerError::serde(&path, e))?;
        tmp.as_file_mut()
            .flush()
            .map_err(|e| LedgerError::io(tmp.path(), e))?;

        tmp.persist(&path)
            .map_err(|e| LedgerError::io(&path, e.error))?;
        Ok(())
    }
}

impl Ledger for FileLedger {
    fn append_send(&self, record: &SendRecord) -> Result<(), LedgerError> {
        let path = self.send_log_path();
        let mut line = serde_json::to_vec(record).map_err(|e| LedgerError::serde(&path, e))?;
        line.push(b'\n');

        let _guard = self
            .append_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LedgerError::io(&path, e))?;
        file.write_all(&line)
            .and_then(|()| file.flush())
            .map_err(|e| LedgerError::io(&path, e))
    }

    fn scan_sends(&self, cutoff: NaiveDateTime) -> Result<SendLogScan, LedgerError> {
        let path = self.send_log_path();
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SendLogScan::default()),
            Err(e) => return Err(LedgerError::io(path, e)),
        };

        let mut scan = SendLogScan::default();
        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut number = 0usize;
        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| LedgerError::io(&path, e))?;
            if read == 0 {
                break;
            }
            number += 1;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            // Bytes that are not UTF-8 fail here like any other bad JSON
            let record: SendRecord = match serde_json::from_slice(&line) {
                Ok(record) => record,
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        line = number,
                        %error,
                        "Skipping unreadable send log entry"
                    );
                    continue;
                }
            };

            if scan.last_send.map_or(true, |last| record.timestamp > last) {
                scan.last_send = Some(record.timestamp);
            }
            if record.timestamp > cutoff {
                scan.recent.push(record);
            }
        }
        Ok(scan)
    }

    fn load_reputation(&self) -> Result<Option<ReputationState>, LedgerError> {
        self.read_json(REPUTATION)
    }

    fn save_reputation(&self, state: &ReputationState) -> Result<(), LedgerError> {
        self.write_json(REPUTATION, state)
    }

    fn load_contacts(&self) -> Result<BTreeMap<String, ContactHistory>, LedgerError> {
        Ok(self.read_json(CONTACTS)?.unwrap_or_default())
    }

    fn save_contacts(
        &self,
        contacts: &BTreeMap<String, ContactHistory>,
    ) -> Result<(), LedgerError> {
        self.write_json(CONTACTS, contacts)
    }

    fn load_engagement(&self) -> Result<BTreeMap<String, u8>, LedgerError> {
        Ok(self.read_json(ENGAGEMENT)?.unwrap_or_default())
    }

    fn save_engagement(&self, scores: &BTreeMap<String, u8>) -> Result<(), LedgerError> {
        self.write_json(ENGAGEMENT, scores)
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
    fn test_open_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("tracking");
        let ledger = FileLedger::open(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(ledger.dir(), dir.as_path());
    }

    #[test]
    fn test_missing_files_are_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(tmp.path()).unwrap();

        assert_eq!(ledger.scan_sends(at(0)).unwrap(), SendLogScan::default());
        assert!(ledger.load_reputation().unwrap().is_none());
        assert!(ledger.load_contacts().unwrap().is_empty());
        assert!(ledger.load_engagement().unwrap().is_empty());
    }

    #[test]
    fn test_append_and_scan() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(tmp.path()).unwrap();

        ledger
            .append_send(&SendRecord::new(at(8), "a@x.com", "c1", true))
            .unwrap();
        ledger
            .append_send(&SendRecord::new(at(10), "b@y.com", "c1", false))
            .unwrap();
        ledger
            .append_send(&SendRecord::new(at(9), "c@x.com", "c1", true))
            .unwrap();

        let scan = ledger.scan_sends(at(8)).unwrap();
        assert_eq!(scan.recent.len(), 2);
        assert_eq!(scan.last_send, Some(at(10)));

        let raw = fs::read_to_string(ledger.send_log_path()).unwrap();
        assert_eq!(raw.lines().count(), 3);
        let first: serde_json::Value = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(first["domain"], "x.com");
        assert_eq!(first["timestamp"], "2024-03-05T08:00:00");
        assert_eq!(first["success"], true);
    }

    #[test]
    fn test_scan_skips_corrupt_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(tmp.path()).unwrap();
        ledger
            .append_send(&SendRecord::new(at(9), "a@x.com", "c1", true))
            .unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(ledger.send_log_path())
            .unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();
        file.write_all(b"\xff\xfe not utf-8\n").unwrap();
        drop(file);

        ledger
            .append_send(&SendRecord::new(at(11), "b@x.com", "c1", true))
            .unwrap();

        let scan = ledger.scan_sends(at(0)).unwrap();
        assert_eq!(scan.recent.len(), 2);
        assert_eq!(scan.last_send, Some(at(11)));
    }

    #[test]
    fn test_snapshot_roundtrip_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(tmp.path()).unwrap();

        let mut rep = ReputationState::new();
        rep.record_send(true, at(9));
        ledger.save_reputation(&rep).unwrap();
        ledger.save_reputation(&rep).unwrap();
        assert_eq!(ledger.load_reputation().unwrap(), Some(rep));

        let scores = BTreeMap::from([("a@x.com".to_string(), 70u8)]);
        ledger.save_engagement(&scores).unwrap();
        assert_eq!(ledger.load_engagement().unwrap(), scores);

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 2, "unexpected files: {names:?}");
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(tmp.path()).unwrap();
        fs::write(tmp.path().join(CONTACTS), b"[1, 2").unwrap();

        assert!(matches!(
            ledger.load_contacts(),
            Err(LedgerError::Serde { .. })
        ));
    }
}
