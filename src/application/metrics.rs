//! Observability metrics for admission control.
//!
//! Counts the decisions taken by the rate limiter and the targeting
//! optimizer. One [`Metrics`] instance can be shared by both.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Decision counters.
///
/// All counters use atomic operations for thread-safe updates and reads.
/// Cloning shares the counters.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    admissions_allowed: AtomicU64,
    admissions_denied: AtomicU64,
    contacts_approved: AtomicU64,
    contacts_suppressed: AtomicU64,
    persist_failures: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_admission(&self, allowed: bool) {
        let counter = if allowed {
            &self.inner.admissions_allowed
        } else {
            &self.inner.admissions_denied
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_targeting(&self, approved: bool) {
        let counter = if approved {
            &self.inner.contacts_approved
        } else {
            &self.inner.contacts_suppressed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_persist_failure(&self) {
        self.inner.persist_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// `can_send_now` calls that allowed a send.
    pub fn admissions_allowed(&self) -> u64 {
        self.inner.admissions_allowed.load(Ordering::Relaxed)
    }

    /// `can_send_now` calls that denied a send.
    pub fn admissions_denied(&self) -> u64 {
        self.inner.admissions_denied.load(Ordering::Relaxed)
    }

    /// `should_contact` calls that approved a contact.
    pub fn contacts_approved(&self) -> u64 {
        self.inner.contacts_approved.load(Ordering::Relaxed)
    }

    /// `should_contact` calls that suppressed a contact.
    pub fn contacts_suppressed(&self) -> u64 {
        self.inner.contacts_suppressed.load(Ordering::Relaxed)
    }

    /// Mutations whose persistence failed.
    pub fn persist_failures(&self) -> u64 {
        self.inner.persist_failures.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            admissions_allowed: self.admissions_allowed(),
            admissions_denied: self.admissions_denied(),
            contacts_approved: self.contacts_approved(),
            contacts_suppressed: self.contacts_suppressed(),
            persist_failures: self.persist_failures(),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.inner.admissions_allowed.store(0, Ordering::Relaxed);
        self.inner.admissions_denied.store(0, Ordering::Relaxed);
        self.inner.contacts_approved.store(0, Ordering::Relaxed);
        self.inner.contacts_suppressed.store(0, Ordering::Relaxed);
        self.inner.persist_failures.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Sends admitted
    pub admissions_allowed: u64,
    /// Sends denied
    pub admissions_denied: u64,
    /// Contacts approved for a campaign
    pub contacts_approved: u64,
    /// Contacts suppressed
    pub contacts_suppressed: u64,
    /// Failed writes to the ledger
    pub persist_failures: u64,
}

impl MetricsSnapshot {
    /// Ratio of denied admissions to all admissions (0.0 to 1.0).
    ///
    /// Returns 0.0 if no admission was checked.
    pub fn denial_rate(&self) -> f64 {
        ratio(self.admissions_denied, self.total_admissions())
    }

    /// Ratio of suppressed contacts to all targeting checks (0.0 to 1.0).
    pub fn suppression_rate(&self) -> f64 {
        ratio(
            self.contacts_suppressed,
            self.contacts_approved.saturating_add(self.contacts_suppressed),
        )
    }

    /// Admissions checked (allowed + denied).
    pub fn total_admissions(&self) -> u64 {
        self.admissions_allowed.saturating_add(self.admissions_denied)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}
