//! Send records and rolling-window accounting.
//!
//! A [`SendRecord`] is written once per send attempt and never modified. The
//! [`SendWindow`] keeps the trailing slice of those records in memory and
//! answers "how many sends in the last N hours" queries from it.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Horizon kept in memory for rate calculations.
pub const RETENTION_HOURS: i64 = 24;

/// One send attempt, as appended to the send log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendRecord {
    /// When the send happened (local wall-clock time)
    pub timestamp: NaiveDateTime,
    /// Recipient address as given by the caller
    pub recipient: String,
    /// Lower-cased part after `@`
    pub domain: String,
    /// Campaign the send belonged to
    pub campaign_id: String,
    /// Whether the transport accepted the message
    pub success: bool,
}

impl SendRecord {
    /// Create a record, deriving the domain from the recipient.
    pub fn new(
        timestamp: NaiveDateTime,
        recipient: impl Into<String>,
        campaign_id: impl Into<String>,
        success: bool,
    ) -> Self {
        let recipient = recipient.into();
        let domain = domain_of(&recipient);
        Self {
            timestamp,
            recipient,
            domain,
            campaign_id: campaign_id.into(),
            success,
        }
    }
}

/// Extract the lower-cased domain of an address.
///
/// Addresses without `@` are treated as a bare domain, so the whole
/// (trimmed, lower-cased) input is returned.
///
/// ```
/// use outreach_throttle::domain::record::domain_of;
///
/// assert_eq!(domain_of("Alice@Example.COM"), "example.com");
/// assert_eq!(domain_of("odd@name@Host.org"), "host.org");
/// ```
pub fn domain_of(email: &str) -> String {
    email
        .rsplit('@')
        .next()
        .unwrap_or(email)
        .trim()
        .to_lowercase()
}

/// In-memory working set of recent sends.
///
/// Records are kept in arrival order. Everything older than
/// [`RETENTION_HOURS`] is dropped by [`SendWindow::expire_before`]; the
/// on-disk log keeps the full history.
#[derive(Debug, Clone, Default)]
pub struct SendWindow {
    records: VecDeque<SendRecord>,
}

impl SendWindow {
    /// Create an empty window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a window from previously logged records.
    pub fn from_records(mut records: Vec<SendRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        Self {
            records: records.into(),
        }
    }

    /// Append a freshly logged record.
    pub fn push(&mut self, record: SendRecord) {
        self.records.push_back(record);
    }

    /// Drop records at or before `cutoff`.
    pub fn expire_before(&mut self, cutoff: NaiveDateTime) {
        while let Some(oldest) = self.records.front() {
            if oldest.timestamp <= cutoff {
                self.records.pop_front();
            } else {
                break;
            }
        }
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are held.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the held records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SendRecord> {
        self.records.iter()
    }

    /// Count sends strictly newer than `now - period`.
    pub fn count_within(&self, now: NaiveDateTime, period: Duration) -> usize {
        let cutoff = now - period;
        self.records.iter().filter(|r| r.timestamp > cutoff).count()
    }

    /// Count sends to `domain` strictly newer than `now - period`.
    pub fn count_domain_within(&self, domain: &str, now: NaiveDateTime, period: Duration) -> usize {
        let cutoff = now - period;
        self.records
            .iter()
            .filter(|r| r.domain == domain && r.timestamp > cutoff)
            .count()
    }

    /// Oldest send inside the window, optionally restricted to one domain.
    pub fn oldest_within(
        &self,
        domain: Option<&str>,
        now: NaiveDateTime,
        period: Duration,
    ) -> Option<NaiveDateTime> {
        let cutoff = now - period;
        self.records
            .iter()
            .filter(|r| r.timestamp > cutoff)
            .filter(|r| domain.map_or(true, |d| r.domain == d))
            .map(|r| r.timestamp)
            .min()
    }

    /// Seconds until the oldest send in the window rolls out of it.
    ///
    /// Never returns less than one second while a record is inside the
    /// window, so a denial always carries an actionable hint.
    pub fn seconds_until_rollout(
        &self,
        domain: Option<&str>,
        now: NaiveDateTime,
        period: Duration,
    ) -> Option<u64> {
        self.oldest_within(domain, now, period)
            .map(|oldest| ceil_seconds(oldest + period - now).max(1))
    }
}

/// Whole seconds in `span`, rounded up; zero for negative spans.
pub fn ceil_seconds(span: Duration) -> u64 {
    let mut secs = span.num_seconds();
    if span > Duration::seconds(secs) {
        secs += 1;
    }
    u64::try_from(secs).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("bob@Example.org"), "example.org");
        assert_eq!(domain_of("no-at-sign"), "no-at-sign");
        assert_eq!(domain_of("x@ y.com "), "y.com");
    }

    #[test]
    fn test_record_derives_domain() {
        let rec = SendRecord::new(at(9, 0), "Carol@Mail.Example", "c1", true);
        assert_eq!(rec.domain, "mail.example");
        assert_eq!(rec.recipient, "Carol@Mail.Example");
    }

    #[test]
    fn test_counts_respect_period() {
        let mut window = SendWindow::new();
        window.push(SendRecord::new(at(8, 0), "a@x.com", "c", true));
        window.push(SendRecord::new(at(9, 30), "b@y.com", "c", true));
        window.push(SendRecord::new(at(9, 45), "c@x.com", "c", false));

        let now = at(10, 0);
        assert_eq!(window.count_within(now, Duration::hours(1)), 2);
        assert_eq!(window.count_within(now, Duration::hours(24)), 3);
        assert_eq!(window.count_domain_within("x.com", now, Duration::hours(1)), 1);
        assert_eq!(window.count_domain_within("x.com", now, Duration::hours(24)), 2);
    }

    #[test]
    fn test_boundary_is_exclusive() {
        let mut window = SendWindow::new();
        window.push(SendRecord::new(at(9, 0), "a@x.com", "c", true));

        // Exactly one hour old: already outside the hourly window
        assert_eq!(window.count_within(at(10, 0), Duration::hours(1)), 0);
    }

    #[test]
    fn test_ceil_seconds() {
        assert_eq!(ceil_seconds(Duration::milliseconds(19_500)), 20);
        assert_eq!(ceil_seconds(Duration::seconds(20)), 20);
        assert_eq!(ceil_seconds(Duration::milliseconds(1)), 1);
        assert_eq!(ceil_seconds(Duration::zero()), 0);
        assert_eq!(ceil_seconds(Duration::seconds(-5)), 0);
    }

    #[test]
    fn test_rollout_rounds_up_fractional_seconds() {
        let mut window = SendWindow::new();
        window.push(SendRecord::new(at(9, 30), "a@x.com", "c", true));

        let now = at(10, 0) + Duration::milliseconds(250);
        assert_eq!(
            window.seconds_until_rollout(None, now, Duration::hours(1)),
            Some(30 * 60)
        );
    }

    #[test]
    fn test_seconds_until_rollout() {
        let mut window = SendWindow::new();
        window.push(SendRecord::new(at(9, 30), "a@x.com", "c", true));
        window.push(SendRecord::new(at(9, 40), "b@y.com", "c", true));

        let now = at(10, 0);
        assert_eq!(
            window.seconds_until_rollout(None, now, Duration::hours(1)),
            Some(30 * 60)
        );
        assert_eq!(
            window.seconds_until_rollout(Some("y.com"), now, Duration::hours(1)),
            Some(40 * 60)
        );
        assert_eq!(
            window.seconds_until_rollout(Some("z.com"), now, Duration::hours(1)),
            None
        );
    }

    #[test]
    fn test_expire_before() {
        let mut window = SendWindow::from_records(vec![
            SendRecord::new(at(9, 0), "b@x.com", "c", true),
            SendRecord::new(at(7, 0), "a@x.com", "c", true),
        ]);
        assert_eq!(window.iter().next().map(|r| r.timestamp), Some(at(7, 0)));

        window.expire_before(at(7, 0));
        assert_eq!(window.len(), 1);

        window.expire_before(at(12, 0));
        assert!(window.is_empty());
    }
}
