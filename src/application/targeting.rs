//! Contact targeting and suppression.
//!
//! Long-horizon frequency capping per contact, independent of the
//! short-horizon rate limits. A contact is suppressed permanently once it
//! bounced, opted out or complained; otherwise it is held back by the
//! per-campaign dedup, the lifetime cap, the minimum gap between approaches
//! and a floor on engagement.

use crate::application::config::TargetingConfig;
use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, Ledger};
use crate::application::stats::{percent, ContactReport, TargetingSummary};
use crate::domain::contact::{
    normalize_email, ContactHistory, ContactStatus, ResponseType, Suppressions,
    NEUTRAL_ENGAGEMENT,
};
use crate::domain::decision::TargetingDecision;
use crate::error::{ConfigError, LedgerError};
use crate::infrastructure::clock::SystemClock;
use chrono::NaiveDateTime;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// A candidate that can be targeted.
///
/// Implemented for plain strings; implement it for richer contact records
/// to keep their data attached through [`TargetingOptimizer::filter_contacts`].
pub trait Addressable {
    /// The candidate's email address (may be blank).
    fn email(&self) -> &str;
}

impl Addressable for str {
    fn email(&self) -> &str {
        self
    }
}

impl Addressable for String {
    fn email(&self) -> &str {
        self
    }
}

impl<T: Addressable + ?Sized> Addressable for &T {
    fn email(&self) -> &str {
        (**self).email()
    }
}

/// A candidate selected for a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Targeted<C> {
    /// The candidate as passed in
    pub contact: C,
    /// Engagement score at selection time
    pub engagement_score: u8,
}

/// A candidate left out of a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped<C> {
    /// The candidate as passed in
    pub contact: C,
    /// Why it was left out
    pub reason: String,
}

/// Counts over a [`FilterResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterStats {
    /// Candidates considered
    pub total: usize,
    /// Candidates selected
    pub targeted: usize,
    /// Candidates left out
    pub skipped: usize,
    /// Share of candidates selected
    pub targeting_rate_percent: f64,
}

/// Candidates partitioned by [`TargetingOptimizer::filter_contacts`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterResult<C> {
    /// Selected candidates, in input order
    pub targeted: Vec<Targeted<C>>,
    /// Rejected candidates with their reason, in input order
    pub skipped: Vec<Skipped<C>>,
}

impl<C> FilterResult<C> {
    /// Summary counts and targeting rate.
    pub fn stats(&self) -> FilterStats {
        let total = self.targeted.len() + self.skipped.len();
        FilterStats {
            total,
            targeted: self.targeted.len(),
            skipped: self.skipped.len(),
            targeting_rate_percent: percent(self.targeted.len() as u64, total as u64),
        }
    }
}

/// Per-contact compliance and fatigue control.
///
/// Contact histories are keyed by normalised (trimmed, lower-cased) email,
/// created lazily and never removed. Every mutation rewrites the contact
/// checkpoint while holding the write lock.
///
/// # Example
///
/// ```
/// use outreach_throttle::{MemoryLedger, ResponseType, TargetingOptimizer};
/// use std::sync::Arc;
///
/// let optimizer = TargetingOptimizer::builder(Arc::new(MemoryLedger::new()))
///     .build()
///     .unwrap();
///
/// assert!(optimizer.should_contact("a@x.com", "spring").contact);
/// optimizer.record_contact("a@x.com", "spring").unwrap();
/// optimizer.record_response("a@x.com", ResponseType::OptedOut).unwrap();
///
/// let decision = optimizer.should_contact("A@x.com", "summer");
/// assert_eq!(decision.reason, "Previously opted out");
/// ```
#[derive(Debug)]
pub struct TargetingOptimizer {
    config: TargetingConfig,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    contacts: RwLock<BTreeMap<String, ContactHistory>>,
    engagement: DashMap<String, u8>,
}

impl TargetingOptimizer {
    /// Start building an optimizer persisting to `ledger`.
    pub fn builder(ledger: Arc<dyn Ledger>) -> TargetingOptimizerBuilder {
        TargetingOptimizerBuilder::new(ledger)
    }

    /// Effective configuration.
    pub fn config(&self) -> &TargetingConfig {
        &self.config
    }

    /// Decision counters.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Decide whether `email` should be approached for `campaign_id`.
    ///
    /// Rules, first match wins: unknown address, opted out, bounced, spam
    /// complaint, already approached for this campaign, lifetime cap, too
    /// soon since the last approach, low engagement.
    pub fn should_contact(&self, email: &str, campaign_id: &str) -> TargetingDecision {
        let email = normalize_email(email);
        let now = self.clock.now();
        let decision = {
            let contacts = self.read_contacts();
            let (decision, score) = self.evaluate(contacts.get(&email), Some(campaign_id), now);
            // Cached under the lock so a concurrent response cannot be overwritten
            if let Some(score) = score {
                self.engagement.insert(email.clone(), score);
            }
            decision
        };

        self.metrics.record_targeting(decision.contact);
        if !decision.contact {
            debug!(email = %email, campaign_id, reason = %decision.reason, "Contact suppressed");
        }
        decision
    }

    /// Whether `email` could be approached by a campaign it has not seen.
    pub fn is_contactable(&self, email: &str) -> bool {
        let email = normalize_email(email);
        let contacts = self.read_contacts();
        self.evaluate(contacts.get(&email), None, self.clock.now())
            .0
            .contact
    }

    /// Engagement score of `email`; neutral for unknown addresses.
    pub fn engagement_score(&self, email: &str) -> u8 {
        let email = normalize_email(email);
        self.read_contacts()
            .get(&email)
            .map_or(NEUTRAL_ENGAGEMENT, ContactHistory::engagement_score)
    }

    /// Record an approach of `email` for `campaign_id`.
    ///
    /// # Errors
    /// Returns the ledger error if the contact checkpoint could not be
    /// written; the in-memory history is kept.
    pub fn record_contact(&self, email: &str, campaign_id: &str) -> Result<(), LedgerError> {
        let email = normalize_email(email);
        let now = self.clock.now();

        let mut contacts = self.write_contacts();
        let history = contacts.entry(email.clone()).or_default();
        history.record_contact(campaign_id, now);
        debug!(
            email = %email,
            campaign_id,
            contact_count = history.contact_count(),
            "Contact recorded"
        );

        let result = self.ledger.save_contacts(&contacts);
        self.persisted("record_contact", result)
    }

    /// Record a response from `email`.
    ///
    /// Also refreshes and persists the engagement score.
    ///
    /// # Errors
    /// Returns the ledger error if either checkpoint could not be written;
    /// the in-memory history and score are kept.
    pub fn record_response(&self, email: &str, response: ResponseType) -> Result<(), LedgerError> {
        let email = normalize_email(email);
        let now = self.clock.now();

        let mut contacts = self.write_contacts();
        let history = contacts.entry(email.clone()).or_default();
        let newly_suppressed = history.apply_response(response, now);
        let status = history.status();
        let score = history.engagement_score();
        self.engagement.insert(email.clone(), score);

        if newly_suppressed {
            info!(email = %email, response = %response, status = %status, "Contact permanently suppressed");
        } else {
            debug!(email = %email, response = %response, score, "Response recorded");
        }

        let result = self
            .ledger
            .save_contacts(&contacts)
            .and_then(|()| self.ledger.save_engagement(&self.engagement_snapshot()));
        self.persisted("record_response", result)
    }

    /// Partition `contacts` into those to approach for `campaign_id` and
    /// those to skip.
    ///
    /// Candidates with a blank address, rejected by
    /// [`should_contact`](Self::should_contact), or scoring below
    /// `min_engagement` are skipped with a reason.
    pub fn filter_contacts<C, I>(
        &self,
        contacts: I,
        campaign_id: &str,
        min_engagement: u8,
    ) -> FilterResult<C>
    where
        C: Addressable,
        I: IntoIterator<Item = C>,
    {
        let mut result = FilterResult {
            targeted: Vec::new(),
            skipped: Vec::new(),
        };

        for contact in contacts {
            let email = normalize_email(contact.email());
            if email.is_empty() {
                result.skipped.push(Skipped {
                    contact,
                    reason: "No email address".to_string(),
                });
                continue;
            }

            let decision = self.should_contact(&email, campaign_id);
            if !decision.contact {
                result.skipped.push(Skipped {
                    contact,
                    reason: decision.reason,
                });
                continue;
            }

            let engagement = self.engagement_score(&email);
            if engagement < min_engagement {
                result.skipped.push(Skipped {
                    contact,
                    reason: format!("Engagement too low ({engagement}/{min_engagement})"),
                });
                continue;
            }

            result.targeted.push(Targeted {
                contact,
                engagement_score: engagement,
            });
        }

        let stats = result.stats();
        info!(
            campaign_id,
            total = stats.total,
            targeted = stats.targeted,
            skipped = stats.skipped,
            "Contacts filtered"
        );
        result
    }

    /// Snapshot of one contact.
    pub fn contact_report(&self, email: &str) -> ContactReport {
        let email = normalize_email(email);
        let now = self.clock.now();
        let contacts = self.read_contacts();

        let Some(history) = contacts.get(&email) else {
            return ContactReport {
                email,
                known: false,
                status: ContactStatus::New,
                first_contact: None,
                last_contact: None,
                contact_count: 0,
                campaigns: Vec::new(),
                engagement_score: NEUTRAL_ENGAGEMENT,
                replied: false,
                interested: false,
                opted_out: false,
                bounced: false,
                can_contact: true,
            };
        };

        let signals = history.signals();
        let can_contact = self.evaluate(Some(history), None, now).0.contact;
        ContactReport {
            known: true,
            status: history.status(),
            first_contact: history.first_contact(),
            last_contact: history.last_contact(),
            contact_count: history.contact_count(),
            campaigns: history.campaigns().to_vec(),
            engagement_score: history.engagement_score(),
            replied: signals.replied,
            interested: signals.interested,
            opted_out: history.suppressions().opted_out,
            bounced: history.suppressions().bounced,
            can_contact,
            email,
        }
    }

    /// Totals over every known contact.
    pub fn summary(&self) -> TargetingSummary {
        let now = self.clock.now();
        let contacts = self.read_contacts();
        let total = contacts.len();

        let count_flag = |flag: fn(Suppressions) -> bool| {
            contacts
                .values()
                .filter(|h| flag(h.suppressions()))
                .count()
        };
        let replied = contacts.values().filter(|h| h.signals().replied).count();
        let interested = contacts.values().filter(|h| h.signals().interested).count();
        let contactable = contacts
            .values()
            .filter(|h| self.evaluate(Some(*h), None, now).0.contact)
            .count();
        let engagement_total: u64 = contacts
            .values()
            .map(|h| u64::from(h.engagement_score()))
            .sum();

        TargetingSummary {
            total_contacts: total,
            contactable,
            opted_out: count_flag(|s| s.opted_out),
            bounced: count_flag(|s| s.bounced),
            spam_complaints: count_flag(|s| s.spam_complaint),
            replied,
            interested,
            reply_rate_percent: percent(replied as u64, total as u64),
            interest_rate_percent: percent(interested as u64, total as u64),
            average_engagement: if total == 0 {
                0.0
            } else {
                engagement_total as f64 / total as f64
            },
        }
    }

    /// Number of known contacts.
    pub fn known_contacts(&self) -> usize {
        self.read_contacts().len()
    }

    /// Apply the rules to one history. `campaign_id` of `None` skips the
    /// per-campaign dedup. The engagement score is returned when computed.
    fn evaluate(
        &self,
        history: Option<&ContactHistory>,
        campaign_id: Option<&str>,
        now: NaiveDateTime,
    ) -> (TargetingDecision, Option<u8>) {
        let Some(history) = history else {
            return (TargetingDecision::approve("New contact"), None);
        };

        let suppressions = history.suppressions();
        if suppressions.opted_out {
            return (TargetingDecision::suppress("Previously opted out"), None);
        }
        if suppressions.bounced {
            return (TargetingDecision::suppress("Previous bounce"), None);
        }
        if suppressions.spam_complaint {
            return (TargetingDecision::suppress("Previous spam complaint"), None);
        }

        if let Some(campaign_id) = campaign_id {
            if history.has_campaign(campaign_id) {
                return (
                    TargetingDecision::suppress(format!("Already contacted for '{campaign_id}'")),
                    None,
                );
            }
        }

        let config = &self.config;
        let contact_count = history.contact_count();
        if contact_count >= config.max_lifetime_contacts {
            return (
                TargetingDecision::suppress(format!(
                    "Reached max lifetime contacts ({})",
                    config.max_lifetime_contacts
                )),
                None,
            );
        }

        if let Some(last) = history.last_contact() {
            let days_since = (now - last).num_days();
            if days_since < i64::from(config.min_days_between_contacts) {
                return (
                    TargetingDecision::suppress(format!(
                        "Too soon (last contact {days_since} days ago, min {})",
                        config.min_days_between_contacts
                    )),
                    None,
                );
            }
        }

        let engagement = history.engagement_score();
        if engagement < config.low_engagement_floor && contact_count > 0 {
            return (
                TargetingDecision::suppress(format!("Low engagement score ({engagement}/100)")),
                Some(engagement),
            );
        }

        (
            TargetingDecision::approve(format!("OK to contact (engagement: {engagement}/100)")),
            Some(engagement),
        )
    }

    fn engagement_snapshot(&self) -> BTreeMap<String, u8> {
        self.engagement
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    fn persisted(
        &self,
        operation: &'static str,
        result: Result<(), LedgerError>,
    ) -> Result<(), LedgerError> {
        if let Err(error) = &result {
            self.metrics.record_persist_failure();
            warn!(operation, %error, "Failed to persist contact state; in-memory state kept");
        }
        result
    }

    fn read_contacts(&self) -> RwLockReadGuard<'_, BTreeMap<String, ContactHistory>> {
        self.contacts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_contacts(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ContactHistory>> {
        self.contacts.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for [`TargetingOptimizer`].
#[derive(Debug)]
pub struct TargetingOptimizerBuilder {
    config: TargetingConfig,
    ledger: Arc<dyn Ledger>,
    clock: Option<Arc<dyn Clock>>,
    metrics: Option<Metrics>,
}

impl TargetingOptimizerBuilder {
    fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            config: TargetingConfig::default(),
            ledger,
            clock: None,
            metrics: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: TargetingConfig) -> Self {
        self.config = config;
        self
    }

    /// Days required between two approaches of the same contact.
    pub fn with_min_days_between_contacts(mut self, days: u32) -> Self {
        self.config.min_days_between_contacts = days;
        self
    }

    /// Approaches allowed over a contact's lifetime.
    pub fn with_max_lifetime_contacts(mut self, max: u32) -> Self {
        self.config.max_lifetime_contacts = max;
        self
    }

    /// Engagement below which previously approached contacts are left alone.
    pub fn with_low_engagement_floor(mut self, floor: u8) -> Self {
        self.config.low_engagement_floor = floor;
        self
    }

    /// Clock used for every timestamp.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share decision counters with other components.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and load persisted contacts.
    ///
    /// Unreadable checkpoints are logged and replaced by empty state.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is inconsistent.
    pub fn build(self) -> Result<TargetingOptimizer, ConfigError> {
        self.config.validate()?;

        let contacts = self.ledger.load_contacts().unwrap_or_else(|error| {
            warn!(%error, "Failed to load contact history; starting empty");
            BTreeMap::new()
        });
        let engagement: DashMap<String, u8> = self
            .ledger
            .load_engagement()
            .unwrap_or_else(|error| {
                warn!(%error, "Failed to load engagement scores; starting empty");
                BTreeMap::new()
            })
            .into_iter()
            .map(|(email, score)| (email, score.min(100)))
            .collect();

        info!(
            min_days_between_contacts = self.config.min_days_between_contacts,
            max_lifetime_contacts = self.config.max_lifetime_contacts,
            known_contacts = contacts.len(),
            "Targeting optimizer initialized"
        );

        Ok(TargetingOptimizer {
            config: self.config,
            ledger: self.ledger,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
            metrics: self.metrics.unwrap_or_default(),
            contacts: RwLock::new(contacts),
            engagement,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::ledger::MemoryLedger;
    use chrono::NaiveDate;
    use std::time::Duration;

    const DAY: Duration = Duration::from_secs(86_400);

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn optimizer(ledger: &MemoryLedger) -> (TargetingOptimizer, ManualClock) {
        let clock = ManualClock::new(start());
        let optimizer = TargetingOptimizer::builder(Arc::new(ledger.clone()))
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        (optimizer, clock)
    }

    #[test]
    fn test_new_contact() {
        let (opt, _) = optimizer(&MemoryLedger::new());
        assert_eq!(
            opt.should_contact("new@x.com", "c1"),
            TargetingDecision::approve("New contact")
        );
        assert_eq!(opt.known_contacts(), 0);
    }

    #[test]
    fn test_campaign_dedup() {
        let (opt, clock) = optimizer(&MemoryLedger::new());
        opt.record_contact("a@x.com", "camp1").unwrap();
        assert_eq!(
            opt.should_contact("a@x.com", "camp1").reason,
            "Already contacted for 'camp1'"
        );

        // Still blocked long after the minimum gap
        clock.advance(DAY * 365);
        assert!(!opt.should_contact("a@x.com", "camp1").contact);
    }

    #[test]
    fn test_too_soon() {
        let (opt, clock) = optimizer(&MemoryLedger::new());
        opt.record_contact("a@x.com", "c1").unwrap();
        clock.advance(DAY * 10);
        assert_eq!(
            opt.should_contact("a@x.com", "c2").reason,
            "Too soon (last contact 10 days ago, min 90)"
        );
    }

    #[test]
    fn test_low_engagement_after_gap() {
        let (opt, clock) = optimizer(&MemoryLedger::new());
        opt.record_contact("a@x.com", "c1").unwrap();
        clock.advance(DAY * 91);
        // 50 - 10 for one unanswered approach
        assert_eq!(
            opt.should_contact("a@x.com", "c2").reason,
            "OK to contact (engagement: 40/100)"
        );

        opt.record_contact("a@x.com", "c2").unwrap();
        opt.record_response("a@x.com", ResponseType::NotInterested)
            .unwrap();
        clock.advance(DAY * 91);
        // 50 - 40 - 20
        assert_eq!(
            opt.should_contact("a@x.com", "c3").reason,
            "Low engagement score (0/100)"
        );
    }

    #[test]
    fn test_lifetime_cap() {
        let (opt, clock) = optimizer(&MemoryLedger::new());
        for campaign in ["c1", "c2", "c3"] {
            opt.record_contact("a@x.com", campaign).unwrap();
            opt.record_response("a@x.com", ResponseType::Replied).unwrap();
            clock.advance(DAY * 100);
        }
        assert_eq!(
            opt.should_contact("a@x.com", "c4").reason,
            "Reached max lifetime contacts (3)"
        );
    }

    #[test]
    fn test_absorbing_reasons() {
        let (opt, _) = optimizer(&MemoryLedger::new());
        opt.record_response("o@x.com", ResponseType::OptedOut).unwrap();
        opt.record_response("b@x.com", ResponseType::Bounced).unwrap();
        opt.record_response("s@x.com", ResponseType::SpamComplaint)
            .unwrap();

        assert_eq!(opt.should_contact("o@x.com", "c").reason, "Previously opted out");
        assert_eq!(opt.should_contact("b@x.com", "c").reason, "Previous bounce");
        assert_eq!(
            opt.should_contact("s@x.com", "c").reason,
            "Previous spam complaint"
        );

        // Opt-out outranks an earlier bounce
        opt.record_response("b@x.com", ResponseType::OptedOut).unwrap();
        assert_eq!(opt.should_contact("b@x.com", "c").reason, "Previously opted out");
        assert_eq!(opt.metrics().contacts_suppressed(), 4);
    }

    #[test]
    fn test_opt_out_after_spam_complaint_is_recorded() {
        let ledger = MemoryLedger::new();
        let (opt, _) = optimizer(&ledger);
        opt.record_contact("s@x.com", "c1").unwrap();
        opt.record_response("s@x.com", ResponseType::SpamComplaint)
            .unwrap();
        opt.record_response("s@x.com", ResponseType::OptedOut).unwrap();

        assert_eq!(
            opt.should_contact("s@x.com", "c2").reason,
            "Previously opted out"
        );

        let report = opt.contact_report("s@x.com");
        assert_eq!(report.status, ContactStatus::OptedOut);
        assert!(report.opted_out);
        assert_eq!(report.engagement_score, 0);

        let stored = ledger.contacts();
        let flags = stored.get("s@x.com").unwrap().suppressions();
        assert!(flags.opted_out && flags.spam_complaint && !flags.bounced);
        assert_eq!(ledger.engagement().get("s@x.com"), Some(&0));

        let summary = opt.summary();
        assert_eq!(summary.opted_out, 1);
        assert_eq!(summary.spam_complaints, 1);
    }

    #[test]
    fn test_response_persists_engagement() {
        let ledger = MemoryLedger::new();
        let (opt, _) = optimizer(&ledger);
        opt.record_contact("a@x.com", "c1").unwrap();
        opt.record_response("A@X.com ", ResponseType::Interested)
            .unwrap();

        assert_eq!(ledger.engagement().get("a@x.com"), Some(&100));
        let stored = ledger.contacts();
        let history = stored.get("a@x.com").unwrap();
        assert!(history.signals().replied);
        assert_eq!(history.status(), ContactStatus::Replied);
    }

    #[test]
    fn test_should_contact_is_read_only() {
        let ledger = MemoryLedger::new();
        let (opt, _) = optimizer(&ledger);
        opt.should_contact("a@x.com", "c1");
        assert_eq!(opt.known_contacts(), 0);
        assert!(ledger.contacts().is_empty());
    }

    #[test]
    fn test_filter_contacts() {
        let (opt, clock) = optimizer(&MemoryLedger::new());
        opt.record_response("gone@x.com", ResponseType::OptedOut)
            .unwrap();
        opt.record_contact("cold@x.com", "old").unwrap();
        clock.advance(DAY * 100);

        let candidates = vec!["fresh@x.com", "  ", "gone@x.com", "cold@x.com"];
        let result = opt.filter_contacts(candidates, "launch", 45);

        assert_eq!(result.targeted.len(), 1);
        assert_eq!(result.targeted[0].contact, "fresh@x.com");
        assert_eq!(result.targeted[0].engagement_score, 50);

        let reasons: Vec<_> = result.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert_eq!(
            reasons,
            vec![
                "No email address",
                "Previously opted out",
                "Engagement too low (40/45)"
            ]
        );

        let stats = result.stats();
        assert_eq!(stats.total, 4);
        assert!((stats.targeting_rate_percent - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_contact_report_and_summary() {
        let (opt, clock) = optimizer(&MemoryLedger::new());
        opt.record_contact("a@x.com", "c1").unwrap();
        opt.record_response("a@x.com", ResponseType::Replied).unwrap();
        opt.record_contact("b@x.com", "c1").unwrap();
        opt.record_response("b@x.com", ResponseType::Bounced).unwrap();
        clock.advance(DAY * 100);

        let report = opt.contact_report("a@x.com");
        assert!(report.known);
        assert_eq!(report.status, ContactStatus::Replied);
        assert_eq!(report.campaigns, vec!["c1".to_string()]);
        assert_eq!(report.engagement_score, 80);
        assert!(report.can_contact);

        let unknown = opt.contact_report("nobody@x.com");
        assert!(!unknown.known);
        assert_eq!(unknown.engagement_score, 50);

        let summary = opt.summary();
        assert_eq!(summary.total_contacts, 2);
        assert_eq!(summary.contactable, 1);
        assert_eq!(summary.bounced, 1);
        assert_eq!(summary.replied, 1);
        assert!((summary.reply_rate_percent - 50.0).abs() < 1e-9);
        assert!((summary.average_engagement - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_loads_persisted_contacts() {
        let ledger = MemoryLedger::new();
        {
            let (opt, _) = optimizer(&ledger);
            opt.record_response("a@x.com", ResponseType::SpamComplaint)
                .unwrap();
        }
        let (reopened, _) = optimizer(&ledger);
        assert!(!reopened.is_contactable("a@x.com"));
    }

    #[test]
    fn test_persist_failure_keeps_memory() {
        let ledger = MemoryLedger::new();
        let (opt, _) = optimizer(&ledger);
        ledger.set_fail_writes(true);

        assert!(opt.record_contact("a@x.com", "c1").is_err());
        assert_eq!(opt.known_contacts(), 1);
        assert!(!opt.should_contact("a@x.com", "c1").contact);
        assert_eq!(opt.metrics().persist_failures(), 1);
    }
}
