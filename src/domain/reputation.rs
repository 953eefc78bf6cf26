//! Sender reputation.
//!
//! The reputation score summarises delivery quality: bounces and complaints
//! pull it down, and the whole value is scaled by the success rate. The
//! score is always derived from the counters and cannot be set directly.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Score below which the limiter slows down.
pub const LOW_REPUTATION_THRESHOLD: f64 = 80.0;

/// Persisted reputation counters and the score derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationState {
    score: f64,
    total_sent: u64,
    successful_sends: u64,
    bounces: u64,
    complaints: u64,
    last_updated: Option<NaiveDateTime>,
}

impl Default for ReputationState {
    fn default() -> Self {
        Self {
            score: 100.0,
            total_sent: 0,
            successful_sends: 0,
            bounces: 0,
            complaints: 0,
            last_updated: None,
        }
    }
}

impl ReputationState {
    /// Fresh state with a perfect score.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current score in `[0, 100]`.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Sends recorded so far.
    pub fn total_sent(&self) -> u64 {
        self.total_sent
    }

    /// Sends the transport accepted.
    pub fn successful_sends(&self) -> u64 {
        self.successful_sends
    }

    /// Bounces reported so far.
    pub fn bounces(&self) -> u64 {
        self.bounces
    }

    /// Spam complaints reported so far.
    pub fn complaints(&self) -> u64 {
        self.complaints
    }

    /// When the state last changed.
    pub fn last_updated(&self) -> Option<NaiveDateTime> {
        self.last_updated
    }

    /// Bounces as a fraction of sends (0.0 when nothing was sent).
    pub fn bounce_rate(&self) -> f64 {
        ratio(self.bounces, self.total_sent).unwrap_or(0.0)
    }

    /// Whether the score is low enough to warrant slower sending.
    pub fn is_degraded(&self) -> bool {
        self.score < LOW_REPUTATION_THRESHOLD
    }

    /// Account for one send attempt.
    pub fn record_send(&mut self, success: bool, now: NaiveDateTime) {
        self.total_sent += 1;
        if success {
            self.successful_sends += 1;
        }
        self.recompute(now);
    }

    /// Account for one bounce.
    pub fn record_bounce(&mut self, now: NaiveDateTime) {
        self.bounces += 1;
        self.recompute(now);
    }

    /// Account for one spam complaint.
    pub fn record_complaint(&mut self, now: NaiveDateTime) {
        self.complaints += 1;
        self.recompute(now);
    }

    /// Re-derive the score after loading counters from disk.
    ///
    /// Persisted files may carry a stale or out-of-range score; the counters
    /// are the source of truth.
    pub fn normalized(mut self) -> Self {
        self.score = self.derive_score();
        self
    }

    fn recompute(&mut self, now: NaiveDateTime) {
        self.score = self.derive_score();
        self.last_updated = Some(now);
    }

    fn derive_score(&self) -> f64 {
        let bounce_rate = ratio(self.bounces, self.total_sent).unwrap_or(0.0);
        let complaint_rate = ratio(self.complaints, self.total_sent).unwrap_or(0.0);
        let success_rate = ratio(self.successful_sends, self.total_sent)
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);

        let base = (100.0 - 50.0 * bounce_rate - 100.0 * complaint_rate).clamp(0.0, 100.0);
        (base * success_rate).clamp(0.0, 100.0)
    }
}

fn ratio(part: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| part as f64 / total as f64)
}
