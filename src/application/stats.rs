//! Reporting types returned by the rate limiter and the targeting optimizer.

use crate::domain::contact::ContactStatus;
use chrono::NaiveDateTime;
use serde::Serialize;

/// Usage of one rolling quota.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaUsage {
    /// Sends counted in the window
    pub sent: u64,
    /// Configured cap
    pub limit: u64,
    /// Sends left before the cap
    pub remaining: u64,
    /// `sent / limit` as a percentage
    pub utilization_percent: f64,
}

impl QuotaUsage {
    pub(crate) fn new(sent: u64, limit: u64) -> Self {
        Self {
            sent,
            limit,
            remaining: limit.saturating_sub(sent),
            utilization_percent: percent(sent, limit),
        }
    }
}

/// Per-domain activity since midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainUsage {
    /// Distinct domains sent to today
    pub contacted_today: usize,
    /// Busiest domains, most sends first (at most five)
    pub top_domains: Vec<(String, u64)>,
}

/// Reputation figures for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReputationSummary {
    pub score: f64,
    pub total_sent: u64,
    pub successful_sends: u64,
    pub bounces: u64,
    pub complaints: u64,
    pub bounce_rate_percent: f64,
}

/// Timing information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingStats {
    /// Most recent send, if any
    pub last_send: Option<NaiveDateTime>,
    /// Whether the sending-hours policy currently allows sending
    pub good_time_to_send: bool,
}

/// Snapshot returned by [`RateLimiter::get_stats`](crate::RateLimiter::get_stats).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendStats {
    pub hourly: QuotaUsage,
    pub daily: QuotaUsage,
    pub domains: DomainUsage,
    pub reputation: ReputationSummary,
    pub timing: TimingStats,
}

/// Snapshot of one contact, from
/// [`TargetingOptimizer::contact_report`](crate::TargetingOptimizer::contact_report).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactReport {
    /// Normalised address
    pub email: String,
    /// Whether the address has any history at all
    pub known: bool,
    pub status: ContactStatus,
    pub first_contact: Option<NaiveDateTime>,
    pub last_contact: Option<NaiveDateTime>,
    pub contact_count: u32,
    pub campaigns: Vec<String>,
    pub engagement_score: u8,
    pub replied: bool,
    pub interested: bool,
    pub opted_out: bool,
    pub bounced: bool,
    /// Whether a new campaign could approach the contact
    pub can_contact: bool,
}

/// Totals over every known contact, from
/// [`TargetingOptimizer::summary`](crate::TargetingOptimizer::summary).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetingSummary {
    pub total_contacts: usize,
    pub contactable: usize,
    pub opted_out: usize,
    pub bounced: usize,
    pub spam_complaints: usize,
    pub replied: usize,
    pub interested: usize,
    pub reply_rate_percent: f64,
    pub interest_rate_percent: f64,
    /// Mean engagement score; 0 when there are no contacts
    pub average_engagement: f64,
}

pub(crate) fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
