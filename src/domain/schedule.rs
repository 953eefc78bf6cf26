//! Sending schedule advisory.
//!
//! Given how many messages remain and the current quotas, suggests whether a
//! batch fits into today or how to spread it over several days. Pure
//! arithmetic; the rate limiter supplies the inputs.

use serde::Serialize;
use std::collections::BTreeMap;

/// Inputs to [`plan_schedule`].
#[derive(Debug, Clone)]
pub struct ScheduleRequest<'a> {
    /// Messages to send
    pub total_emails: u64,
    /// Daily quota still available today
    pub remaining_today: u64,
    /// Global daily cap
    pub max_daily: u64,
    /// Per-domain daily cap
    pub max_per_domain_daily: u64,
    /// Delay between consecutive sends
    pub delay_seconds: u64,
    /// Seconds left before today's sending window closes (may be negative)
    pub seconds_until_cutoff: i64,
    /// Whether sending may start right now
    pub start_immediately: bool,
    /// Optional breakdown of the batch by recipient domain
    pub domain_counts: Option<&'a BTreeMap<String, u64>>,
}

/// A run of consecutive sending days with the same volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayPlan {
    /// 1-based number of the first day in the run
    pub first_day: u64,
    /// Days in the run
    pub days: u64,
    /// Messages to send on each day of the run
    pub emails: u64,
}

impl DayPlan {
    /// Messages sent over the whole run.
    pub fn total(&self) -> u64 {
        self.days.saturating_mul(self.emails)
    }
}

/// Suggested way to send a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleSuggestion {
    /// The batch fits in today's quota.
    SameDay {
        /// Whether the batch also fits before today's cutoff
        can_finish_today: bool,
        /// Messages to send today
        emails_today: u64,
        /// Messages spilling over to tomorrow
        emails_tomorrow: u64,
        /// Delay to use between sends
        optimal_delay_seconds: u64,
        /// Estimated total sending time
        estimated_completion_minutes: u64,
        /// Whether sending may start right now
        start_immediately: bool,
        /// Human-readable advice
        recommendation: String,
    },
    /// The batch needs several days.
    MultiDay {
        /// Days required
        days_needed: u64,
        /// Largest number of messages planned for a single day
        emails_per_day: u64,
        /// Delay to use between sends
        optimal_delay_seconds: u64,
        /// Same as `days_needed`
        estimated_completion_days: u64,
        /// Whether sending may start right now
        start_immediately: bool,
        /// Messages per day, as runs of identical days
        plan: Vec<DayPlan>,
        /// Human-readable advice
        recommendation: String,
    },
}

impl ScheduleSuggestion {
    /// Human-readable advice.
    pub fn recommendation(&self) -> &str {
        match self {
            ScheduleSuggestion::SameDay { recommendation, .. }
            | ScheduleSuggestion::MultiDay { recommendation, .. } => recommendation,
        }
    }

    /// Whether everything can be sent today.
    pub fn can_finish_today(&self) -> bool {
        match self {
            ScheduleSuggestion::SameDay {
                can_finish_today, ..
            } => *can_finish_today,
            ScheduleSuggestion::MultiDay { .. } => false,
        }
    }
}

/// Suggest a schedule for `req`.
pub fn plan_schedule(req: &ScheduleRequest<'_>) -> ScheduleSuggestion {
    let domain_bound = req
        .domain_counts
        .map(|counts| {
            counts
                .values()
                .map(|&c| div_ceil(c, req.max_per_domain_daily))
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);

    if req.total_emails <= req.remaining_today && domain_bound <= 1 {
        same_day(req)
    } else {
        multi_day(req)
    }
}

fn same_day(req: &ScheduleRequest<'_>) -> ScheduleSuggestion {
    let delay = req.delay_seconds;
    let estimated_seconds = req.total_emails.saturating_mul(delay);
    let available = u64::try_from(req.seconds_until_cutoff).unwrap_or(0);
    let can_finish_today = req.seconds_until_cutoff >= 0 && estimated_seconds <= available;

    let emails_today = if can_finish_today || delay == 0 {
        req.total_emails
    } else {
        (available / delay).min(req.total_emails)
    };

    let recommendation = if can_finish_today {
        format!(
            "Send all {} emails today (~{:.0} minutes with {}s delays)",
            req.total_emails,
            estimated_seconds as f64 / 60.0,
            delay
        )
    } else {
        format!("Send remaining emails today, continue tomorrow with {delay}s delays")
    };

    ScheduleSuggestion::SameDay {
        can_finish_today,
        emails_today,
        emails_tomorrow: req.total_emails - emails_today,
        optimal_delay_seconds: delay,
        estimated_completion_minutes: estimated_seconds / 60,
        start_immediately: req.start_immediately,
        recommendation,
    }
}

fn multi_day(req: &ScheduleRequest<'_>) -> ScheduleSuggestion {
    let plan = distribute(req);
    let days_needed = plan.last().map_or(0, |run| run.first_day + run.days - 1);
    let emails_per_day = plan.iter().map(|d| d.emails).max().unwrap_or(0);

    ScheduleSuggestion::MultiDay {
        days_needed,
        emails_per_day,
        optimal_delay_seconds: req.delay_seconds,
        estimated_completion_days: days_needed,
        start_immediately: req.start_immediately,
        recommendation: format!(
            "Split across {} days: {} emails/day with {}s delays",
            days_needed, emails_per_day, req.delay_seconds
        ),
        plan,
    }
}

/// Fill days greedily, honouring the global and per-domain daily caps.
///
/// Messages not covered by the domain breakdown are only bound by the
/// global cap. Identical consecutive days are merged into one run, so the
/// plan grows with the number of domains rather than the number of days.
fn distribute(req: &ScheduleRequest<'_>) -> Vec<DayPlan> {
    let max_daily = req.max_daily.max(1);
    let per_domain = req.max_per_domain_daily.max(1);

    let mut domains: Vec<u64> = req
        .domain_counts
        .map(|counts| counts.values().copied().collect())
        .unwrap_or_default();
    let covered: u64 = domains.iter().sum();
    let mut unspecified = req.total_emails.saturating_sub(covered);

    let mut plan = Vec::new();
    let mut day = 1u64;
    let mut takes = vec![0u64; domains.len()];
    while unspecified > 0 || domains.iter().any(|&c| c > 0) {
        let mut capacity = max_daily;
        let mut emails = 0;
        for (remaining, take) in domains.iter().zip(takes.iter_mut()) {
            *take = (*remaining).min(per_domain).min(capacity);
            capacity -= *take;
            emails += *take;
        }
        let unspecified_take = unspecified.min(capacity);
        emails += unspecified_take;

        // The same day repeats while every take stays unchanged
        let mut days = u64::MAX;
        for (&remaining, &take) in domains.iter().zip(&takes) {
            if remaining == 0 {
                continue;
            }
            if remaining < per_domain {
                days = 1;
            } else if take > 0 {
                days = days.min((remaining - per_domain) / take + 1);
            }
        }
        if unspecified_take > 0 {
            days = if unspecified_take < capacity {
                1
            } else {
                days.min((unspecified - capacity) / unspecified_take + 1)
            };
        }
        let days = days.max(1);

        for (remaining, &take) in domains.iter_mut().zip(&takes) {
            *remaining -= take * days;
        }
        unspecified -= unspecified_take * days;

        plan.push(DayPlan {
            first_day: day,
            days,
            emails,
        });
        day = day.saturating_add(days);
    }
    plan
}

fn div_ceil(n: u64, d: u64) -> u64 {
    if d == 0 {
        return n;
    }
    n / d + u64::from(n % d != 0)
}
