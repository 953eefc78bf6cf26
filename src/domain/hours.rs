//! Time-of-day sending policy.
//!
//! Messages are only sent on weekdays, inside a daily window, and outside a
//! quiet period around lunch. The policy is evaluated against local
//! wall-clock time.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// Outcome of checking the sending-hours policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeVerdict {
    /// Sending is allowed right now
    Open,
    /// Saturday or Sunday
    Weekend,
    /// Before the daily window opens; seconds until it opens today
    TooEarly {
        /// Seconds until the window opens
        wait_seconds: u64,
    },
    /// After the daily window closed; seconds until it opens tomorrow
    TooLate {
        /// Seconds until the window opens again
        wait_seconds: u64,
    },
    /// Inside the quiet period (advisory, no wait hint)
    QuietPeriod,
}

impl TimeVerdict {
    /// Whether sending is allowed.
    pub fn is_open(&self) -> bool {
        matches!(self, TimeVerdict::Open)
    }

    /// Retry hint in seconds, if the verdict carries one.
    pub fn wait_seconds(&self) -> Option<u64> {
        match self {
            TimeVerdict::TooEarly { wait_seconds } | TimeVerdict::TooLate { wait_seconds } => {
                Some(*wait_seconds)
            }
            _ => None,
        }
    }

    /// Operator-facing reason for the verdict.
    pub fn reason(&self, hours: &SendingHours) -> String {
        match self {
            TimeVerdict::Open => "Good time to send".to_string(),
            TimeVerdict::Weekend => "Weekend - wait until Monday".to_string(),
            TimeVerdict::TooEarly { wait_seconds } => format!(
                "Too early - wait until {} ({}s)",
                format_hour(hours.start_hour),
                wait_seconds
            ),
            TimeVerdict::TooLate { wait_seconds } => format!(
                "Too late - wait until tomorrow {} ({}s)",
                format_hour(hours.start_hour),
                wait_seconds
            ),
            TimeVerdict::QuietPeriod => {
                "Lunch hour - better to wait for better engagement".to_string()
            }
        }
    }
}

fn format_hour(hour: u32) -> String {
    match hour {
        0 => "12 AM".to_string(),
        1..=11 => format!("{hour} AM"),
        12 => "12 PM".to_string(),
        _ => format!("{} PM", hour - 12),
    }
}

/// Daily sending window.
///
/// Hours are `0..=23` in local time. The window is `[start_hour, end_hour)`;
/// the optional quiet period `[quiet_start, quiet_end)` lies inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendingHours {
    /// First hour sending is allowed
    pub start_hour: u32,
    /// First hour sending is no longer allowed
    pub end_hour: u32,
    /// Quiet period inside the window, as `(start, end)` hours
    pub quiet: Option<(u32, u32)>,
    /// Deny on Saturday and Sunday
    pub skip_weekends: bool,
}

impl Default for SendingHours {
    fn default() -> Self {
        Self {
            start_hour: 8,
            end_hour: 20,
            quiet: Some((12, 13)),
            skip_weekends: true,
        }
    }
}

impl SendingHours {
    /// Check whether `hours` is internally consistent.
    pub fn is_valid(&self) -> bool {
        let window_ok = self.start_hour < self.end_hour && self.end_hour <= 24;
        let quiet_ok = self.quiet.map_or(true, |(qs, qe)| {
            qs < qe && qs >= self.start_hour && qe <= self.end_hour
        });
        window_ok && quiet_ok
    }

    /// Evaluate the policy at `now`.
    pub fn check(&self, now: NaiveDateTime) -> TimeVerdict {
        if self.skip_weekends && matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            return TimeVerdict::Weekend;
        }

        let hour = now.hour();
        if hour < self.start_hour {
            let opens = self.opening_on(now, 0);
            return TimeVerdict::TooEarly {
                wait_seconds: seconds_between(now, opens),
            };
        }

        if hour >= self.end_hour {
            let opens = self.opening_on(now, 1);
            return TimeVerdict::TooLate {
                wait_seconds: seconds_between(now, opens),
            };
        }

        if let Some((quiet_start, quiet_end)) = self.quiet {
            if (quiet_start..quiet_end).contains(&hour) {
                return TimeVerdict::QuietPeriod;
            }
        }

        TimeVerdict::Open
    }

    /// Today's closing time.
    pub fn closing_today(&self, now: NaiveDateTime) -> NaiveDateTime {
        if self.end_hour >= 24 {
            return now.date().and_time(NaiveTime::default()) + Duration::days(1);
        }
        now.date().and_time(hour_time(self.end_hour))
    }

    fn opening_on(&self, now: NaiveDateTime, days_ahead: i64) -> NaiveDateTime {
        (now.date() + Duration::days(days_ahead)).and_time(hour_time(self.start_hour))
    }
}

fn hour_time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or_default()
}

fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> u64 {
    u64::try_from((to - from).num_seconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    // 2024-03-05 is a Tuesday
    fn tuesday(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_open_mid_morning() {
        let hours = SendingHours::default();
        assert_eq!(hours.check(tuesday(10, 15, 0)), TimeVerdict::Open);
    }

    #[test]
    fn test_too_early_waits_until_start() {
        let hours = SendingHours::default();
        let verdict = hours.check(tuesday(3, 0, 0));
        assert_eq!(verdict, TimeVerdict::TooEarly { wait_seconds: 5 * 3600 });
        assert_eq!(verdict.reason(&hours), "Too early - wait until 8 AM (18000s)");
    }

    #[test]
    fn test_too_late_waits_until_tomorrow() {
        let hours = SendingHours::default();
        let verdict = hours.check(tuesday(21, 30, 0));
        assert_eq!(verdict.wait_seconds(), Some(10 * 3600 + 30 * 60));
        assert!(verdict.reason(&hours).starts_with("Too late - wait until tomorrow 8 AM"));
    }

    #[test]
    fn test_end_hour_is_exclusive() {
        let hours = SendingHours::default();
        assert!(hours.check(tuesday(19, 59, 59)).is_open());
        assert!(!hours.check(tuesday(20, 0, 0)).is_open());
    }

    #[test]
    fn test_quiet_period_has_no_wait() {
        let hours = SendingHours::default();
        let verdict = hours.check(tuesday(12, 30, 0));
        assert_eq!(verdict, TimeVerdict::QuietPeriod);
        assert_eq!(verdict.wait_seconds(), None);
        assert!(hours.check(tuesday(13, 0, 0)).is_open());
    }

    #[test]
    fn test_weekend() {
        let hours = SendingHours::default();
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(hours.check(saturday), TimeVerdict::Weekend);

        let relaxed = SendingHours {
            skip_weekends: false,
            ..SendingHours::default()
        };
        assert!(relaxed.check(saturday).is_open());
    }

    #[test]
    fn test_validity() {
        assert!(SendingHours::default().is_valid());
        assert!(!SendingHours {
            start_hour: 20,
            end_hour: 8,
            ..SendingHours::default()
        }
        .is_valid());
        assert!(!SendingHours {
            quiet: Some((6, 7)),
            ..SendingHours::default()
        }
        .is_valid());
    }

    #[test]
    fn test_closing_today() {
        let hours = SendingHours::default();
        assert_eq!(hours.closing_today(tuesday(9, 0, 0)), tuesday(20, 0, 0));
    }
}
