//! Configuration for the rate limiter and the targeting optimizer.
//!
//! Both structs deserialize with every field optional, so a partial JSON
//! document overrides only what it names. Validation happens when a
//! component is built.

use crate::domain::hours::SendingHours;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits and behaviour of the [`RateLimiter`](crate::RateLimiter).
///
/// # Example
///
/// ```
/// use outreach_throttle::RateLimitConfig;
///
/// let config: RateLimitConfig =
///     serde_json::from_str(r#"{"max_hourly": 20, "jitter": false}"#).unwrap();
/// assert_eq!(config.max_hourly, 20);
/// assert_eq!(config.max_daily, 50);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sends allowed in any rolling hour
    pub max_hourly: u32,
    /// Sends allowed in any rolling 24 hours
    pub max_daily: u32,
    /// Sends to one domain allowed in any rolling hour
    pub max_per_domain_hourly: u32,
    /// Sends to one domain allowed in any rolling 24 hours
    pub max_per_domain_daily: u32,
    /// Lower bound of the delay between sends, seconds
    pub min_delay_seconds: u64,
    /// Upper bound of the delay between sends, seconds
    pub max_delay_seconds: u64,
    /// Randomise delays by up to ±20%
    pub jitter: bool,
    /// Apply the sending-hours policy at all
    pub time_aware: bool,
    /// When sending is allowed
    pub sending_hours: SendingHours,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_hourly: 10,
            max_daily: 50,
            max_per_domain_hourly: 3,
            max_per_domain_daily: 5,
            min_delay_seconds: 30,
            max_delay_seconds: 120,
            jitter: true,
            time_aware: true,
            sending_hours: SendingHours::default(),
        }
    }
}

impl RateLimitConfig {
    /// Minimum delay as a `Duration`.
    pub fn min_delay(&self) -> Duration {
        Duration::from_secs(self.min_delay_seconds)
    }

    /// Maximum delay as a `Duration`.
    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_seconds)
    }

    /// Check the configuration for consistency.
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("max_hourly", self.max_hourly),
            ("max_daily", self.max_daily),
            ("max_per_domain_hourly", self.max_per_domain_hourly),
            ("max_per_domain_daily", self.max_per_domain_daily),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroLimit(name));
            }
        }

        if self.max_hourly > self.max_daily {
            return Err(ConfigError::HourlyExceedsDaily {
                hourly: "max_hourly",
                hourly_value: self.max_hourly,
                daily: "max_daily",
                daily_value: self.max_daily,
            });
        }
        if self.max_per_domain_hourly > self.max_per_domain_daily {
            return Err(ConfigError::HourlyExceedsDaily {
                hourly: "max_per_domain_hourly",
                hourly_value: self.max_per_domain_hourly,
                daily: "max_per_domain_daily",
                daily_value: self.max_per_domain_daily,
            });
        }

        if self.min_delay_seconds > self.max_delay_seconds {
            return Err(ConfigError::InvalidDelayRange {
                min: self.min_delay_seconds,
                max: self.max_delay_seconds,
            });
        }

        if !self.sending_hours.is_valid() {
            return Err(ConfigError::InvalidSendingHours {
                start: self.sending_hours.start_hour,
                end: self.sending_hours.end_hour,
                quiet: self.sending_hours.quiet,
            });
        }

        Ok(())
    }
}

/// Frequency-capping rules of the [`TargetingOptimizer`](crate::TargetingOptimizer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    /// Days that must pass between two approaches of the same contact
    pub min_days_between_contacts: u32,
    /// Approaches allowed over a contact's lifetime
    pub max_lifetime_contacts: u32,
    /// Previously approached contacts scoring below this are left alone
    pub low_engagement_floor: u8,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            min_days_between_contacts: 90,
            max_lifetime_contacts: 3,
            low_engagement_floor: 20,
        }
    }
}

impl TargetingConfig {
    /// Check the configuration for consistency.
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_lifetime_contacts == 0 {
            return Err(ConfigError::ZeroLimit("max_lifetime_contacts"));
        }
        if self.low_engagement_floor > 100 {
            return Err(ConfigError::ScoreOutOfRange {
                name: "low_engagement_floor",
                value: self.low_engagement_floor,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RateLimitConfig::default().validate().is_ok());
        assert!(TargetingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_limit_rejected() {
        let config = RateLimitConfig {
            max_per_domain_daily: 0,
            ..RateLimitConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroLimit("max_per_domain_daily"))
        );
    }

    #[test]
    fn test_delay_range_rejected() {
        let config = RateLimitConfig {
            min_delay_seconds: 200,
            ..RateLimitConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidDelayRange { min: 200, max: 120 })
        );
    }

    #[test]
    fn test_hourly_above_daily_rejected() {
        let config = RateLimitConfig {
            max_hourly: 100,
            ..RateLimitConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HourlyExceedsDaily { hourly: "max_hourly", .. })
        ));
    }

    #[test]
    fn test_bad_sending_hours_rejected() {
        let config = RateLimitConfig {
            sending_hours: SendingHours {
                start_hour: 9,
                end_hour: 9,
                ..SendingHours::default()
            },
            ..RateLimitConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSendingHours { .. })
        ));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: TargetingConfig =
            serde_json::from_str(r#"{"max_lifetime_contacts": 5}"#).unwrap();
        assert_eq!(config.max_lifetime_contacts, 5);
        assert_eq!(config.min_days_between_contacts, 90);

        let config: RateLimitConfig =
            serde_json::from_str(r#"{"sending_hours": {"quiet": null}}"#).unwrap();
        assert_eq!(config.sending_hours.quiet, None);
        assert_eq!(config.sending_hours.start_hour, 8);
    }

    #[test]
    fn test_engagement_floor_range() {
        let config = TargetingConfig {
            low_engagement_floor: 101,
            ..TargetingConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
