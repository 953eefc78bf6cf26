//! # outreach-throttle
//!
//! Admission control for outbound email campaigns.
//!
//! This crate answers two questions for a program that sends email on its
//! own behalf:
//!
//! - **"May I send to this recipient now?"** The [`RateLimiter`] enforces
//!   global and per-domain caps over rolling hours and days, a sending-hours
//!   policy, and an adaptive delay between sends that grows as quotas fill
//!   up and sender reputation degrades.
//! - **"Should this contact be approached for this campaign at all?"** The
//!   [`TargetingOptimizer`] keeps a permanent history per contact and
//!   suppresses opted-out, bounced and complaining addresses, repeat
//!   approaches for the same campaign, over-contacted people and
//!   disengaged ones.
//!
//! The crate never sends anything itself. The caller asks both components,
//! performs the send through its own transport, and reports the outcome back.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use outreach_throttle::{FileLedger, RateLimiter, TargetingOptimizer};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> outreach_throttle::Result<()> {
//! let ledger = Arc::new(FileLedger::open("tracking")?);
//!
//! let limiter = RateLimiter::builder(ledger.clone())
//!     .with_max_hourly(20)
//!     .with_max_daily(100)
//!     .build()?;
//! let targeting = TargetingOptimizer::builder(ledger).build()?;
//!
//! for email in ["alice@example.com", "bob@example.org"] {
//!     if !targeting.should_contact(email, "spring-launch").contact {
//!         continue;
//!     }
//!     if !limiter.wait_if_needed(email, Duration::from_secs(600), true) {
//!         break;
//!     }
//!
//!     let delivered = true; // send through your transport here
//!
//!     limiter.record_send(email, "spring-launch", delivered)?;
//!     targeting.record_contact(email, "spring-launch")?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Rate Limiting
//!
//! [`RateLimiter::can_send_now`] evaluates, in order, and stops at the first
//! violated rule:
//!
//! | Rule | Default | Wait hint |
//! |------|---------|-----------|
//! | Sending hours | weekdays 08:00-20:00, quiet 12:00-13:00 | until the window opens (none for the quiet hour) |
//! | Global daily cap | 50 per rolling 24h | none |
//! | Global hourly cap | 10 per rolling hour | until the oldest send leaves the hour |
//! | Domain hourly cap | 3 per rolling hour | until the oldest send to the domain leaves the hour |
//! | Domain daily cap | 5 per rolling 24h | none |
//! | Minimum delay | 30-120s, adaptive | until the delay has elapsed |
//!
//! The minimum delay starts at the configured floor and is stretched ×1.5
//! when 80% of the hourly cap is used, ×2 when 80% of the domain's hourly cap
//! is used, and ×1.3 while the reputation score is below 80. Optional ±20%
//! jitter is drawn from an injectable RNG.
//!
//! ### Reputation
//!
//! Every send, bounce and complaint updates a 0-100 reputation score:
//!
//! ```text
//! score = clamp(100 - 50 * bounce_rate - 100 * complaint_rate, 0, 100) * success_rate
//! ```
//!
//! ## Targeting
//!
//! [`TargetingOptimizer::should_contact`] suppresses, in order: opted-out,
//! bounced and spam-complaint contacts (permanently); contacts already
//! approached for the same campaign; contacts at the lifetime cap (3);
//! contacts approached within the minimum gap (90 days); and previously
//! approached contacts whose engagement score is below 20.
//!
//! Opt-out, bounce and spam complaint are **absorbing**: each one reported is
//! kept in the contact's [`Suppressions`] and never cleared, whatever happens
//! afterwards.
//!
//! ## Persistence
//!
//! State lives behind the [`Ledger`] port. [`FileLedger`] keeps it in one
//! directory:
//!
//! - `send_log.jsonl` - append-only send log (only the last 24h are loaded)
//! - `sender_reputation.json` - reputation checkpoint
//! - `contact_history.json` - contact checkpoint
//! - `engagement_scores.json` - engagement score cache
//!
//! Checkpoints are replaced atomically. Unreadable state is logged and
//! replaced with defaults at start-up; failed writes are returned to the
//! caller after the in-memory update has been applied. A single process is
//! assumed to own the directory.
//!
//! [`MemoryLedger`] keeps the same state in memory for dry runs and tests.
//!
//! ## Testing
//!
//! Inject a [`ManualClock`] to control time. Its `sleep` advances the clock
//! instead of blocking, so [`RateLimiter::wait_if_needed`] returns
//! immediately in tests:
//!
//! ```rust
//! use outreach_throttle::{Clock, ManualClock, MemoryLedger, RateLimiter};
//! use chrono::NaiveDate;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let nine_am = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(9, 0, 0).unwrap();
//! let clock = Arc::new(ManualClock::new(nine_am));
//! let limiter = RateLimiter::builder(Arc::new(MemoryLedger::new()))
//!     .with_clock(clock.clone())
//!     .with_jitter(false)
//!     .build()
//!     .unwrap();
//!
//! limiter.record_send("a@example.com", "test", true).unwrap();
//! assert!(limiter.wait_if_needed("b@example.com", Duration::from_secs(60), true));
//! assert_eq!(clock.now(), nine_am + chrono::Duration::seconds(31));
//! ```
//!
//! ## Logging
//!
//! Diagnostics are emitted through `tracing`; install any subscriber to see
//! them. Denials are logged at `debug`, lifecycle events at `info`, load and
//! persist failures at `warn`.

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

pub mod error;

// Re-export commonly used types for convenience
pub use domain::{
    contact::{ContactHistory, ContactStatus, ResponseType, Signals, Suppressions},
    decision::{Admission, TargetingDecision},
    hours::{SendingHours, TimeVerdict},
    record::SendRecord,
    reputation::ReputationState,
    schedule::{DayPlan, ScheduleSuggestion},
};

pub use application::{
    config::{RateLimitConfig, TargetingConfig},
    limiter::{RateLimiter, RateLimiterBuilder},
    metrics::{Metrics, MetricsSnapshot},
    ports::{Clock, Ledger, SendLogScan},
    stats::{
        ContactReport, DomainUsage, QuotaUsage, ReputationSummary, SendStats, TargetingSummary,
        TimingStats,
    },
    targeting::{
        Addressable, FilterResult, FilterStats, Skipped, Targeted, TargetingOptimizer,
        TargetingOptimizerBuilder,
    },
};

pub use infrastructure::{
    clock::{ManualClock, SystemClock},
    ledger::{FileLedger, MemoryLedger},
};

pub use error::{ConfigError, Error, LedgerError, ParseResponseError, Result};
