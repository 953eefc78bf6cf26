//! Send admission control.
//!
//! The rate limiter answers "may I send to this recipient now?" from the
//! trailing 24 hours of the send log, the sending-hours policy and the
//! sender's reputation, and records what was actually sent.
//!
//! Checks are evaluated in a fixed order and the first violated one wins:
//! sending hours, global daily cap, global hourly cap, per-domain hourly cap,
//! per-domain daily cap, then the adaptive minimum delay since the last send.

use crate::application::config::RateLimitConfig;
use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, Ledger, SendLogScan};
use crate::application::stats::{
    percent, DomainUsage, QuotaUsage, ReputationSummary, SendStats, TimingStats,
};
use crate::domain::decision::Admission;
use crate::domain::hours::SendingHours;
use crate::domain::record::{ceil_seconds, domain_of, SendRecord, SendWindow, RETENTION_HOURS};
use crate::domain::reputation::ReputationState;
use crate::domain::schedule::{plan_schedule, ScheduleRequest, ScheduleSuggestion};
use crate::error::{ConfigError, LedgerError};
use crate::infrastructure::clock::SystemClock;
use chrono::{Duration, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Utilisation (of the hourly caps) above which delays are stretched.
const NEAR_LIMIT_RATIO: f64 = 0.8;
/// Delay factor once the global hourly cap is nearly used up.
const HOURLY_PRESSURE_FACTOR: f64 = 1.5;
/// Delay factor once the domain hourly cap is nearly used up.
const DOMAIN_PRESSURE_FACTOR: f64 = 2.0;
/// Delay factor while reputation is degraded.
const LOW_REPUTATION_FACTOR: f64 = 1.3;
/// Relative jitter applied to delays.
const JITTER: f64 = 0.2;
/// Longest single sleep in [`RateLimiter::wait_if_needed`].
const WAIT_CHUNK_SECONDS: u64 = 30;
/// Domain used when planning without a concrete recipient.
const GENERIC_DOMAIN: &str = "generic";
/// Domains listed in [`DomainUsage::top_domains`].
const TOP_DOMAINS: usize = 5;

#[derive(Debug, Default)]
struct LimiterState {
    window: SendWindow,
    last_send: Option<NaiveDateTime>,
    reputation: ReputationState,
}

/// Multi-tier rate limiter with reputation-driven backoff.
///
/// Reads (`can_send_now`, `get_stats`, `suggest_schedule`) share a read lock
/// and see a consistent snapshot. Mutations hold the write lock across the
/// in-memory update and the ledger write.
///
/// # Example
///
/// ```
/// use outreach_throttle::{ManualClock, MemoryLedger, RateLimiter};
/// use chrono::NaiveDate;
/// use std::sync::Arc;
///
/// // A Tuesday morning
/// let start = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(9, 0, 0).unwrap();
/// let limiter = RateLimiter::builder(Arc::new(MemoryLedger::new()))
///     .with_max_hourly(2)
///     .with_clock(Arc::new(ManualClock::new(start)))
///     .with_seed(7)
///     .build()
///     .unwrap();
///
/// assert!(limiter.can_send_now("alice@example.com", true).allowed);
/// limiter.record_send("alice@example.com", "launch", true).unwrap();
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    ledger: Arc<dyn Ledger>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    metrics: Metrics,
    state: RwLock<LimiterState>,
}

impl RateLimiter {
    /// Start building a limiter persisting to `ledger`.
    pub fn builder(ledger: Arc<dyn Ledger>) -> RateLimiterBuilder {
        RateLimiterBuilder::new(ledger)
    }

    /// Effective configuration.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Decision counters.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Decide whether a message to `recipient` may be sent now.
    ///
    /// `respect_time` enables the sending-hours check (which is skipped
    /// regardless when the configuration turns time-awareness off).
    pub fn can_send_now(&self, recipient: &str, respect_time: bool) -> Admission {
        let now = self.clock.now();
        let admission = {
            let state = self.read_state();
            self.evaluate(&state, recipient, respect_time, now)
        };

        self.metrics.record_admission(admission.allowed);
        if !admission.allowed {
            debug!(
                recipient,
                reason = %admission.reason,
                wait_seconds = ?admission.wait_seconds,
                "Send denied"
            );
        }
        admission
    }

    /// Block until a send to `recipient` is allowed, if that takes at most
    /// `max_wait`.
    ///
    /// Returns `true` when the caller may send now: either immediately, or
    /// after sleeping on the clock for the suggested wait. Returns `false`
    /// without sleeping when the denial has no wait hint or the hint exceeds
    /// `max_wait`. The sleep is not re-validated and cannot be cancelled;
    /// callers needing cancellation should poll [`can_send_now`](Self::can_send_now).
    pub fn wait_if_needed(
        &self,
        recipient: &str,
        max_wait: std::time::Duration,
        respect_time: bool,
    ) -> bool {
        let admission = self.can_send_now(recipient, respect_time);
        if admission.allowed {
            return true;
        }

        let wait = match admission.wait_seconds {
            Some(wait) if wait > 0 && wait <= max_wait.as_secs() => wait,
            _ => {
                info!(recipient, reason = %admission.reason, "Cannot send");
                return false;
            }
        };

        info!(recipient, wait_seconds = wait, reason = %admission.reason, "Waiting before send");
        let mut remaining = wait;
        while remaining > 0 {
            let chunk = remaining.min(WAIT_CHUNK_SECONDS);
            self.clock.sleep(std::time::Duration::from_secs(chunk));
            remaining -= chunk;
            if remaining > 0 && wait > 2 * WAIT_CHUNK_SECONDS {
                debug!(recipient, remaining_seconds = remaining, "Still waiting");
            }
        }
        true
    }

    /// Record a send attempt.
    ///
    /// The in-memory window and reputation are updated first; a ledger
    /// failure is logged and returned without rolling them back.
    ///
    /// # Errors
    /// Returns the ledger error if the record or the reputation checkpoint
    /// could not be written.
    pub fn record_send(
        &self,
        recipient: &str,
        campaign_id: &str,
        success: bool,
    ) -> Result<(), LedgerError> {
        let now = self.clock.now();
        let record = SendRecord::new(now, recipient, campaign_id, success);

        let mut state = self.write_state();
        state.window.push(record.clone());
        state.window.expire_before(now - Duration::hours(RETENTION_HOURS));
        state.last_send = Some(state.last_send.map_or(now, |last| last.max(now)));
        state.reputation.record_send(success, now);

        debug!(
            recipient,
            domain = %record.domain,
            campaign_id,
            success,
            score = state.reputation.score(),
            "Send recorded"
        );

        let result = self
            .ledger
            .append_send(&record)
            .and_then(|()| self.ledger.save_reputation(&state.reputation));
        self.persisted("record_send", result)
    }

    /// Record a bounce reported after the fact.
    ///
    /// # Errors
    /// Returns the ledger error if the reputation checkpoint could not be
    /// written; the in-memory counter is kept.
    pub fn record_bounce(&self, recipient: &str) -> Result<(), LedgerError> {
        let now = self.clock.now();
        let mut state = self.write_state();
        state.reputation.record_bounce(now);
        info!(
            recipient,
            bounces = state.reputation.bounces(),
            score = state.reputation.score(),
            "Bounce recorded"
        );
        let result = self.ledger.save_reputation(&state.reputation);
        self.persisted("record_bounce", result)
    }

    /// Record a spam complaint.
    ///
    /// # Errors
    /// Returns the ledger error if the reputation checkpoint could not be
    /// written; the in-memory counter is kept.
    pub fn record_complaint(&self, recipient: &str) -> Result<(), LedgerError> {
        let now = self.clock.now();
        let mut state = self.write_state();
        state.reputation.record_complaint(now);
        warn!(
            recipient,
            complaints = state.reputation.complaints(),
            score = state.reputation.score(),
            "Complaint recorded"
        );
        let result = self.ledger.save_reputation(&state.reputation);
        self.persisted("record_complaint", result)
    }

    /// Adaptive delay, in seconds, before the next send to `domain`.
    ///
    /// Starts from the minimum delay and stretches it when the hourly caps
    /// are nearly used up or reputation is degraded, then applies jitter and
    /// clamps to the configured range. Each step truncates to whole seconds.
    pub fn optimal_delay(&self, domain: &str) -> u64 {
        let now = self.clock.now();
        let state = self.read_state();
        self.delay_for(&state, domain, now)
    }

    /// Current reputation.
    pub fn reputation(&self) -> ReputationState {
        self.read_state().reputation.clone()
    }

    /// Usage, reputation and timing snapshot.
    pub fn get_stats(&self) -> SendStats {
        let now = self.clock.now();
        let state = self.read_state();
        let hourly = state.window.count_within(now, Duration::hours(1)) as u64;
        let daily = state.window.count_within(now, Duration::hours(RETENTION_HOURS)) as u64;

        let today = now.date();
        let mut per_domain: HashMap<&str, u64> = HashMap::new();
        for record in state.window.iter().filter(|r| r.timestamp.date() == today) {
            *per_domain.entry(record.domain.as_str()).or_default() += 1;
        }
        let contacted_today = per_domain.len();
        let mut top_domains: Vec<(String, u64)> = per_domain
            .into_iter()
            .map(|(domain, count)| (domain.to_string(), count))
            .collect();
        top_domains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_domains.truncate(TOP_DOMAINS);

        let rep = &state.reputation;
        SendStats {
            hourly: QuotaUsage::new(hourly, u64::from(self.config.max_hourly)),
            daily: QuotaUsage::new(daily, u64::from(self.config.max_daily)),
            domains: DomainUsage {
                contacted_today,
                top_domains,
            },
            reputation: ReputationSummary {
                score: rep.score(),
                total_sent: rep.total_sent(),
                successful_sends: rep.successful_sends(),
                bounces: rep.bounces(),
                complaints: rep.complaints(),
                bounce_rate_percent: percent(rep.bounces(), rep.total_sent()),
            },
            timing: TimingStats {
                last_send: state.last_send,
                good_time_to_send: self.is_good_time(now),
            },
        }
    }

    /// Suggest how to send `total_emails` messages.
    pub fn suggest_schedule(&self, total_emails: u64) -> ScheduleSuggestion {
        self.schedule(total_emails, None)
    }

    /// Suggest how to send a batch broken down by recipient domain.
    ///
    /// Besides the global daily cap, no domain may receive more than the
    /// per-domain daily cap on any day, so domain-heavy batches may need
    /// more days than their size alone suggests.
    pub fn suggest_schedule_for_domains(
        &self,
        domain_counts: &BTreeMap<String, u64>,
    ) -> ScheduleSuggestion {
        let total = domain_counts.values().sum();
        self.schedule(total, Some(domain_counts))
    }

    fn schedule(
        &self,
        total_emails: u64,
        domain_counts: Option<&BTreeMap<String, u64>>,
    ) -> ScheduleSuggestion {
        let now = self.clock.now();
        let state = self.read_state();
        let daily = state.window.count_within(now, Duration::hours(RETENTION_HOURS)) as u64;
        let max_daily = u64::from(self.config.max_daily);

        let request = ScheduleRequest {
            total_emails,
            remaining_today: max_daily.saturating_sub(daily),
            max_daily,
            max_per_domain_daily: u64::from(self.config.max_per_domain_daily),
            delay_seconds: self.delay_for(&state, GENERIC_DOMAIN, now),
            seconds_until_cutoff: (self.config.sending_hours.closing_today(now) - now)
                .num_seconds(),
            start_immediately: self.is_good_time(now),
            domain_counts,
        };
        plan_schedule(&request)
    }

    fn evaluate(
        &self,
        state: &LimiterState,
        recipient: &str,
        respect_time: bool,
        now: NaiveDateTime,
    ) -> Admission {
        let config = &self.config;

        if respect_time && config.time_aware {
            let verdict = config.sending_hours.check(now);
            if !verdict.is_open() {
                return Admission::deny(
                    verdict.reason(&config.sending_hours),
                    verdict.wait_seconds(),
                );
            }
        }

        let day = Duration::hours(RETENTION_HOURS);
        let hour = Duration::hours(1);

        if state.window.count_within(now, day) >= config.max_daily as usize {
            return Admission::deny(format!("Daily limit reached ({})", config.max_daily), None);
        }

        if state.window.count_within(now, hour) >= config.max_hourly as usize {
            return Admission::deny(
                format!("Hourly limit reached ({})", config.max_hourly),
                state.window.seconds_until_rollout(None, now, hour),
            );
        }

        let domain = domain_of(recipient);
        if state.window.count_domain_within(&domain, now, hour)
            >= config.max_per_domain_hourly as usize
        {
            return Admission::deny(
                format!(
                    "Domain hourly limit for {domain} ({})",
                    config.max_per_domain_hourly
                ),
                state.window.seconds_until_rollout(Some(&domain), now, hour),
            );
        }

        if state.window.count_domain_within(&domain, now, day)
            >= config.max_per_domain_daily as usize
        {
            return Admission::deny(
                format!(
                    "Domain daily limit for {domain} ({})",
                    config.max_per_domain_daily
                ),
                None,
            );
        }

        if let Some(last) = state.last_send {
            let delay = self.delay_for(state, &domain, now);
            let remaining = Duration::seconds(i64::try_from(delay).unwrap_or(i64::MAX))
                - (now - last);
            if remaining > Duration::zero() {
                let wait = ceil_seconds(remaining) + 1;
                return Admission::deny(format!("Minimum delay ({delay}s)"), Some(wait));
            }
        }

        Admission::allow()
    }

    fn delay_for(&self, state: &LimiterState, domain: &str, now: NaiveDateTime) -> u64 {
        let config = &self.config;
        let hour = Duration::hours(1);
        let mut delay = config.min_delay_seconds;

        let hourly = state.window.count_within(now, hour) as f64;
        if hourly >= f64::from(config.max_hourly) * NEAR_LIMIT_RATIO {
            delay = scale(delay, HOURLY_PRESSURE_FACTOR);
        }

        let domain_hourly = state.window.count_domain_within(domain, now, hour) as f64;
        if domain_hourly >= f64::from(config.max_per_domain_hourly) * NEAR_LIMIT_RATIO {
            delay = scale(delay, DOMAIN_PRESSURE_FACTOR);
        }

        if state.reputation.is_degraded() {
            delay = scale(delay, LOW_REPUTATION_FACTOR);
        }

        if config.jitter {
            let base = delay as f64;
            let variance = base * JITTER;
            let jittered = self
                .rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .gen_range(base - variance..=base + variance);
            delay = jittered.max(0.0) as u64;
        }

        delay.clamp(config.min_delay_seconds, config.max_delay_seconds)
    }

    fn is_good_time(&self, now: NaiveDateTime) -> bool {
        !self.config.time_aware || self.config.sending_hours.check(now).is_open()
    }

    fn persisted(
        &self,
        operation: &'static str,
        result: Result<(), LedgerError>,
    ) -> Result<(), LedgerError> {
        if let Err(error) = &result {
            self.metrics.record_persist_failure();
            warn!(operation, %error, "Failed to persist rate limiter state; in-memory state kept");
        }
        result
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LimiterState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LimiterState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn scale(delay: u64, factor: f64) -> u64 {
    (delay as f64 * factor) as u64
}

/// Builder for [`RateLimiter`].
///
/// Every limit defaults to [`RateLimitConfig::default`]; the clock defaults
/// to [`SystemClock`] and the jitter source to an entropy-seeded `StdRng`.
#[derive(Debug)]
pub struct RateLimiterBuilder {
    config: RateLimitConfig,
    ledger: Arc<dyn Ledger>,
    clock: Option<Arc<dyn Clock>>,
    rng: Option<StdRng>,
    metrics: Option<Metrics>,
}

impl RateLimiterBuilder {
    fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            config: RateLimitConfig::default(),
            ledger,
            clock: None,
            rng: None,
            metrics: None,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: RateLimitConfig) -> Self {
        self.config = config;
        self
    }

    /// Sends allowed per rolling hour.
    pub fn with_max_hourly(mut self, max: u32) -> Self {
        self.config.max_hourly = max;
        self
    }

    /// Sends allowed per rolling 24 hours.
    pub fn with_max_daily(mut self, max: u32) -> Self {
        self.config.max_daily = max;
        self
    }

    /// Sends to one domain allowed per rolling hour.
    pub fn with_max_per_domain_hourly(mut self, max: u32) -> Self {
        self.config.max_per_domain_hourly = max;
        self
    }

    /// Sends to one domain allowed per rolling 24 hours.
    pub fn with_max_per_domain_daily(mut self, max: u32) -> Self {
        self.config.max_per_domain_daily = max;
        self
    }

    /// Range of the adaptive delay between sends (whole seconds).
    pub fn with_delay_range(mut self, min: std::time::Duration, max: std::time::Duration) -> Self {
        self.config.min_delay_seconds = min.as_secs();
        self.config.max_delay_seconds = max.as_secs();
        self
    }

    /// Enable or disable ±20% delay jitter.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.config.jitter = enabled;
        self
    }

    /// Enable or disable the sending-hours policy.
    pub fn with_time_aware(mut self, enabled: bool) -> Self {
        self.config.time_aware = enabled;
        self
    }

    /// Custom sending hours.
    pub fn with_sending_hours(mut self, hours: SendingHours) -> Self {
        self.config.sending_hours = hours;
        self
    }

    /// Clock used for every timestamp and sleep.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Jitter source.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Some(rng);
        self
    }

    /// Deterministic jitter source seeded with `seed`.
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    /// Share decision counters with other components.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the configuration and load persisted state.
    ///
    /// Unreadable send logs or reputation checkpoints are logged and
    /// replaced by empty state.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is inconsistent.
    pub fn build(self) -> Result<RateLimiter, ConfigError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let now = clock.now();
        let state = load_state(self.ledger.as_ref(), now);

        info!(
            max_hourly = self.config.max_hourly,
            max_daily = self.config.max_daily,
            max_per_domain_hourly = self.config.max_per_domain_hourly,
            max_per_domain_daily = self.config.max_per_domain_daily,
            min_delay_seconds = self.config.min_delay_seconds,
            max_delay_seconds = self.config.max_delay_seconds,
            recent_sends = state.window.len(),
            reputation = state.reputation.score(),
            "Rate limiter initialized"
        );

        Ok(RateLimiter {
            config: self.config,
            ledger: self.ledger,
            clock,
            rng: Mutex::new(self.rng.unwrap_or_else(StdRng::from_entropy)),
            metrics: self.metrics.unwrap_or_default(),
            state: RwLock::new(state),
        })
    }
}

fn load_state(ledger: &dyn Ledger, now: NaiveDateTime) -> LimiterState {
    let scan = ledger
        .scan_sends(now - Duration::hours(RETENTION_HOURS))
        .unwrap_or_else(|error| {
            warn!(%error, "Failed to load send history; starting empty");
            SendLogScan::default()
        });

    let reputation = match ledger.load_reputation() {
        Ok(Some(reputation)) => reputation.normalized(),
        Ok(None) => ReputationState::new(),
        Err(error) => {
            warn!(%error, "Failed to load sender reputation; starting fresh");
            ReputationState::new()
        }
    };

    LimiterState {
        window: SendWindow::from_records(scan.recent),
        last_send: scan.last_send,
        reputation,
    }
}
