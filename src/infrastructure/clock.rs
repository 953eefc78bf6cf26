//! Clock adapters for time operations.
//!
//! Provides [`SystemClock`] for production use and [`ManualClock`] for
//! simulations, dry runs and tests.

use crate::application::ports::Clock;
use chrono::{Local, NaiveDateTime};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// System clock reading local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock.
///
/// Time only moves when [`advance`](ManualClock::advance) or
/// [`set`](ManualClock::set) is called, or when a component sleeps on it:
/// [`Clock::sleep`] advances the clock instead of blocking.
///
/// # Examples
///
/// ```
/// use outreach_throttle::{Clock, ManualClock};
/// use chrono::NaiveDate;
/// use std::time::Duration;
///
/// let start = NaiveDate::from_ymd_opt(2024, 3, 5)
///     .unwrap()
///     .and_hms_opt(9, 0, 0)
///     .unwrap();
/// let clock = ManualClock::new(start);
///
/// clock.advance(Duration::from_secs(90));
/// assert_eq!(clock.now(), start + chrono::Duration::seconds(90));
///
/// // Sleeping moves virtual time forward immediately
/// clock.sleep(Duration::from_secs(30));
/// assert_eq!(clock.now(), start + chrono::Duration::minutes(2));
/// ```
///
/// # Thread Safety
///
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current_time: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    /// Create a clock starting at `start`.
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let delta = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        let mut time = self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *time = time.checked_add_signed(delta).unwrap_or(*time);
    }

    /// Set the clock to a specific time.
    pub fn set(&self, time: NaiveDateTime) {
        *self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.now();

        assert!(t2 > t1);
    }

    #[test]
    fn test_manual_clock() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(10));

        let later = start + chrono::Duration::hours(5);
        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let clock = ManualClock::new(start);
        let clone = clock.clone();

        let handle = std::thread::spawn(move || {
            clone.sleep(Duration::from_secs(5));
        });
        handle.join().unwrap();

        assert_eq!(clock.now(), start + chrono::Duration::seconds(5));
    }
}
