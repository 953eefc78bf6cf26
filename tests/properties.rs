use chrono::{NaiveDate, NaiveDateTime};
use outreach_throttle::{
    ContactStatus, ManualClock, MemoryLedger, RateLimiter, ResponseType, Suppressions,
    TargetingOptimizer,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn tuesday_morning() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 5)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
}

fn response() -> impl Strategy<Value = ResponseType> {
    prop_oneof![
        Just(ResponseType::Replied),
        Just(ResponseType::Interested),
        Just(ResponseType::NotInterested),
        Just(ResponseType::OptedOut),
        Just(ResponseType::Bounced),
        Just(ResponseType::SpamComplaint),
        Just(ResponseType::ClickedLink),
    ]
}

#[derive(Debug, Clone)]
enum Event {
    Contact(u8),
    Respond(ResponseType),
    Wait(u16),
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        (0u8..6).prop_map(Event::Contact),
        response().prop_map(Event::Respond),
        (1u16..200).prop_map(Event::Wait),
    ]
}

fn optimizer(clock: &ManualClock) -> TargetingOptimizer {
    TargetingOptimizer::builder(Arc::new(MemoryLedger::new()))
        .with_max_lifetime_contacts(100)
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn quotas_hold_when_admission_is_respected(
        steps in prop::collection::vec((0usize..4, 1u64..900), 1..120),
        max_hourly in 1u32..8,
        extra_daily in 0u32..10,
    ) {
        let clock = Arc::new(ManualClock::new(tuesday_morning()));
        let limiter = RateLimiter::builder(Arc::new(MemoryLedger::new()))
            .with_max_hourly(max_hourly)
            .with_max_daily(max_hourly + extra_daily)
            .with_max_per_domain_hourly(max_hourly)
            .with_max_per_domain_daily(max_hourly + extra_daily)
            .with_clock(clock.clone())
            .with_time_aware(false)
            .with_seed(9)
            .build()
            .unwrap();

        for (domain, gap) in steps {
            let recipient = format!("user@d{domain}.com");
            if limiter.can_send_now(&recipient, false).allowed {
                limiter.record_send(&recipient, "prop", true).unwrap();
            }
            let stats = limiter.get_stats();
            prop_assert!(stats.hourly.sent <= u64::from(max_hourly));
            prop_assert!(stats.daily.sent <= u64::from(max_hourly + extra_daily));
            clock.advance(Duration::from_secs(gap));
        }
    }

    #[test]
    fn reputation_score_stays_in_range(
        outcomes in prop::collection::vec((any::<bool>(), 0u8..3), 0..60),
    ) {
        let limiter = RateLimiter::builder(Arc::new(MemoryLedger::new()))
            .with_clock(Arc::new(ManualClock::new(tuesday_morning())))
            .build()
            .unwrap();

        for (success, extra) in outcomes {
            limiter.record_send("a@x.com", "prop", success).unwrap();
            match extra {
                1 => limiter.record_bounce("a@x.com").unwrap(),
                2 => limiter.record_complaint("a@x.com").unwrap(),
                _ => {}
            }
            let score = limiter.reputation().score();
            prop_assert!((0.0..=100.0).contains(&score));
        }
    }

    #[test]
    fn contact_count_never_decreases(events in prop::collection::vec(event(), 0..40)) {
        let clock = ManualClock::new(tuesday_morning());
        let optimizer = optimizer(&clock);
        let mut previous = 0;

        for event in events {
            match event {
                Event::Contact(c) => optimizer.record_contact("p@x.com", &format!("c{c}")).unwrap(),
                Event::Respond(r) => optimizer.record_response("p@x.com", r).unwrap(),
                Event::Wait(days) => clock.advance(Duration::from_secs(86_400 * u64::from(days))),
            }
            let count = optimizer.contact_report("p@x.com").contact_count;
            prop_assert!(count >= previous);
            previous = count;
        }
    }

    #[test]
    fn absorbing_outcomes_are_permanent(events in prop::collection::vec(event(), 0..40)) {
        let clock = ManualClock::new(tuesday_morning());
        let ledger = MemoryLedger::new();
        let optimizer = TargetingOptimizer::builder(Arc::new(ledger.clone()))
            .with_max_lifetime_contacts(100)
            .with_clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        let mut seen = Suppressions::default();

        for event in events {
            match event {
                Event::Contact(c) => optimizer.record_contact("p@x.com", &format!("c{c}")).unwrap(),
                Event::Respond(r) => {
                    optimizer.record_response("p@x.com", r).unwrap();
                    match r {
                        ResponseType::OptedOut => seen.opted_out = true,
                        ResponseType::Bounced => seen.bounced = true,
                        ResponseType::SpamComplaint => seen.spam_complaint = true,
                        _ => {}
                    }
                }
                Event::Wait(days) => clock.advance(Duration::from_secs(86_400 * u64::from(days))),
            }

            let stored = ledger
                .contacts()
                .get("p@x.com")
                .map(|h| h.suppressions())
                .unwrap_or_default();
            prop_assert_eq!(stored, seen);

            let report = optimizer.contact_report("p@x.com");
            prop_assert_eq!(report.status.is_absorbing(), seen.any());
            if seen.any() {
                prop_assert!(!report.can_contact);
                prop_assert!(!optimizer.should_contact("p@x.com", "fresh").contact);
            }
            if seen.opted_out {
                prop_assert_eq!(report.status, ContactStatus::OptedOut);
            }
        }
    }

    #[test]
    fn should_contact_is_idempotent(events in prop::collection::vec(event(), 0..20)) {
        let clock = ManualClock::new(tuesday_morning());
        let optimizer = optimizer(&clock);
        for event in events {
            match event {
                Event::Contact(c) => optimizer.record_contact("p@x.com", &format!("c{c}")).unwrap(),
                Event::Respond(r) => optimizer.record_response("p@x.com", r).unwrap(),
                Event::Wait(days) => clock.advance(Duration::from_secs(86_400 * u64::from(days))),
            }
        }

        let before = optimizer.contact_report("p@x.com");
        let first = optimizer.should_contact("p@x.com", "c1");
        let second = optimizer.should_contact("p@x.com", "c1");
        prop_assert_eq!(first, second);
        prop_assert_eq!(optimizer.contact_report("p@x.com").contact_count, before.contact_count);
    }
}
