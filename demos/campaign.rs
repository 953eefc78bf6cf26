//! Dry run of a small outreach campaign.
//!
//! Walks a candidate list through targeting and rate limiting the way a
//! sender would, using a simulated clock so waits finish instantly. State
//! is written to a temporary tracking directory.
//!
//! Run with `RUST_LOG=outreach_throttle=debug cargo run --example campaign`
//! to see every denial.

use chrono::NaiveDate;
use outreach_throttle::{
    Clock, FileLedger, ManualClock, RateLimiter, ResponseType, TargetingOptimizer,
};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CAMPAIGN: &str = "spring-launch";

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let tracking = tempfile::tempdir()?;
    let ledger = Arc::new(FileLedger::open(tracking.path())?);
    let start = NaiveDate::from_ymd_opt(2024, 3, 5)
        .and_then(|d| d.and_hms_opt(8, 55, 0))
        .ok_or("invalid start time")?;
    let clock = Arc::new(ManualClock::new(start));

    let limiter = RateLimiter::builder(ledger.clone())
        .with_max_hourly(6)
        .with_max_daily(20)
        .with_clock(clock.clone())
        .with_seed(42)
        .build()?;
    let targeting = TargetingOptimizer::builder(ledger)
        .with_clock(clock.clone())
        .with_metrics(limiter.metrics().clone())
        .build()?;

    // History from an earlier campaign
    targeting.record_contact("old.friend@acme.io", "winter")?;
    targeting.record_response("old.friend@acme.io", ResponseType::Interested)?;
    targeting.record_response("gone@acme.io", ResponseType::Bounced)?;
    targeting.record_response("nope@globex.com", "opted_out".parse()?)?;

    let candidates: Vec<String> = ["old.friend@acme.io", "gone@acme.io", "nope@globex.com", ""]
        .into_iter()
        .map(str::to_string)
        .chain((0..12).map(|i| {
            let domain = ["acme.io", "globex.com", "initech.com"][i % 3];
            format!("lead{i}@{domain}")
        }))
        .collect();

    println!("=== Targeting ===\n");
    let selection = targeting.filter_contacts(candidates, CAMPAIGN, 0);
    for skipped in &selection.skipped {
        println!("  skip {:<22} {}", skipped.contact, skipped.reason);
    }
    let filter_stats = selection.stats();
    println!(
        "\n{} of {} candidates selected ({:.0}%)\n",
        filter_stats.targeted, filter_stats.total, filter_stats.targeting_rate_percent
    );

    println!("=== Schedule ===\n");
    let suggestion = limiter.suggest_schedule(selection.targeted.len() as u64);
    println!("  {}\n", suggestion.recommendation());

    println!("=== Sending ===\n");
    for target in &selection.targeted {
        let email = &target.contact;
        if !limiter.wait_if_needed(email, Duration::from_secs(2 * 3600), true) {
            println!("  gave up on {email}");
            continue;
        }

        // A real sender would hand the message to its transport here.
        let delivered = !email.starts_with("lead7@");

        limiter.record_send(email, CAMPAIGN, delivered)?;
        targeting.record_contact(email, CAMPAIGN)?;
        if !delivered {
            limiter.record_bounce(email)?;
            targeting.record_response(email, ResponseType::Bounced)?;
        }
        println!(
            "  {} {email} (engagement {})",
            clock.now().format("%H:%M:%S"),
            target.engagement_score
        );
    }

    println!("\n=== Stats ===\n");
    println!("{}", serde_json::to_string_pretty(&limiter.get_stats())?);
    println!("{}", serde_json::to_string_pretty(&targeting.summary())?);
    println!("{}", serde_json::to_string_pretty(&limiter.metrics().snapshot())?);

    Ok(())
}
