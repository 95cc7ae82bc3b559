//! Observation Planner Binary
//!
//! Loads a scheduler configuration and a JSON list of job records, then prints
//! the next observable window of every job, most urgent first.
//!
//! # Usage
//!
//! ```bash
//! # Plan from now using ./scheduler.toml
//! cargo run --bin obs-plan -- jobs.json
//!
//! # Plan from a fixed instant with an explicit configuration
//! SCHEDULER_CONFIG=site.toml PLAN_FROM=2026-01-15T20:00:00Z \
//!   cargo run --bin obs-plan -- jobs.json
//! ```
//!
//! # Environment Variables
//!
//! - `SCHEDULER_CONFIG`: Configuration file (default: searched as `scheduler.toml`)
//! - `PLAN_FROM`: RFC 3339 start of the plan (default: now)
//! - `PLAN_INCREMENT_MINUTES`: Search step (default: from configuration)
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::fs;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use obs_scheduler::astro::{AstronomicalContext, Ephemeris};
use obs_scheduler::clock::{Clock, ManualClock, SystemClock};
use obs_scheduler::config::SchedulerConfig;
use obs_scheduler::job::{decreasing_altitude_order, JobRecord, SchedulerJob};

fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(false)
        .init();

    let jobs_path = env::args()
        .nth(1)
        .context("usage: obs-plan <jobs.json>")?;

    let config = match env::var("SCHEDULER_CONFIG") {
        Ok(path) => SchedulerConfig::from_file(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        Err(_) => SchedulerConfig::from_default_location().context("loading scheduler.toml")?,
    };

    let clock: Arc<dyn Clock> = match env::var("PLAN_FROM") {
        Ok(from) => {
            let from: DateTime<Utc> = DateTime::parse_from_rfc3339(&from)
                .with_context(|| format!("PLAN_FROM is not RFC 3339: {from}"))?
                .with_timezone(&Utc);
            Arc::new(ManualClock::new(from))
        }
        Err(_) => Arc::new(SystemClock),
    };

    let increment = match env::var("PLAN_INCREMENT_MINUTES") {
        Ok(v) => v
            .parse()
            .with_context(|| format!("PLAN_INCREMENT_MINUTES is not a number: {v}"))?,
        Err(_) => config.search.increment_minutes,
    };

    let ephemeris: Arc<dyn AstronomicalContext> = Arc::new(
        Ephemeris::from_config(&config, clock).context("building the ephemeris")?,
    );
    let now = ephemeris.now();
    info!("Planning from {}", now);

    let content = fs::read_to_string(&jobs_path)
        .with_context(|| format!("reading job list {jobs_path}"))?;
    let records = JobRecord::list_from_json(&content)
        .with_context(|| format!("parsing job list {jobs_path}"))?;

    let mut jobs = Vec::with_capacity(records.len());
    for record in &records {
        match SchedulerJob::from_record(record, ephemeris.clone()) {
            Ok(job) => jobs.push(job.with_search_horizon(config.search.horizon())),
            Err(e) => warn!("Skipping job: {}", e),
        }
    }
    info!("Loaded {} of {} jobs", jobs.len(), records.len());

    for job in &jobs {
        for other in &jobs {
            if job.is_duplicate_of(other) {
                warn!("Job '{}' is listed more than once", job.name());
                break;
            }
        }
    }

    jobs.sort_by(|a, b| decreasing_altitude_order(a, b, Some(now)));

    for job in &jobs {
        let start = job.next_possible_start_time(now, increment, false, None);
        match start {
            Some(start) => {
                let end = job.next_end_time(start, increment, None);
                let (end_time, reason) = match &end {
                    Some(end) => (end.time.to_rfc3339(), end.reason.to_string()),
                    None => ("-".to_string(), "empty window".to_string()),
                };
                println!(
                    "{:<24} {:>25} -> {:>25}  moon score {:>2}  ({})",
                    job.name(),
                    start.to_rfc3339(),
                    end_time,
                    job.moon_separation_score(Some(start)),
                    reason
                );
            }
            None => {
                let why = job
                    .satisfies_constraints_at(now)
                    .err()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "no window in the search horizon".to_string());
                println!("{:<24} not observable ({})", job.name(), why);
            }
        }
    }

    Ok(())
}
