//! Next-valid-time search.
//!
//! Time is stepped forward by a fixed increment from a starting instant until
//! the job's constraints flip to the requested state. With twilight enforced,
//! daytime is skipped in one jump to the next dusk.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use super::{CacheLookup, CompletionCondition, SchedulerJob, StartupCondition};
use crate::constraints::{self, ConstraintViolation, NightWindow};

/// How far in the past, in seconds, a START_AT time may lie and still be honoured.
pub const START_AT_TOLERANCE_SECS: i64 = 500;

/// Result of [`SchedulerJob::calculate_next_time`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub time: DateTime<Utc>,
    /// Why constraints fail at `time`, when searching for a violation.
    pub violation: Option<ConstraintViolation>,
}

/// Why a job has to stop.
#[derive(Debug, Clone, PartialEq)]
pub enum EndReason {
    Constraint(ConstraintViolation),
    /// The job's FINISH_AT time.
    CompletionTime,
    /// Nothing stops the job within the searched window.
    SearchLimit,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Constraint(v) => write!(f, "{v}"),
            EndReason::CompletionTime => f.write_str("job end time"),
            EndReason::SearchLimit => f.write_str("end of search window"),
        }
    }
}

/// Result of [`SchedulerJob::next_end_time`].
#[derive(Debug, Clone, PartialEq)]
pub struct EndTime {
    pub time: DateTime<Utc>,
    pub reason: EndReason,
}

impl SchedulerJob {
    /// Step from `when` until constraints are met (`check_met`) or violated.
    ///
    /// `increment_minutes` is raised to at least one minute. Without `until`
    /// the search looks one search horizon ahead. Returns `None` when nothing
    /// is found in `[when, until]`, or when the job is no longer a candidate.
    pub fn calculate_next_time(
        &self,
        when: DateTime<Utc>,
        check_met: bool,
        increment_minutes: u32,
        until: Option<DateTime<Utc>>,
    ) -> Option<SearchHit> {
        if !self.is_candidate() {
            return None;
        }
        let increment = Duration::minutes(i64::from(increment_minutes.max(1)));
        let until = until.unwrap_or(when + self.search_horizon());
        if when >= until {
            return None;
        }

        let ctx = self.context().as_ref();
        let enforce_twilight = self.constraints().enforce_twilight;
        let mut night: Option<NightWindow> = None;
        let mut t = when;

        while t <= until {
            let mut twilight_violation = None;
            if enforce_twilight {
                let window = match night {
                    Some(w) if t < w.boundary => w,
                    _ => {
                        let w = constraints::night_window(ctx, t);
                        night = Some(w);
                        w
                    }
                };
                if !window.is_night {
                    if check_met {
                        match window.next_possible_success {
                            Some(dusk) if dusk > t => {
                                t = dusk;
                                continue;
                            }
                            _ => {}
                        }
                    } else {
                        return Some(SearchHit {
                            time: t,
                            violation: Some(ConstraintViolation::OutsideAstronomicalNight),
                        });
                    }
                    twilight_violation = Some(ConstraintViolation::OutsideAstronomicalNight);
                }
            }

            let position = ctx.horizontal_at(self.target(), t);
            let verdict = constraints::satisfies_sky_constraints(
                self.constraints(),
                ctx,
                self.target(),
                t,
                &position,
            )
            .and_then(|()| match twilight_violation.take() {
                Some(v) => Err(v),
                None => Ok(()),
            });

            if verdict.is_ok() == check_met {
                return Some(SearchHit {
                    time: t,
                    violation: verdict.err(),
                });
            }
            t += increment;
        }

        None
    }

    /// Earliest time at or after `when` the job may start, before `until`.
    ///
    /// Non-running queries are memoised. A running job also needs its
    /// constraints to hold for the whole estimated duration.
    pub fn next_possible_start_time(
        &self,
        when: DateTime<Utc>,
        increment_minutes: u32,
        running_job: bool,
        until: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        if !self.is_candidate() {
            return None;
        }

        let mut from = when;
        if self.file_startup_condition() == StartupCondition::At {
            if let Some(start_at) = self.file_startup_time() {
                if !running_job && start_at < when - Duration::seconds(START_AT_TOLERANCE_SECS) {
                    return None;
                }
                if start_at > when {
                    from = start_at;
                }
            }
        }

        let mut until = until.unwrap_or(when + self.search_horizon());
        if self.completion_condition() == CompletionCondition::At {
            if let Some(finish_at) = self.completion_time() {
                if finish_at < when {
                    return None;
                }
                until = until.min(finish_at);
            }
        }
        if from >= until {
            return None;
        }

        if running_job {
            return self.next_window_long_enough(from, increment_minutes, until);
        }

        match self.cache().check(from, until) {
            CacheLookup::Hit { result, .. } => result,
            CacheLookup::Miss { resume_from } => {
                let search_from = resume_from.map_or(from, |r| r.max(from));
                let result = self
                    .calculate_next_time(search_from, true, increment_minutes, Some(until))
                    .map(|hit| hit.time);
                log::debug!(
                    "Job '{}' next start from {} until {}: {:?}",
                    self.name(),
                    from,
                    until,
                    result
                );
                self.cache().add(from, until, result);
                result
            }
        }
    }

    /// First start in `[from, until]` whose window stays open for the whole
    /// estimated duration. Windows that are too short are skipped.
    fn next_window_long_enough(
        &self,
        from: DateTime<Utc>,
        increment_minutes: u32,
        until: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let increment = Duration::minutes(i64::from(increment_minutes.max(1)));
        let required = self.estimated_time().filter(|d| *d > Duration::zero());
        let mut search_from = from;

        loop {
            let start = self
                .calculate_next_time(search_from, true, increment_minutes, Some(until))?
                .time;
            let Some(required) = required else {
                return Some(start);
            };

            // The instant the job would finish need not be observable.
            let last_step = start + required - increment;
            match self.calculate_next_time(start, false, increment_minutes, Some(last_step)) {
                None => return Some(start),
                Some(stop) => {
                    log::debug!(
                        "Job '{}' cannot run {} min from {}, window closes at {}: {:?}",
                        self.name(),
                        required.num_minutes(),
                        start,
                        stop.time,
                        stop.violation
                    );
                    search_from = stop.time;
                }
            }
        }
    }

    /// First time at or after `start` the job has to stop.
    ///
    /// Returns `until` (or the FINISH_AT time, whichever is earlier) when
    /// constraints hold all along, and `None` when the window is empty or the
    /// job is no longer a candidate.
    pub fn next_end_time(
        &self,
        start: DateTime<Utc>,
        increment_minutes: u32,
        until: Option<DateTime<Utc>>,
    ) -> Option<EndTime> {
        if !self.is_candidate() {
            return None;
        }
        let mut until = until.unwrap_or(start + self.search_horizon());
        let mut limit = EndReason::SearchLimit;
        if self.completion_condition() == CompletionCondition::At {
            if let Some(finish_at) = self.completion_time() {
                if finish_at <= until {
                    until = finish_at;
                    limit = EndReason::CompletionTime;
                }
            }
        }
        if start >= until {
            return None;
        }

        let end = match self.calculate_next_time(start, false, increment_minutes, Some(until)) {
            Some(SearchHit {
                time,
                violation: Some(violation),
            }) => EndTime {
                time,
                reason: EndReason::Constraint(violation),
            },
            Some(SearchHit { time, violation: None }) => EndTime { time, reason: limit },
            None => EndTime { time: until, reason: limit },
        };
        Some(end)
    }

    /// Classify `time` (or the startup time, or now) against astronomical night.
    pub fn runs_during_astronomical_night(&self, time: Option<DateTime<Utc>>) -> NightWindow {
        let when = time
            .or(self.startup_time())
            .unwrap_or_else(|| self.context().now());
        constraints::night_window(self.context().as_ref(), when)
    }
}
