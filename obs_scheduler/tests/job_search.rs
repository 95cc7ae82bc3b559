//! Integration tests for the next start/end time search.

mod support;

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Duration;
use proptest::prelude::*;
use qtty::Degrees;

use obs_scheduler::constraints::ConstraintViolation;
use obs_scheduler::job::{
    decreasing_altitude_order, EndReason, JobStatus, SchedulerJob, StartupCondition,
};
use support::{jan15, jan16, m31, window_altitude, ScriptedSky};

/// Target above 30° between 21:00 and 03:00, at 10° otherwise.
fn evening_sky() -> Arc<ScriptedSky> {
    ScriptedSky::new(jan15(19, 0))
        .with_altitude(window_altitude(jan15(21, 0), jan16(3, 0), 60.0, 10.0))
        .into_arc()
}

fn job_with_min_altitude(sky: Arc<ScriptedSky>, min_altitude: f64) -> SchedulerJob {
    let mut job = SchedulerJob::new("M31", sky);
    job.set_target(m31());
    job.set_min_altitude(Some(Degrees::new(min_altitude)));
    job
}

#[test]
fn test_start_and_end_follow_altitude_crossings() {
    let job = job_with_min_altitude(evening_sky(), 30.0);

    let start = job.next_possible_start_time(jan15(20, 0), 1, false, None);
    assert_eq!(start, Some(jan15(21, 0)));

    let end = job.next_end_time(jan15(21, 0), 1, None).unwrap();
    assert_eq!(end.time, jan16(3, 0));
    assert_eq!(
        end.reason,
        EndReason::Constraint(ConstraintViolation::BelowMinAltitude {
            altitude: 10.0,
            min_altitude: 30.0
        })
    );
    assert!(end.reason.to_string().contains("minAltitude"));
}

#[test]
fn test_undefined_min_altitude_never_blocks() {
    let sky = ScriptedSky::new(jan15(19, 0))
        .with_altitude(|_| -50.0)
        .into_arc();
    let mut job = SchedulerJob::new("below", sky);
    job.set_min_altitude(Some(Degrees::new(-90.0)));

    assert!(job.satisfies_constraints_at(jan15(22, 0)).is_ok());
    let hit = job.calculate_next_time(jan15(22, 0), true, 1, None).unwrap();
    assert_eq!(hit.time, jan15(22, 0));
    assert!(job.calculate_next_time(jan15(22, 0), false, 1, Some(jan16(2, 0))).is_none());
}

#[test]
fn test_empty_search_window() {
    let job = job_with_min_altitude(evening_sky(), 30.0);
    assert!(job.calculate_next_time(jan15(22, 0), true, 1, Some(jan15(22, 0))).is_none());
    assert!(job.calculate_next_time(jan15(22, 0), true, 1, Some(jan15(21, 0))).is_none());
    assert!(job.next_end_time(jan15(22, 0), 1, Some(jan15(21, 0))).is_none());
}

#[test]
fn test_repeated_query_hits_cache() {
    let sky = evening_sky();
    let job = job_with_min_altitude(sky.clone(), 30.0);
    sky.reset_calls();

    let first = job.next_possible_start_time(jan15(20, 0), 1, false, None);
    assert!(sky.calls() > 0);

    sky.reset_calls();
    let second = job.next_possible_start_time(jan15(20, 0), 1, false, None);
    assert_eq!(first, second);
    assert_eq!(sky.calls(), 0, "cached query must not touch the ephemeris");

    job.clear_cache();
    let third = job.next_possible_start_time(jan15(20, 0), 1, false, None);
    assert_eq!(first, third);
    assert!(sky.calls() > 0);
}

#[test]
fn test_narrower_query_answered_from_cache() {
    let sky = evening_sky();
    let job = job_with_min_altitude(sky.clone(), 30.0);
    job.next_possible_start_time(jan15(20, 0), 1, false, Some(jan16(12, 0)));

    sky.reset_calls();
    let start = job.next_possible_start_time(jan15(20, 30), 1, false, Some(jan16(6, 0)));
    assert_eq!(start, Some(jan15(21, 0)));
    assert_eq!(sky.calls(), 0);
}

#[test]
fn test_changing_constraints_invalidates_cache() {
    let sky = evening_sky();
    let mut job = job_with_min_altitude(sky, 30.0);
    assert_eq!(
        job.next_possible_start_time(jan15(20, 0), 1, false, None),
        Some(jan15(21, 0))
    );
    job.set_min_altitude(Some(Degrees::new(5.0)));
    assert_eq!(
        job.next_possible_start_time(jan15(20, 0), 1, false, None),
        Some(jan15(20, 0))
    );
}

#[test]
fn test_twilight_skips_daytime() {
    let sky = ScriptedSky::new(jan15(12, 0))
        .with_altitude(|_| 60.0)
        .with_twilight(20, 6)
        .into_arc();
    let mut job = SchedulerJob::new("night", sky.clone());
    job.set_enforce_twilight(true);
    sky.reset_calls();

    let hit = job.calculate_next_time(jan15(12, 0), true, 1, None).unwrap();
    assert_eq!(hit.time, jan15(20, 0));
    assert!(sky.calls() <= 4, "daytime should be skipped in one jump");

    let end = job.next_end_time(jan15(21, 0), 1, None).unwrap();
    assert_eq!(end.time, jan16(6, 0));
    assert_eq!(
        end.reason,
        EndReason::Constraint(ConstraintViolation::OutsideAstronomicalNight)
    );
}

#[test]
fn test_night_classification() {
    let sky = ScriptedSky::new(jan15(12, 0))
        .with_twilight(20, 6)
        .with_pre_dawn(Duration::minutes(30))
        .into_arc();
    let job = SchedulerJob::new("night", sky);

    let day = job.runs_during_astronomical_night(Some(jan15(12, 0)));
    assert!(!day.is_night);
    assert_eq!(day.next_possible_success, Some(jan15(20, 0)));

    let night = job.runs_during_astronomical_night(Some(jan15(23, 0)));
    assert!(night.is_night);
    assert_eq!(night.next_possible_success, None);

    // Inside the pre-dawn margin the night is over for scheduling purposes.
    let pre_dawn = job.runs_during_astronomical_night(Some(jan16(5, 45)));
    assert!(!pre_dawn.is_night);
    assert_eq!(pre_dawn.next_possible_success, Some(jan16(20, 0)));
}

#[test]
fn test_start_at_in_the_past() {
    let mut job = job_with_min_altitude(evening_sky(), 30.0);
    job.set_file_startup(StartupCondition::At, Some(jan15(19, 0)));
    assert_eq!(job.next_possible_start_time(jan15(20, 0), 1, false, None), None);
    // A running job ignores the tolerance.
    assert_eq!(
        job.next_possible_start_time(jan15(20, 0), 1, true, None),
        Some(jan15(21, 0))
    );

    // Within 500 s the START_AT time is still honoured.
    job.set_file_startup(StartupCondition::At, Some(jan15(19, 55)));
    assert_eq!(
        job.next_possible_start_time(jan15(20, 0), 1, false, None),
        Some(jan15(21, 0))
    );
}

#[test]
fn test_start_at_in_the_future() {
    let mut job = job_with_min_altitude(evening_sky(), 30.0);
    job.set_file_startup(StartupCondition::At, Some(jan15(22, 0)));
    assert_eq!(
        job.next_possible_start_time(jan15(20, 0), 1, false, None),
        Some(jan15(22, 0))
    );
}

#[test]
fn test_finish_at() {
    let mut job = job_with_min_altitude(evening_sky(), 30.0);
    job.set_completion_time(Some(jan15(20, 30)));
    assert_eq!(job.next_possible_start_time(jan15(21, 0), 1, false, None), None);

    job.set_completion_time(Some(jan15(23, 0)));
    let end = job.next_end_time(jan15(21, 0), 1, None).unwrap();
    assert_eq!(end.time, jan15(23, 0));
    assert_eq!(end.reason, EndReason::CompletionTime);
    assert_eq!(end.reason.to_string(), "job end time");
}

#[test]
fn test_running_job_needs_whole_window() {
    let mut job = job_with_min_altitude(evening_sky(), 30.0);
    job.set_status(JobStatus::Busy);

    job.set_estimated_time(Some(Duration::hours(7)));
    assert_eq!(job.next_possible_start_time(jan15(20, 0), 1, true, None), None);

    job.set_estimated_time(Some(Duration::hours(2)));
    assert_eq!(
        job.next_possible_start_time(jan15(20, 0), 1, true, None),
        Some(jan15(21, 0))
    );

    // Exactly as long as the window: finishing at 03:00 is fine.
    job.set_estimated_time(Some(Duration::hours(6)));
    assert_eq!(
        job.next_possible_start_time(jan15(20, 0), 1, true, None),
        Some(jan15(21, 0))
    );
    job.set_estimated_time(Some(Duration::hours(6) + Duration::minutes(1)));
    assert_eq!(job.next_possible_start_time(jan15(20, 0), 1, true, None), None);
}

#[test]
fn test_running_job_skips_short_window() {
    // One hour tonight, six hours tomorrow night.
    let tonight = window_altitude(jan15(21, 0), jan15(22, 0), 60.0, 10.0);
    let tomorrow = window_altitude(jan16(21, 0), jan16(21, 0) + Duration::hours(6), 60.0, 10.0);
    let sky = ScriptedSky::new(jan15(19, 0))
        .with_altitude(move |t| tonight(t).max(tomorrow(t)))
        .into_arc();
    let mut job = job_with_min_altitude(sky, 30.0);
    job.set_status(JobStatus::Busy);
    job.set_estimated_time(Some(Duration::hours(3)));

    assert_eq!(
        job.next_possible_start_time(jan15(20, 0), 1, true, None),
        Some(jan16(21, 0))
    );
    // Not when the search stops before the long window.
    assert_eq!(
        job.next_possible_start_time(jan15(20, 0), 1, true, Some(jan16(12, 0))),
        None
    );
    // A non-running job takes the first window regardless.
    assert_eq!(
        job.next_possible_start_time(jan15(20, 0), 1, false, None),
        Some(jan15(21, 0))
    );
}

#[test]
fn test_non_candidates_have_no_start() {
    let mut job = job_with_min_altitude(evening_sky(), 30.0);
    for status in [JobStatus::Aborted, JobStatus::Invalid, JobStatus::Error] {
        job.set_status(status);
        assert_eq!(job.next_possible_start_time(jan15(20, 0), 1, false, None), None);
        assert_eq!(job.next_possible_start_time(jan15(20, 0), 1, true, None), None);
        assert_eq!(job.calculate_next_time(jan15(20, 0), true, 1, None), None);
        assert_eq!(job.calculate_next_time(jan15(21, 0), false, 1, None), None);
        assert_eq!(job.next_end_time(jan15(21, 0), 1, None), None);
    }
    job.reset();
    assert!(job.next_possible_start_time(jan15(20, 0), 1, false, None).is_some());
    assert!(job.calculate_next_time(jan15(20, 0), true, 1, None).is_some());
    assert_eq!(job.next_end_time(jan15(21, 0), 1, None).unwrap().time, jan16(3, 0));
}

#[test]
fn test_setting_target_sorts_first() {
    let setting = ScriptedSky::new(jan15(22, 0))
        .with_altitude(|_| 40.0)
        .with_setting(true)
        .into_arc();
    let rising = ScriptedSky::new(jan15(22, 0))
        .with_altitude(|_| 60.0)
        .with_setting(false)
        .into_arc();
    let a = SchedulerJob::new("A", setting);
    let b = SchedulerJob::new("B", rising);

    assert_eq!(decreasing_altitude_order(&a, &b, Some(jan15(22, 0))), Ordering::Less);
    assert_eq!(decreasing_altitude_order(&b, &a, Some(jan15(22, 0))), Ordering::Greater);
    // Startup samples give the same answer.
    assert_eq!(decreasing_altitude_order(&a, &b, None), Ordering::Less);
}

#[test]
fn test_altitude_order_within_groups() {
    let sky = |alt: f64, setting: bool| {
        ScriptedSky::new(jan15(22, 0))
            .with_altitude(move |_| alt)
            .with_setting(setting)
            .into_arc()
    };
    let low_setting = SchedulerJob::new("low", sky(20.0, true));
    let high_setting = SchedulerJob::new("high", sky(50.0, true));
    assert_eq!(
        decreasing_altitude_order(&low_setting, &high_setting, None),
        Ordering::Less
    );

    let low_rising = SchedulerJob::new("low", sky(20.0, false));
    let high_rising = SchedulerJob::new("high", sky(50.0, false));
    assert_eq!(
        decreasing_altitude_order(&high_rising, &low_rising, None),
        Ordering::Less
    );
}

#[test]
fn test_moon_constraint_in_search() {
    let sky = ScriptedSky::new(jan15(19, 0))
        .with_moon(10.0, 40.0, 0.9)
        .into_arc();
    let mut job = SchedulerJob::new("moon", sky);
    job.set_min_moon_separation(Some(Degrees::new(20.0)));

    assert!(job.calculate_next_time(jan15(20, 0), true, 1, Some(jan15(23, 0))).is_none());
    assert_eq!(job.moon_separation_score(Some(jan15(20, 0))), 0);
    assert_eq!(job.current_moon_separation().value(), 10.0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_next_time_lies_in_window(
        up_min in 0i64..2000,
        len_min in 0i64..600,
        from_min in 0i64..2000,
        span_min in 1i64..2000,
        increment in 1u32..10,
    ) {
        let base = jan15(12, 0);
        let up = base + Duration::minutes(up_min);
        let down = up + Duration::minutes(len_min);
        let sky = ScriptedSky::new(base)
            .with_altitude(window_altitude(up, down, 50.0, 0.0))
            .into_arc();
        let job = job_with_min_altitude(sky, 30.0);

        let from = base + Duration::minutes(from_min);
        let until = from + Duration::minutes(span_min);
        if let Some(hit) = job.calculate_next_time(from, true, increment, Some(until)) {
            prop_assert!(hit.time >= from && hit.time <= until);
            prop_assert!(hit.time >= up && hit.time < down);
            prop_assert!(hit.violation.is_none());
        }

        let start = job.next_possible_start_time(from, increment, false, Some(until));
        prop_assert_eq!(start, job.next_possible_start_time(from, increment, false, Some(until)));
        if let Some(start) = start {
            prop_assert!(start >= from && start <= until);
        }
    }
}
