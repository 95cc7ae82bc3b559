use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use super::SchedulerJob;

/// Order jobs so that targets about to be lost come first.
///
/// Setting targets sort before rising ones. Among setting targets the lowest
/// goes first; otherwise the highest goes first. Without `when`, the samples
/// taken at each job's startup time are compared.
pub fn decreasing_altitude_order(
    a: &SchedulerJob,
    b: &SchedulerJob,
    when: Option<DateTime<Utc>>,
) -> Ordering {
    let sample = |job: &SchedulerJob| match when {
        Some(t) => {
            let position = job.altitude_at(t);
            (position.altitude.value(), position.is_setting)
        }
        None => (job.altitude_at_startup().value(), job.is_setting_at_startup()),
    };
    let (a_altitude, a_setting) = sample(a);
    let (b_altitude, b_setting) = sample(b);

    match (a_setting, b_setting) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => a_altitude.total_cmp(&b_altitude),
        (false, false) => b_altitude.total_cmp(&a_altitude),
    }
}
