//! Scheduler job entity.
//!
//! A [`SchedulerJob`] carries a target, its observing constraints, the timing
//! authored in the scheduler file next to the effective timing chosen by the
//! scheduler, and the job's lifecycle and progress counters. Astronomical
//! questions go through the injected [`AstronomicalContext`].

mod cache;
mod ordering;
mod record;
mod search;
mod status;

pub use cache::{CacheLookup, StartTimeCache};
pub use ordering::decreasing_altitude_order;
pub use record::JobRecord;
pub use search::{EndReason, EndTime, SearchHit, START_AT_TOLERANCE_SECS};
pub use status::{
    CompletionCondition, JobStage, JobStatus, PipelineStep, StartupCondition, StepPipeline,
};

use chrono::{DateTime, Duration, Utc};
use qtty::Degrees;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::astro::{AstronomicalContext, HorizontalPosition};
use crate::constraints::{self, ConstraintViolation, JobConstraints};
use crate::models::EquatorialCoordinates;

/// What changed on a job, for display refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobChange {
    Status,
    Stage,
    Startup,
    Completion,
    Progress,
    Estimate,
}

/// Receives change notifications from jobs.
pub trait JobObserver: Send + Sync {
    fn job_changed(&self, job: &SchedulerJob, change: JobChange);
}

/// An observation job.
pub struct SchedulerJob {
    ctx: Arc<dyn AstronomicalContext>,
    observer: Option<Arc<dyn JobObserver>>,
    search_horizon: Duration,

    name: String,
    group: String,
    target: EquatorialCoordinates,
    target_of_date: EquatorialCoordinates,
    position_angle: Option<f64>,
    sequence_file: Option<PathBuf>,
    fits_file: Option<PathBuf>,

    constraints: JobConstraints,
    step_pipeline: StepPipeline,

    status: JobStatus,
    stage: JobStage,
    state_time: Option<DateTime<Utc>>,
    last_abort_time: Option<DateTime<Utc>>,
    last_error_time: Option<DateTime<Utc>>,

    file_startup_condition: StartupCondition,
    file_startup_time: Option<DateTime<Utc>>,
    startup_condition: StartupCondition,
    startup_time: Option<DateTime<Utc>>,
    completion_condition: CompletionCondition,
    completion_time: Option<DateTime<Utc>>,
    greedy_completion_time: Option<DateTime<Utc>>,
    stop_reason: String,

    altitude_at_startup: Degrees,
    is_setting_at_startup: bool,
    altitude_at_completion: Degrees,
    is_setting_at_completion: bool,

    next_dawn: Option<DateTime<Utc>>,
    next_dusk: Option<DateTime<Utc>>,

    estimated_time: Option<Duration>,
    estimated_time_per_repeat: Duration,
    estimated_startup_time: Duration,
    estimated_time_left_this_repeat: Duration,

    repeats_required: u16,
    repeats_remaining: u16,
    completed_iterations: u32,
    sequence_count: u32,
    completed_count: u32,
    captured_frames: BTreeMap<String, u16>,

    in_sequence_focus: bool,
    initial_filter: String,
    light_frames_required: bool,

    cache: StartTimeCache,
}

impl fmt::Debug for SchedulerJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerJob")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("stage", &self.stage)
            .field("target", &self.target)
            .field("startup_condition", &self.startup_condition)
            .field("startup_time", &self.startup_time)
            .field("completion_condition", &self.completion_condition)
            .field("repeats_remaining", &self.repeats_remaining)
            .finish_non_exhaustive()
    }
}

impl SchedulerJob {
    /// Default look-ahead of a search without an explicit end bound.
    pub const DEFAULT_SEARCH_HORIZON_DAYS: i64 = 7;

    /// Create an idle job pointing at RA 0, Dec 0.
    pub fn new(name: impl Into<String>, ctx: Arc<dyn AstronomicalContext>) -> Self {
        let target = EquatorialCoordinates::default();
        let mut job = Self {
            target_of_date: target.precessed_to(ctx.now()),
            ctx,
            observer: None,
            search_horizon: Duration::days(Self::DEFAULT_SEARCH_HORIZON_DAYS),
            name: name.into(),
            group: String::new(),
            target,
            position_angle: None,
            sequence_file: None,
            fits_file: None,
            constraints: JobConstraints::default(),
            step_pipeline: StepPipeline::NONE,
            status: JobStatus::Idle,
            stage: JobStage::Idle,
            state_time: None,
            last_abort_time: None,
            last_error_time: None,
            file_startup_condition: StartupCondition::Asap,
            file_startup_time: None,
            startup_condition: StartupCondition::Asap,
            startup_time: None,
            completion_condition: CompletionCondition::Sequence,
            completion_time: None,
            greedy_completion_time: None,
            stop_reason: String::new(),
            altitude_at_startup: Degrees::new(0.0),
            is_setting_at_startup: false,
            altitude_at_completion: Degrees::new(0.0),
            is_setting_at_completion: false,
            next_dawn: None,
            next_dusk: None,
            estimated_time: None,
            estimated_time_per_repeat: Duration::zero(),
            estimated_startup_time: Duration::zero(),
            estimated_time_left_this_repeat: Duration::zero(),
            repeats_required: 1,
            repeats_remaining: 1,
            completed_iterations: 0,
            sequence_count: 0,
            completed_count: 0,
            captured_frames: BTreeMap::new(),
            in_sequence_focus: false,
            initial_filter: String::new(),
            light_frames_required: false,
            cache: StartTimeCache::new(),
        };
        job.refresh_startup_sample();
        job.refresh_dawn_dusk();
        job
    }

    /// Set how far searches look ahead when no end bound is given.
    pub fn with_search_horizon(mut self, horizon: Duration) -> Self {
        self.search_horizon = horizon;
        self
    }

    pub fn set_observer(&mut self, observer: Option<Arc<dyn JobObserver>>) {
        self.observer = observer;
    }

    fn notify(&self, change: JobChange) {
        if let Some(observer) = &self.observer {
            observer.job_changed(self, change);
        }
    }

    pub fn context(&self) -> &Arc<dyn AstronomicalContext> {
        &self.ctx
    }

    pub fn search_horizon(&self) -> Duration {
        self.search_horizon
    }

    // ----- Identity -----

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn set_group(&mut self, group: impl Into<String>) {
        self.group = group.into();
    }

    pub fn sequence_file(&self) -> Option<&Path> {
        self.sequence_file.as_deref()
    }

    pub fn set_sequence_file(&mut self, path: Option<PathBuf>) {
        self.sequence_file = path;
    }

    pub fn fits_file(&self) -> Option<&Path> {
        self.fits_file.as_deref()
    }

    pub fn set_fits_file(&mut self, path: Option<PathBuf>) {
        self.fits_file = path;
    }

    /// Whether `other` is a different job with the same name and sequence.
    pub fn is_duplicate_of(&self, other: &SchedulerJob) -> bool {
        !std::ptr::eq(self, other)
            && self.name == other.name
            && self.sequence_file == other.sequence_file
    }

    // ----- Target -----

    /// J2000 coordinates of the target.
    pub fn target(&self) -> &EquatorialCoordinates {
        &self.target
    }

    /// Coordinates of the target precessed to the time they were set.
    pub fn target_of_date(&self) -> &EquatorialCoordinates {
        &self.target_of_date
    }

    pub fn set_target(&mut self, target: EquatorialCoordinates) {
        self.target_of_date = target.precessed_to(self.ctx.now());
        self.target = target;
        self.cache.clear();
        self.refresh_startup_sample();
        self.refresh_completion_sample();
    }

    pub fn position_angle(&self) -> Option<f64> {
        self.position_angle
    }

    /// Set the position angle. Negative values mean "none".
    pub fn set_position_angle(&mut self, value: Option<f64>) {
        self.position_angle = value.filter(|v| *v >= 0.0);
    }

    // ----- Constraints -----

    pub fn constraints(&self) -> &JobConstraints {
        &self.constraints
    }

    /// Mutable access to the constraints. Clears the start-time cache.
    pub fn constraints_mut(&mut self) -> &mut JobConstraints {
        self.cache.clear();
        &mut self.constraints
    }

    pub fn min_altitude(&self) -> Option<Degrees> {
        self.constraints.min_altitude()
    }

    pub fn set_min_altitude(&mut self, value: Option<Degrees>) {
        self.constraints_mut().set_min_altitude(value);
    }

    pub fn has_min_altitude(&self) -> bool {
        self.constraints.has_min_altitude()
    }

    pub fn min_moon_separation(&self) -> Option<Degrees> {
        self.constraints.min_moon_separation()
    }

    pub fn set_min_moon_separation(&mut self, value: Option<Degrees>) {
        self.constraints_mut().set_min_moon_separation(value);
    }

    pub fn set_enforce_weather(&mut self, value: bool) {
        self.constraints_mut().enforce_weather = value;
    }

    pub fn set_enforce_twilight(&mut self, value: bool) {
        self.constraints_mut().enforce_twilight = value;
        self.refresh_dawn_dusk();
    }

    pub fn set_enforce_artificial_horizon(&mut self, value: bool) {
        self.constraints_mut().enforce_artificial_horizon = value;
    }

    pub fn step_pipeline(&self) -> StepPipeline {
        self.step_pipeline
    }

    pub fn set_step_pipeline(&mut self, pipeline: StepPipeline) {
        self.step_pipeline = pipeline;
    }

    // ----- Lifecycle -----

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Change the status, applying the startup and estimate resets the new
    /// status implies.
    pub fn set_status(&mut self, status: JobStatus) {
        let now = self.ctx.now();
        self.status = status;
        self.state_time = Some(now);

        match status {
            JobStatus::Error => self.last_error_time = Some(now),
            JobStatus::Aborted => {
                self.last_abort_time = Some(now);
                self.restore_file_startup();
            }
            JobStatus::Invalid | JobStatus::Idle => {
                self.restore_file_startup();
                self.set_estimated_time(None);
            }
            _ => {}
        }

        log::debug!("Job '{}' status is now {}", self.name, status);
        self.notify(JobChange::Status);
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    /// Stage of a busy job; `None` for any other status.
    pub fn active_stage(&self) -> Option<JobStage> {
        (self.status == JobStatus::Busy).then_some(self.stage)
    }

    pub fn set_stage(&mut self, stage: JobStage) {
        self.stage = stage;
        self.notify(JobChange::Stage);
    }

    pub fn state_time(&self) -> Option<DateTime<Utc>> {
        self.state_time
    }

    pub fn last_abort_time(&self) -> Option<DateTime<Utc>> {
        self.last_abort_time
    }

    pub fn last_error_time(&self) -> Option<DateTime<Utc>> {
        self.last_error_time
    }

    /// Whether the scheduler may consider this job. Aborted, invalid and
    /// failed jobs stay out until reset.
    pub fn is_candidate(&self) -> bool {
        !matches!(
            self.status,
            JobStatus::Aborted | JobStatus::Invalid | JobStatus::Error
        )
    }

    /// Return the job to its freshly loaded state.
    pub fn reset(&mut self) {
        self.status = JobStatus::Idle;
        self.stage = JobStage::Idle;
        self.state_time = Some(self.ctx.now());
        self.last_abort_time = None;
        self.last_error_time = None;
        self.estimated_time = None;
        self.startup_condition = self.file_startup_condition;
        self.startup_time = self.file_startup_time;
        self.greedy_completion_time = None;
        self.stop_reason.clear();
        self.repeats_remaining = self.repeats_required;
        self.completed_iterations = 0;
        self.captured_frames.clear();
        self.completed_count = 0;
        self.cache.clear();
        self.refresh_startup_sample();
        self.refresh_dawn_dusk();
        self.notify(JobChange::Status);
    }

    // ----- Startup -----

    pub fn file_startup_condition(&self) -> StartupCondition {
        self.file_startup_condition
    }

    pub fn file_startup_time(&self) -> Option<DateTime<Utc>> {
        self.file_startup_time
    }

    /// Set the startup authored in the scheduler file, and make it effective.
    pub fn set_file_startup(&mut self, condition: StartupCondition, time: Option<DateTime<Utc>>) {
        self.file_startup_condition = condition;
        self.file_startup_time = time;
        self.restore_file_startup();
    }

    pub fn startup_condition(&self) -> StartupCondition {
        self.startup_condition
    }

    /// Set the effective startup condition. ASAP forgets the startup time.
    pub fn set_startup_condition(&mut self, condition: StartupCondition) {
        self.startup_condition = condition;
        if condition == StartupCondition::Asap {
            self.startup_time = None;
        }
        self.refresh_startup_sample();
        self.refresh_dawn_dusk();
        self.notify(JobChange::Startup);
    }

    pub fn startup_time(&self) -> Option<DateTime<Utc>> {
        self.startup_time
    }

    /// Set the effective startup time. A time makes the job start AT it;
    /// no time falls back to the file startup condition.
    pub fn set_startup_time(&mut self, time: Option<DateTime<Utc>>) {
        self.startup_time = time;
        self.startup_condition = if time.is_some() {
            StartupCondition::At
        } else {
            self.file_startup_condition
        };
        self.refresh_startup_sample();
        self.refresh_dawn_dusk();
        self.notify(JobChange::Startup);
    }

    fn restore_file_startup(&mut self) {
        self.startup_condition = self.file_startup_condition;
        self.startup_time = self.file_startup_time;
        self.refresh_startup_sample();
        self.refresh_dawn_dusk();
    }

    pub fn altitude_at_startup(&self) -> Degrees {
        self.altitude_at_startup
    }

    pub fn is_setting_at_startup(&self) -> bool {
        self.is_setting_at_startup
    }

    fn refresh_startup_sample(&mut self) {
        let when = self.startup_time.unwrap_or_else(|| self.ctx.now());
        let position = self.ctx.horizontal_at(&self.target, when);
        self.altitude_at_startup = position.altitude;
        self.is_setting_at_startup = position.is_setting;
    }

    // ----- Completion -----

    pub fn completion_condition(&self) -> CompletionCondition {
        self.completion_condition
    }

    /// Set the completion condition. Looping jobs have no repeat budget and
    /// single-sequence jobs run once.
    pub fn set_completion_condition(&mut self, condition: CompletionCondition) {
        self.completion_condition = condition;
        match condition {
            CompletionCondition::Loop => self.set_repeats_required(0),
            CompletionCondition::Sequence => self.set_repeats_required(1),
            _ => {}
        }
        self.notify(JobChange::Completion);
    }

    pub fn completion_time(&self) -> Option<DateTime<Utc>> {
        self.completion_time
    }

    /// Set the completion time. A time makes the job finish AT it; clearing
    /// the time of such a job falls back to finishing the sequence.
    pub fn set_completion_time(&mut self, time: Option<DateTime<Utc>>) {
        self.completion_time = time;
        if time.is_some() {
            self.completion_condition = CompletionCondition::At;
        } else if self.completion_condition == CompletionCondition::At {
            self.completion_condition = CompletionCondition::Sequence;
        }
        self.cache.clear();
        self.refresh_completion_sample();
        self.notify(JobChange::Completion);
    }

    pub fn greedy_completion_time(&self) -> Option<DateTime<Utc>> {
        self.greedy_completion_time
    }

    pub fn set_greedy_completion_time(&mut self, time: Option<DateTime<Utc>>) {
        self.greedy_completion_time = time;
    }

    pub fn stop_reason(&self) -> &str {
        &self.stop_reason
    }

    pub fn set_stop_reason(&mut self, reason: impl Into<String>) {
        self.stop_reason = reason.into();
    }

    pub fn altitude_at_completion(&self) -> Degrees {
        self.altitude_at_completion
    }

    pub fn is_setting_at_completion(&self) -> bool {
        self.is_setting_at_completion
    }

    fn refresh_completion_sample(&mut self) {
        if let Some(when) = self.completion_time {
            let position = self.ctx.horizontal_at(&self.target, when);
            self.altitude_at_completion = position.altitude;
            self.is_setting_at_completion = position.is_setting;
        }
    }

    // ----- Twilight -----

    /// First astronomical dawn after the job's reference time.
    pub fn dawn_astronomical_twilight(&self) -> Option<DateTime<Utc>> {
        self.next_dawn
    }

    /// First astronomical dusk after the job's reference time.
    pub fn dusk_astronomical_twilight(&self) -> Option<DateTime<Utc>> {
        self.next_dusk
    }

    /// Recompute dawn and dusk after the startup time, or after now.
    pub fn refresh_dawn_dusk(&mut self) {
        let reference = self.startup_time.unwrap_or_else(|| self.ctx.now());
        let dawn_dusk = self.ctx.dawn_dusk_after(reference);
        self.next_dawn = Some(dawn_dusk.dawn);
        self.next_dusk = Some(dawn_dusk.dusk);
    }

    // ----- Estimates -----

    /// Estimated total duration; `None` while unknown.
    pub fn estimated_time(&self) -> Option<Duration> {
        self.estimated_time
    }

    pub fn set_estimated_time(&mut self, value: Option<Duration>) {
        self.estimated_time = value.filter(|d| *d >= Duration::zero());
        self.notify(JobChange::Estimate);
    }

    pub fn estimated_time_per_repeat(&self) -> Duration {
        self.estimated_time_per_repeat
    }

    pub fn set_estimated_time_per_repeat(&mut self, value: Duration) {
        self.estimated_time_per_repeat = value;
    }

    pub fn estimated_startup_time(&self) -> Duration {
        self.estimated_startup_time
    }

    pub fn set_estimated_startup_time(&mut self, value: Duration) {
        self.estimated_startup_time = value;
    }

    pub fn estimated_time_left_this_repeat(&self) -> Duration {
        self.estimated_time_left_this_repeat
    }

    pub fn set_estimated_time_left_this_repeat(&mut self, value: Duration) {
        self.estimated_time_left_this_repeat = value;
    }

    // ----- Progress -----

    pub fn repeats_required(&self) -> u16 {
        self.repeats_required
    }

    /// Set the repeat budget. The remaining count never exceeds it.
    pub fn set_repeats_required(&mut self, value: u16) {
        self.repeats_required = value;
        self.repeats_remaining = self.repeats_remaining.min(value);
        self.notify(JobChange::Progress);
    }

    pub fn repeats_remaining(&self) -> u16 {
        self.repeats_remaining
    }

    pub fn set_repeats_remaining(&mut self, value: u16) {
        self.repeats_remaining = value.min(self.repeats_required);
        self.notify(JobChange::Progress);
    }

    pub fn completed_iterations(&self) -> u32 {
        self.completed_iterations
    }

    pub fn set_completed_iterations(&mut self, value: u32) {
        self.completed_iterations = value;
        self.notify(JobChange::Progress);
    }

    pub fn sequence_count(&self) -> u32 {
        self.sequence_count
    }

    pub fn set_sequence_count(&mut self, value: u32) {
        self.sequence_count = value;
        self.notify(JobChange::Progress);
    }

    pub fn completed_count(&self) -> u32 {
        self.completed_count
    }

    pub fn set_completed_count(&mut self, value: u32) {
        self.completed_count = value;
        self.notify(JobChange::Progress);
    }

    /// Frames already captured, keyed by frame signature.
    pub fn captured_frames(&self) -> &BTreeMap<String, u16> {
        &self.captured_frames
    }

    pub fn set_captured_frames(&mut self, frames: BTreeMap<String, u16>) {
        self.captured_frames = frames;
        self.notify(JobChange::Progress);
    }

    pub fn in_sequence_focus(&self) -> bool {
        self.in_sequence_focus
    }

    pub fn set_in_sequence_focus(&mut self, value: bool) {
        self.in_sequence_focus = value;
    }

    /// Filter of the first light frame in the sequence, handed to focusing.
    pub fn initial_filter(&self) -> &str {
        &self.initial_filter
    }

    pub fn set_initial_filter(&mut self, value: impl Into<String>) {
        self.initial_filter = value.into();
    }

    pub fn light_frames_required(&self) -> bool {
        self.light_frames_required
    }

    pub fn set_light_frames_required(&mut self, value: bool) {
        self.light_frames_required = value;
    }

    // ----- Constraint evaluation -----

    /// Horizontal position of the target at `when`.
    pub fn altitude_at(&self, when: DateTime<Utc>) -> HorizontalPosition {
        constraints::altitude(self.ctx.as_ref(), &self.target, when)
    }

    /// Whether an altitude is allowed at an azimuth for this job.
    pub fn satisfies_altitude_constraint(
        &self,
        azimuth: Degrees,
        altitude: Degrees,
    ) -> Result<(), ConstraintViolation> {
        constraints::satisfies_altitude_constraint(&self.constraints, self.ctx.as_ref(), azimuth, altitude)
    }

    /// Check every constraint of the job at `when`.
    pub fn satisfies_constraints_at(&self, when: DateTime<Utc>) -> Result<(), ConstraintViolation> {
        let position = self.altitude_at(when);
        constraints::satisfies_constraints(&self.constraints, self.ctx.as_ref(), &self.target, when, &position)
    }

    /// Moon interference score at `when`, or now.
    pub fn moon_separation_score(&self, when: Option<DateTime<Utc>>) -> u8 {
        let when = when.unwrap_or_else(|| self.ctx.now());
        constraints::moon_separation_score(&self.constraints, self.ctx.as_ref(), &self.target, when)
    }

    /// Angular distance between the target and the Moon right now.
    pub fn current_moon_separation(&self) -> Degrees {
        self.ctx.moon_separation_at(&self.target, self.ctx.now())
    }

    /// Forget every memoised start-time search.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub(crate) fn cache(&self) -> &StartTimeCache {
        &self.cache
    }
}

impl fmt::Display for SchedulerJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::{DawnDusk, HorizontalPosition};
    use crate::clock::{Clock, ManualClock};
    use chrono::TimeZone;
    use parking_lot::Mutex;

    struct FlatSky {
        clock: ManualClock,
    }

    impl AstronomicalContext for FlatSky {
        fn now(&self) -> DateTime<Utc> {
            self.clock.now()
        }
        fn horizontal_at(&self, _: &EquatorialCoordinates, _: DateTime<Utc>) -> HorizontalPosition {
            HorizontalPosition {
                altitude: Degrees::new(45.0),
                azimuth: Degrees::new(180.0),
                is_setting: true,
            }
        }
        fn moon_separation_at(&self, _: &EquatorialCoordinates, _: DateTime<Utc>) -> Degrees {
            Degrees::new(90.0)
        }
        fn moon_horizontal_at(&self, _: DateTime<Utc>) -> HorizontalPosition {
            HorizontalPosition {
                altitude: Degrees::new(-20.0),
                azimuth: Degrees::new(0.0),
                is_setting: false,
            }
        }
        fn moon_illumination_at(&self, _: DateTime<Utc>) -> f64 {
            0.3
        }
        fn dawn_dusk_after(&self, when: DateTime<Utc>) -> DawnDusk {
            DawnDusk {
                dawn: when + Duration::hours(6),
                dusk: when + Duration::hours(18),
            }
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 10, 22, 0, 0).unwrap()
    }

    fn job(name: &str) -> SchedulerJob {
        let ctx = Arc::new(FlatSky {
            clock: ManualClock::new(now()),
        });
        SchedulerJob::new(name, ctx)
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<JobChange>>);

    impl JobObserver for Recorder {
        fn job_changed(&self, _: &SchedulerJob, change: JobChange) {
            self.0.lock().push(change);
        }
    }

    #[test]
    fn test_new_job_defaults() {
        let job = job("M31");
        assert_eq!(job.status(), JobStatus::Idle);
        assert_eq!(job.active_stage(), None);
        assert_eq!(job.repeats_required(), 1);
        assert_eq!(job.repeats_remaining(), 1);
        assert_eq!(job.estimated_time(), None);
        assert_eq!(job.dawn_astronomical_twilight(), Some(now() + Duration::hours(6)));
        assert!(job.is_candidate());
    }

    #[test]
    fn test_aborted_restores_file_startup() {
        let mut job = job("M31");
        job.set_file_startup(StartupCondition::Asap, None);
        job.set_startup_time(Some(now() + Duration::hours(1)));
        assert_eq!(job.startup_condition(), StartupCondition::At);

        job.set_estimated_time(Some(Duration::minutes(30)));
        job.set_status(JobStatus::Aborted);
        assert_eq!(job.startup_condition(), StartupCondition::Asap);
        assert_eq!(job.startup_time(), None);
        assert_eq!(job.last_abort_time(), Some(now()));
        // Aborted keeps the estimate.
        assert_eq!(job.estimated_time(), Some(Duration::minutes(30)));
        assert!(!job.is_candidate());
    }

    #[test]
    fn test_invalid_forgets_estimate() {
        let mut job = job("M31");
        let at = now() + Duration::hours(2);
        job.set_file_startup(StartupCondition::At, Some(at));
        job.set_startup_time(Some(now() + Duration::hours(3)));
        job.set_estimated_time(Some(Duration::minutes(30)));

        job.set_status(JobStatus::Invalid);
        assert_eq!(job.startup_time(), Some(at));
        assert_eq!(job.estimated_time(), None);
    }

    #[test]
    fn test_error_records_time() {
        let mut job = job("M31");
        job.set_status(JobStatus::Error);
        assert_eq!(job.last_error_time(), Some(now()));
        assert_eq!(job.state_time(), Some(now()));
    }

    #[test]
    fn test_repeats_invariant() {
        let mut job = job("M31");
        job.set_completion_condition(CompletionCondition::Repeat);
        job.set_repeats_required(5);
        job.set_repeats_remaining(9);
        assert_eq!(job.repeats_remaining(), 5);
        job.set_repeats_remaining(4);
        job.set_repeats_required(2);
        assert_eq!(job.repeats_remaining(), 2);

        job.set_completion_condition(CompletionCondition::Loop);
        assert_eq!(job.repeats_required(), 0);
        assert_eq!(job.repeats_remaining(), 0);
    }

    #[test]
    fn test_completion_time_sets_condition() {
        let mut job = job("M31");
        job.set_completion_time(Some(now() + Duration::hours(4)));
        assert_eq!(job.completion_condition(), CompletionCondition::At);
        assert_eq!(job.altitude_at_completion().value(), 45.0);
        job.set_completion_time(None);
        assert_eq!(job.completion_condition(), CompletionCondition::Sequence);
    }

    #[test]
    fn test_stage_only_while_busy() {
        let mut job = job("M31");
        job.set_stage(JobStage::Guiding);
        assert_eq!(job.active_stage(), None);
        job.set_status(JobStatus::Busy);
        assert_eq!(job.active_stage(), Some(JobStage::Guiding));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut job = job("M31");
        job.set_completion_condition(CompletionCondition::Repeat);
        job.set_repeats_required(3);
        job.set_repeats_remaining(1);
        job.set_completed_iterations(2);
        job.set_completed_count(7);
        job.set_captured_frames(BTreeMap::from([("Light_L_300".to_string(), 7)]));
        job.set_stop_reason("dawn");
        job.set_status(JobStatus::Error);

        job.reset();
        let first = format!("{:?}", job);
        let snapshot = (
            job.status(),
            job.stage(),
            job.repeats_remaining(),
            job.completed_iterations(),
            job.completed_count(),
            job.captured_frames().len(),
            job.last_error_time(),
            job.estimated_time(),
        );
        job.reset();
        assert_eq!(format!("{:?}", job), first);
        assert_eq!(
            snapshot,
            (
                job.status(),
                job.stage(),
                job.repeats_remaining(),
                job.completed_iterations(),
                job.completed_count(),
                job.captured_frames().len(),
                job.last_error_time(),
                job.estimated_time(),
            )
        );
        assert_eq!(job.status(), JobStatus::Idle);
        assert_eq!(job.repeats_remaining(), 3);
        assert_eq!(job.completed_count(), 0);
        assert!(job.stop_reason().is_empty());
    }

    #[test]
    fn test_duplicates() {
        let mut a = job("M31");
        let mut b = job("M31");
        a.set_sequence_file(Some(PathBuf::from("/seq/m31.esq")));
        b.set_sequence_file(Some(PathBuf::from("/seq/m31.esq")));
        assert!(a.is_duplicate_of(&b));
        assert!(!a.is_duplicate_of(&a));
        b.set_sequence_file(Some(PathBuf::from("/seq/other.esq")));
        assert!(!a.is_duplicate_of(&b));
    }

    #[test]
    fn test_undefined_constraints() {
        let mut job = job("M31");
        job.set_min_altitude(Some(Degrees::new(-90.0)));
        assert!(!job.has_min_altitude());
        job.set_min_moon_separation(Some(Degrees::new(-1.0)));
        assert_eq!(job.min_moon_separation(), None);
        job.set_position_angle(Some(-1.0));
        assert_eq!(job.position_angle(), None);
    }

    #[test]
    fn test_observer_notified() {
        let recorder = Arc::new(Recorder::default());
        let mut job = job("M31");
        job.set_observer(Some(recorder.clone()));
        job.set_status(JobStatus::Scheduled);
        job.set_stage(JobStage::Slewing);
        let changes = recorder.0.lock().clone();
        assert_eq!(changes, vec![JobChange::Status, JobChange::Stage]);
    }
}
