//! Serializable snapshot of a job.
//!
//! A [`JobRecord`] holds what a scheduler list persists about a job: identity,
//! target, constraints, timing and progress. Derived values (dawn/dusk,
//! altitude samples, cache) are recomputed when the record is loaded.

use chrono::{DateTime, Duration, Utc};
use qtty::Degrees;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::{
    CompletionCondition, JobStage, JobStatus, SchedulerJob, StartupCondition, StepPipeline,
};
use crate::astro::AstronomicalContext;
use crate::error::{SchedulerError, SchedulerResult};
use crate::models::EquatorialCoordinates;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub name: String,
    #[serde(default)]
    pub group: String,
    /// J2000 right ascension in degrees.
    pub ra: f64,
    /// J2000 declination in degrees.
    pub dec: f64,
    #[serde(default)]
    pub position_angle: Option<f64>,
    #[serde(default)]
    pub sequence_file: Option<PathBuf>,
    #[serde(default)]
    pub fits_file: Option<PathBuf>,

    #[serde(default)]
    pub min_altitude: Option<f64>,
    #[serde(default)]
    pub min_moon_separation: Option<f64>,
    #[serde(default)]
    pub enforce_weather: bool,
    #[serde(default)]
    pub enforce_twilight: bool,
    #[serde(default)]
    pub enforce_artificial_horizon: bool,
    #[serde(default)]
    pub step_pipeline: StepPipeline,

    #[serde(default)]
    pub startup_condition: StartupCondition,
    #[serde(default)]
    pub startup_time: Option<DateTime<Utc>>,
    /// Startup the scheduler settled on, when it differs from the file's.
    #[serde(default)]
    pub effective_startup_condition: Option<StartupCondition>,
    #[serde(default)]
    pub effective_startup_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completion_condition: CompletionCondition,
    #[serde(default)]
    pub completion_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub stage: JobStage,
    #[serde(default = "default_repeats")]
    pub repeats_required: u16,
    #[serde(default)]
    pub repeats_remaining: Option<u16>,
    #[serde(default)]
    pub completed_iterations: u32,
    #[serde(default)]
    pub sequence_count: u32,
    #[serde(default)]
    pub completed_count: u32,
    #[serde(default)]
    pub captured_frames: BTreeMap<String, u16>,
    /// Estimated total duration in seconds.
    #[serde(default)]
    pub estimated_time_secs: Option<i64>,
    #[serde(default)]
    pub estimated_time_per_repeat_secs: Option<i64>,
    #[serde(default)]
    pub estimated_startup_time_secs: Option<i64>,
    #[serde(default)]
    pub estimated_time_left_this_repeat_secs: Option<i64>,

    #[serde(default)]
    pub in_sequence_focus: bool,
    #[serde(default)]
    pub initial_filter: String,
    #[serde(default)]
    pub light_frames_required: bool,
}

fn default_repeats() -> u16 {
    1
}

impl JobRecord {
    /// Parse a list of records from JSON.
    pub fn list_from_json(json: &str) -> SchedulerResult<Vec<JobRecord>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render a list of records as pretty JSON.
    pub fn list_to_json(records: &[JobRecord]) -> SchedulerResult<String> {
        Ok(serde_json::to_string_pretty(records)?)
    }
}

impl SchedulerJob {
    /// Snapshot the persistable state of this job.
    pub fn to_record(&self) -> JobRecord {
        let constraints = self.constraints();
        JobRecord {
            name: self.name().to_string(),
            group: self.group().to_string(),
            ra: self.target().ra.value(),
            dec: self.target().dec.value(),
            position_angle: self.position_angle(),
            sequence_file: self.sequence_file().map(PathBuf::from),
            fits_file: self.fits_file().map(PathBuf::from),
            min_altitude: constraints.min_altitude().map(|d| d.value()),
            min_moon_separation: constraints.min_moon_separation().map(|d| d.value()),
            enforce_weather: constraints.enforce_weather,
            enforce_twilight: constraints.enforce_twilight,
            enforce_artificial_horizon: constraints.enforce_artificial_horizon,
            step_pipeline: self.step_pipeline(),
            startup_condition: self.file_startup_condition(),
            startup_time: self.file_startup_time(),
            effective_startup_condition: Some(self.startup_condition()),
            effective_startup_time: self.startup_time(),
            completion_condition: self.completion_condition(),
            completion_time: self.completion_time(),
            status: self.status(),
            stage: self.stage(),
            repeats_required: self.repeats_required(),
            repeats_remaining: Some(self.repeats_remaining()),
            completed_iterations: self.completed_iterations(),
            sequence_count: self.sequence_count(),
            completed_count: self.completed_count(),
            captured_frames: self.captured_frames().clone(),
            estimated_time_secs: self.estimated_time().map(|d| d.num_seconds()),
            estimated_time_per_repeat_secs: Some(self.estimated_time_per_repeat().num_seconds()),
            estimated_startup_time_secs: Some(self.estimated_startup_time().num_seconds()),
            estimated_time_left_this_repeat_secs: Some(
                self.estimated_time_left_this_repeat().num_seconds(),
            ),
            in_sequence_focus: self.in_sequence_focus(),
            initial_filter: self.initial_filter().to_string(),
            light_frames_required: self.light_frames_required(),
        }
    }

    /// Build a job from a record.
    ///
    /// The record's startup becomes the file startup. Fails when the name is
    /// empty, the coordinates are out of range or START_AT / FINISH_AT lack a time.
    pub fn from_record(
        record: &JobRecord,
        ctx: Arc<dyn AstronomicalContext>,
    ) -> SchedulerResult<SchedulerJob> {
        if record.name.trim().is_empty() {
            return Err(SchedulerError::invalid_record(&record.name, "name is empty"));
        }
        let target = EquatorialCoordinates::new(record.ra, record.dec)
            .map_err(|e| SchedulerError::invalid_record(&record.name, e.to_string()))?;
        if record.startup_condition == StartupCondition::At && record.startup_time.is_none() {
            return Err(SchedulerError::invalid_record(
                &record.name,
                "startup condition AT needs a startup time",
            ));
        }
        if record.completion_condition == CompletionCondition::At && record.completion_time.is_none() {
            return Err(SchedulerError::invalid_record(
                &record.name,
                "completion condition AT needs a completion time",
            ));
        }

        let mut job = SchedulerJob::new(record.name.clone(), ctx);
        job.set_group(record.group.clone());
        job.set_target(target);
        job.set_position_angle(record.position_angle);
        job.set_sequence_file(record.sequence_file.clone());
        job.set_fits_file(record.fits_file.clone());

        {
            let constraints = job.constraints_mut();
            constraints.set_min_altitude(record.min_altitude.map(Degrees::new));
            constraints.set_min_moon_separation(record.min_moon_separation.map(Degrees::new));
            constraints.enforce_weather = record.enforce_weather;
            constraints.enforce_twilight = record.enforce_twilight;
            constraints.enforce_artificial_horizon = record.enforce_artificial_horizon;
        }
        job.set_step_pipeline(record.step_pipeline);

        job.set_file_startup(record.startup_condition, record.startup_time);
        job.set_completion_condition(record.completion_condition);
        if record.completion_condition == CompletionCondition::At {
            job.set_completion_time(record.completion_time);
        }
        if record.completion_condition != CompletionCondition::Loop {
            job.set_repeats_required(record.repeats_required);
        }
        job.set_repeats_remaining(record.repeats_remaining.unwrap_or(record.repeats_required));
        job.set_completed_iterations(record.completed_iterations);
        job.set_sequence_count(record.sequence_count);
        job.set_completed_count(record.completed_count);
        job.set_captured_frames(record.captured_frames.clone());
        job.set_in_sequence_focus(record.in_sequence_focus);
        job.set_initial_filter(record.initial_filter.clone());
        job.set_light_frames_required(record.light_frames_required);

        job.set_stage(record.stage);
        job.set_status(record.status);
        // Idle, Aborted and Invalid jobs run from the file startup.
        if !matches!(
            record.status,
            JobStatus::Idle | JobStatus::Aborted | JobStatus::Invalid
        ) {
            match (record.effective_startup_condition, record.effective_startup_time) {
                (Some(StartupCondition::At), Some(time)) => job.set_startup_time(Some(time)),
                (Some(condition), _) => job.set_startup_condition(condition),
                (None, _) => {}
            }
        }
        // Idle and Invalid forget the estimate, so restore it afterwards.
        job.set_estimated_time(record.estimated_time_secs.map(Duration::seconds));
        if let Some(secs) = record.estimated_time_per_repeat_secs {
            job.set_estimated_time_per_repeat(Duration::seconds(secs));
        }
        if let Some(secs) = record.estimated_startup_time_secs {
            job.set_estimated_startup_time(Duration::seconds(secs));
        }
        if let Some(secs) = record.estimated_time_left_this_repeat_secs {
            job.set_estimated_time_left_this_repeat(Duration::seconds(secs));
        }
        Ok(job)
    }
}
