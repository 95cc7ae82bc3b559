//! Scheduler configuration file support.
//!
//! Settings are read from a TOML file. Every section and field is optional;
//! missing values fall back to the defaults below.
//!
//! ```toml
//! [location]
//! latitude = 28.7624
//! longitude = -17.8892
//! elevation_m = 2396.0
//!
//! [twilight]
//! altitude_deg = -18.0
//! dawn_offset_minutes = 0
//! dusk_offset_minutes = 0
//! pre_dawn_minutes = 15
//!
//! [search]
//! horizon_days = 7
//! increment_minutes = 1
//!
//! [iteration]
//! update_period_ms = 1000
//! max_failure_attempts = 5
//!
//! [[horizon]]
//! azimuth = 0.0
//! altitude = 15.0
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::astro::HorizonPoint;
use crate::error::{SchedulerError, SchedulerResult};
use crate::models::GeoLocation;

/// Scheduler configuration from file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub location: Option<GeoLocation>,
    #[serde(default)]
    pub twilight: TwilightSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub iteration: IterationSettings,
    /// Artificial horizon profile, as (azimuth, altitude) points.
    #[serde(default)]
    pub horizon: Vec<HorizonPoint>,
}

/// Twilight boundary settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwilightSettings {
    /// Sun altitude defining astronomical twilight.
    #[serde(default = "default_twilight_altitude")]
    pub altitude_deg: f64,
    /// Shift applied to every computed dawn.
    #[serde(default)]
    pub dawn_offset_minutes: i64,
    /// Shift applied to every computed dusk.
    #[serde(default)]
    pub dusk_offset_minutes: i64,
    /// Margin before dawn after which no job may start.
    #[serde(default)]
    pub pre_dawn_minutes: i64,
}

/// Next-time search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSettings {
    /// How far a search looks ahead when no end bound is given.
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,
    /// Step of the search, in minutes.
    #[serde(default = "default_increment_minutes")]
    pub increment_minutes: u32,
}

/// Scheduler loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSettings {
    #[serde(default = "default_update_period_ms")]
    pub update_period_ms: u64,
    #[serde(default = "default_max_failure_attempts")]
    pub max_failure_attempts: u32,
}

/// Longest look-ahead a search may be configured with.
pub const MAX_HORIZON_DAYS: i64 = 366;
/// Largest shift, either way, a twilight offset or pre-dawn margin may carry.
pub const MAX_TWILIGHT_SHIFT_MINUTES: i64 = 12 * 60;

fn default_twilight_altitude() -> f64 {
    -18.0
}

fn default_horizon_days() -> i64 {
    7
}

fn default_increment_minutes() -> u32 {
    1
}

fn default_update_period_ms() -> u64 {
    1000
}

fn default_max_failure_attempts() -> u32 {
    5
}

impl Default for TwilightSettings {
    fn default() -> Self {
        Self {
            altitude_deg: default_twilight_altitude(),
            dawn_offset_minutes: 0,
            dusk_offset_minutes: 0,
            pre_dawn_minutes: 0,
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            increment_minutes: default_increment_minutes(),
        }
    }
}

impl Default for IterationSettings {
    fn default() -> Self {
        Self {
            update_period_ms: default_update_period_ms(),
            max_failure_attempts: default_max_failure_attempts(),
        }
    }
}

impl SearchSettings {
    pub fn horizon(&self) -> chrono::Duration {
        chrono::Duration::days(self.horizon_days)
    }
}

impl SchedulerConfig {
    /// Load scheduler configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(SchedulerConfig)` if successful
    /// * `Err(SchedulerError)` if the file cannot be read, parsed or validated
    pub fn from_file<P: AsRef<Path>>(path: P) -> SchedulerResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SchedulerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> SchedulerResult<Self> {
        let config: SchedulerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load scheduler configuration from the default location.
    ///
    /// Searches for `scheduler.toml` in:
    /// 1. Current directory
    /// 2. `obs_scheduler/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> SchedulerResult<Self> {
        let search_paths = [
            PathBuf::from("scheduler.toml"),
            PathBuf::from("obs_scheduler/scheduler.toml"),
            PathBuf::from("../scheduler.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                log::debug!("Loading scheduler configuration from {}", path.display());
                return Self::from_file(&path);
            }
        }

        Err(SchedulerError::Configuration(
            "No scheduler.toml found in standard locations".to_string(),
        ))
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> SchedulerResult<()> {
        if let Some(location) = &self.location {
            location.validate()?;
        }
        if !(-90.0..=0.0).contains(&self.twilight.altitude_deg) {
            return Err(SchedulerError::Configuration(format!(
                "twilight.altitude_deg must be between -90 and 0, got {}",
                self.twilight.altitude_deg
            )));
        }
        if !(0..=MAX_TWILIGHT_SHIFT_MINUTES).contains(&self.twilight.pre_dawn_minutes) {
            return Err(SchedulerError::Configuration(format!(
                "twilight.pre_dawn_minutes must be between 0 and {MAX_TWILIGHT_SHIFT_MINUTES}, got {}",
                self.twilight.pre_dawn_minutes
            )));
        }
        for (name, minutes) in [
            ("dawn_offset_minutes", self.twilight.dawn_offset_minutes),
            ("dusk_offset_minutes", self.twilight.dusk_offset_minutes),
        ] {
            if !(-MAX_TWILIGHT_SHIFT_MINUTES..=MAX_TWILIGHT_SHIFT_MINUTES).contains(&minutes) {
                return Err(SchedulerError::Configuration(format!(
                    "twilight.{name} must be within ±{MAX_TWILIGHT_SHIFT_MINUTES}, got {minutes}"
                )));
            }
        }
        if !(1..=MAX_HORIZON_DAYS).contains(&self.search.horizon_days) {
            return Err(SchedulerError::Configuration(format!(
                "search.horizon_days must be between 1 and {MAX_HORIZON_DAYS}, got {}",
                self.search.horizon_days
            )));
        }
        if self.search.increment_minutes == 0 {
            return Err(SchedulerError::Configuration(
                "search.increment_minutes must be at least 1".to_string(),
            ));
        }
        if self.iteration.max_failure_attempts == 0 {
            return Err(SchedulerError::Configuration(
                "iteration.max_failure_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
