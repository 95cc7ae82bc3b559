//! # Observation Scheduler Core
//!
//! Decision logic for an astronomical observation scheduler: can a job run,
//! and when.
//!
//! ## Features
//!
//! - **Constraints**: minimum altitude, Moon separation, astronomical twilight,
//!   artificial horizon and weather, each failure reported with a reason
//! - **Next-time search**: stepped search for the next start and end of a
//!   job's observable window, memoised per job
//! - **Job model**: status/stage lifecycle, file vs effective startup, repeat
//!   and capture progress, JSON records
//! - **Process state**: startup/shutdown/park sub-states, connection states,
//!   bounded failure counters and the iteration timer
//! - **Ephemeris**: astronomical night from siderust, target and Moon
//!   positions for a geographic location
//!
//! ## Architecture
//!
//! - [`astro`]: the [`AstronomicalContext`](astro::AstronomicalContext) seam,
//!   the built-in [`Ephemeris`](astro::Ephemeris) and horizon profiles
//! - [`constraints`]: pure constraint evaluation
//! - [`job`]: the [`SchedulerJob`](job::SchedulerJob) entity, its search and cache
//! - [`state`]: the [`SchedulerModuleState`](state::SchedulerModuleState) machine
//! - [`services`]: the async [`IterationDriver`](services::IterationDriver)
//! - [`config`], [`clock`], [`models`], [`error`]: ambient support
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use obs_scheduler::astro::{AstronomicalContext, Ephemeris};
//! use obs_scheduler::clock::SystemClock;
//! use obs_scheduler::config::SchedulerConfig;
//! use obs_scheduler::job::SchedulerJob;
//! use obs_scheduler::models::EquatorialCoordinates;
//!
//! # fn main() -> Result<(), obs_scheduler::error::SchedulerError> {
//! let config = SchedulerConfig::from_default_location()?;
//! let ephemeris = Arc::new(Ephemeris::from_config(&config, Arc::new(SystemClock))?);
//!
//! let mut job = SchedulerJob::new("M31", ephemeris.clone());
//! job.set_target(EquatorialCoordinates::new(10.684, 41.269)?);
//! job.set_enforce_twilight(true);
//!
//! let start = job.next_possible_start_time(ephemeris.now(), 1, false, None);
//! println!("M31 can start at {start:?}");
//! # Ok(())
//! # }
//! ```

pub mod astro;
pub mod clock;
pub mod config;
pub mod constraints;
pub mod error;
pub mod job;
pub mod models;
pub mod services;
pub mod state;

pub use error::{SchedulerError, SchedulerResult};
