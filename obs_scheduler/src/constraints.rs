//! Constraint evaluation.
//!
//! Pure functions deciding whether a job's observing constraints hold at a
//! given instant. They never mutate anything and only read the
//! [`AstronomicalContext`] they are handed, so the same question always gets
//! the same answer.
//!
//! An undefined minimum altitude or Moon separation means "no constraint",
//! never zero.

use chrono::{DateTime, Utc};
use qtty::Degrees;
use serde::{Deserialize, Serialize};

use crate::astro::{AstronomicalContext, DawnDusk, HorizontalPosition, WeatherStatus};
use crate::models::EquatorialCoordinates;

/// Altitude at or below which a minimum altitude counts as undefined.
pub const UNDEFINED_ALTITUDE: f64 = -90.0;

/// Best possible Moon separation score.
pub const MAX_MOON_SCORE: u8 = 20;

/// Observing constraints of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobConstraints {
    min_altitude: Option<Degrees>,
    min_moon_separation: Option<Degrees>,
    pub enforce_weather: bool,
    pub enforce_twilight: bool,
    pub enforce_artificial_horizon: bool,
}

impl JobConstraints {
    pub fn min_altitude(&self) -> Option<Degrees> {
        self.min_altitude
    }

    /// Set the minimum altitude. Values at or below -90° clear the constraint.
    pub fn set_min_altitude(&mut self, value: Option<Degrees>) {
        self.min_altitude = value.filter(|v| v.value() > UNDEFINED_ALTITUDE);
    }

    pub fn has_min_altitude(&self) -> bool {
        self.min_altitude.is_some()
    }

    pub fn min_moon_separation(&self) -> Option<Degrees> {
        self.min_moon_separation
    }

    /// Set the minimum Moon separation. Non-positive values clear the constraint.
    pub fn set_min_moon_separation(&mut self, value: Option<Degrees>) {
        self.min_moon_separation = value.filter(|v| v.value() > 0.0);
    }

    pub fn has_min_moon_separation(&self) -> bool {
        self.min_moon_separation.is_some()
    }

    /// Whether anything restricts the altitude of the target.
    pub fn has_altitude_constraint(&self, ctx: &dyn AstronomicalContext) -> bool {
        self.has_min_altitude() || (self.enforce_artificial_horizon && ctx.horizon().is_some())
    }
}

/// Why a job cannot run at a given time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstraintViolation {
    #[error("altitude {altitude:.2}° < minAltitude {min_altitude:.2}°")]
    BelowMinAltitude { altitude: f64, min_altitude: f64 },

    #[error("altitude {altitude:.2}° is below the artificial horizon at azimuth {azimuth:.2}°")]
    BelowArtificialHorizon { azimuth: f64, altitude: f64 },

    #[error("moon separation {separation:.2}° < minMoonSeparation {min_separation:.2}°")]
    MoonTooClose { separation: f64, min_separation: f64 },

    #[error("outside astronomical night")]
    OutsideAstronomicalNight,

    #[error("weather status is {0:?}")]
    BadWeather(WeatherStatus),
}

/// Position of an instant relative to the astronomical night.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightWindow {
    /// The instant lies between dusk and the pre-dawn margin.
    pub is_night: bool,
    /// The classification holds for every instant before this one: the
    /// pre-dawn limit at night, the next dusk otherwise.
    pub boundary: DateTime<Utc>,
    /// When not at night, the next dusk.
    pub next_possible_success: Option<DateTime<Utc>>,
    pub dawn_dusk: DawnDusk,
}

/// Altitude, azimuth and setting flag of a target.
pub fn altitude(
    ctx: &dyn AstronomicalContext,
    target: &EquatorialCoordinates,
    when: DateTime<Utc>,
) -> HorizontalPosition {
    ctx.horizontal_at(target, when)
}

/// Classify `when` against the next dawn/dusk pair.
///
/// Dawn and dusk are the first events after `when`: if dawn comes first,
/// `when` falls inside a dusk-to-dawn interval.
pub fn night_window(ctx: &dyn AstronomicalContext, when: DateTime<Utc>) -> NightWindow {
    let dawn_dusk = ctx.dawn_dusk_after(when);
    let early_dawn = dawn_dusk.dawn - ctx.pre_dawn_margin();
    let is_night = dawn_dusk.dawn < dawn_dusk.dusk && when <= early_dawn;
    NightWindow {
        is_night,
        boundary: if is_night { early_dawn } else { dawn_dusk.dusk },
        next_possible_success: if is_night { None } else { Some(dawn_dusk.dusk) },
        dawn_dusk,
    }
}

/// Check the altitude part of the constraints at an azimuth.
///
/// The artificial horizon is consulted only when the job enforces it and a
/// profile is available.
pub fn satisfies_altitude_constraint(
    constraints: &JobConstraints,
    ctx: &dyn AstronomicalContext,
    azimuth: Degrees,
    altitude: Degrees,
) -> Result<(), ConstraintViolation> {
    if let Some(min) = constraints.min_altitude() {
        if altitude.value() < min.value() {
            return Err(ConstraintViolation::BelowMinAltitude {
                altitude: altitude.value(),
                min_altitude: min.value(),
            });
        }
    }

    if constraints.enforce_artificial_horizon {
        if let Some(horizon) = ctx.horizon() {
            if horizon.is_below_horizon(azimuth, altitude) {
                return Err(ConstraintViolation::BelowArtificialHorizon {
                    azimuth: azimuth.value(),
                    altitude: altitude.value(),
                });
            }
        }
    }

    Ok(())
}

/// Check the Moon separation constraint.
pub fn satisfies_moon_constraint(
    constraints: &JobConstraints,
    ctx: &dyn AstronomicalContext,
    target: &EquatorialCoordinates,
    when: DateTime<Utc>,
) -> Result<(), ConstraintViolation> {
    let Some(min) = constraints.min_moon_separation() else {
        return Ok(());
    };
    let separation = ctx.moon_separation_at(target, when);
    if separation.value() < min.value() {
        return Err(ConstraintViolation::MoonTooClose {
            separation: separation.value(),
            min_separation: min.value(),
        });
    }
    Ok(())
}

/// Constraints that depend only on the sky: altitude, horizon and Moon.
///
/// This is the predicate stepped through by the next-time search.
pub fn satisfies_sky_constraints(
    constraints: &JobConstraints,
    ctx: &dyn AstronomicalContext,
    target: &EquatorialCoordinates,
    when: DateTime<Utc>,
    position: &HorizontalPosition,
) -> Result<(), ConstraintViolation> {
    satisfies_altitude_constraint(constraints, ctx, position.azimuth, position.altitude)?;
    satisfies_moon_constraint(constraints, ctx, target, when)
}

/// Check every constraint of a job at `when`, for a target at `position`.
///
/// Weather is a present-time condition: it is only meaningful when `when` is now.
pub fn satisfies_constraints(
    constraints: &JobConstraints,
    ctx: &dyn AstronomicalContext,
    target: &EquatorialCoordinates,
    when: DateTime<Utc>,
    position: &HorizontalPosition,
) -> Result<(), ConstraintViolation> {
    satisfies_sky_constraints(constraints, ctx, target, when, position)?;

    if constraints.enforce_twilight && !night_window(ctx, when).is_night {
        return Err(ConstraintViolation::OutsideAstronomicalNight);
    }

    if constraints.enforce_weather {
        let status = ctx.weather_status();
        if status == WeatherStatus::Alert {
            return Err(ConstraintViolation::BadWeather(status));
        }
    }

    Ok(())
}

/// Score the Moon's interference with a target, from 0 (worst) to 20 (best).
///
/// The score grows with separation (steeply near the Moon), with the Moon's
/// zenith distance, and shrinks with the target's zenith distance and the
/// Moon's illumination. A violated minimum separation scores 0.
pub fn moon_separation_score(
    constraints: &JobConstraints,
    ctx: &dyn AstronomicalContext,
    target: &EquatorialCoordinates,
    when: DateTime<Utc>,
) -> u8 {
    let moon = ctx.moon_horizontal_at(when);
    let illumination = ctx.moon_illumination_at(when) * 100.0;
    let target_position = ctx.horizontal_at(target, when);
    let separation = ctx.moon_separation_at(target, when).value();

    let z_moon = 90.0 - moon.altitude.value();
    let z_target = 90.0 - target_position.altitude.value();

    if z_moon == z_target || illumination <= 0.0 || z_moon >= 90.0 {
        return MAX_MOON_SCORE;
    }

    if let Some(min) = constraints.min_moon_separation() {
        if separation < min.value() {
            return 0;
        }
    }

    let effect = (separation.powf(1.7) * z_moon.powf(0.5))
        / (z_target.abs().powf(1.1) * illumination.powf(0.5));
    if effect.is_nan() {
        return 0;
    }
    (effect.clamp(0.0, 100.0) / 5.0).floor() as u8
}
