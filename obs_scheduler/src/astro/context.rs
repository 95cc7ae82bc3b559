use chrono::{DateTime, Duration, Utc};
use qtty::Degrees;
use serde::{Deserialize, Serialize};

use crate::models::EquatorialCoordinates;

/// Horizontal position of a body at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizontalPosition {
    pub altitude: Degrees,
    /// Azimuth measured from North through East.
    pub azimuth: Degrees,
    /// Whether the body is west of the meridian, i.e. losing altitude.
    pub is_setting: bool,
}

/// The first astronomical dawn and dusk strictly after a reference time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DawnDusk {
    pub dawn: DateTime<Utc>,
    pub dusk: DateTime<Utc>,
}

/// Weather station verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherStatus {
    #[default]
    Idle,
    Ok,
    Warning,
    Alert,
}

/// Occlusion profile of the local horizon.
pub trait ArtificialHorizon: Send + Sync {
    /// Whether a position is hidden by the horizon profile.
    fn is_below_horizon(&self, azimuth: Degrees, altitude: Degrees) -> bool;
}

/// Read-only view of location, horizon, weather and time used by constraint evaluation.
///
/// Implementations must be pure functions of (location, time, ephemeris):
/// the start-time cache relies on repeated queries giving the same answer.
pub trait AstronomicalContext: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;

    /// Altitude, azimuth and setting flag of a J2000 target.
    fn horizontal_at(&self, target: &EquatorialCoordinates, when: DateTime<Utc>) -> HorizontalPosition;

    /// Angular distance between a J2000 target and the Moon.
    fn moon_separation_at(&self, target: &EquatorialCoordinates, when: DateTime<Utc>) -> Degrees;

    /// Horizontal position of the Moon.
    fn moon_horizontal_at(&self, when: DateTime<Utc>) -> HorizontalPosition;

    /// Illuminated fraction of the Moon, in [0, 1].
    fn moon_illumination_at(&self, when: DateTime<Utc>) -> f64;

    /// First astronomical dawn and dusk strictly after `when`, offsets applied.
    fn dawn_dusk_after(&self, when: DateTime<Utc>) -> DawnDusk;

    /// Margin before dawn during which a job is no longer considered to run at night.
    fn pre_dawn_margin(&self) -> Duration {
        Duration::zero()
    }

    /// Artificial horizon profile, if one is configured.
    fn horizon(&self) -> Option<&dyn ArtificialHorizon> {
        None
    }

    /// Latest weather verdict.
    fn weather_status(&self) -> WeatherStatus {
        WeatherStatus::Idle
    }
}
