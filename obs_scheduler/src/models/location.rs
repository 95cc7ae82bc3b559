//! Observer location.

use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};

/// Geographic location (latitude, longitude, elevation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    /// Latitude in decimal degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in decimal degrees (-180 to 180, East positive)
    pub longitude: f64,
    /// Elevation in meters above sea level (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_m: Option<f64>,
}

impl GeoLocation {
    pub fn new(latitude: f64, longitude: f64, elevation_m: Option<f64>) -> SchedulerResult<Self> {
        let location = Self {
            latitude,
            longitude,
            elevation_m,
        };
        location.validate()?;
        Ok(location)
    }

    /// Check the ranges of a location that was deserialized without going through [`GeoLocation::new`].
    pub fn validate(&self) -> SchedulerResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(SchedulerError::InvalidLocation(
                "Latitude must be between -90 and 90 degrees".to_string(),
            ));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(SchedulerError::InvalidLocation(
                "Longitude must be between -180 and 180 degrees".to_string(),
            ));
        }
        Ok(())
    }

    pub fn latitude(&self) -> qtty::Degrees {
        qtty::Degrees::new(self.latitude)
    }

    pub fn longitude(&self) -> qtty::Degrees {
        qtty::Degrees::new(self.longitude)
    }
}
