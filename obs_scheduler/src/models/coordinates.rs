//! Equatorial target coordinates.

use chrono::{DateTime, Utc};
use qtty::Degrees;
use serde::{Deserialize, Serialize};

use crate::error::{SchedulerError, SchedulerResult};
use crate::models::ModifiedJulianDate;

/// Right ascension / declination pair, both in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquatorialCoordinates {
    pub ra: Degrees,
    pub dec: Degrees,
}

impl Default for EquatorialCoordinates {
    fn default() -> Self {
        Self {
            ra: Degrees::new(0.0),
            dec: Degrees::new(0.0),
        }
    }
}

impl EquatorialCoordinates {
    /// Build coordinates from degrees, rejecting out-of-range values.
    pub fn new(ra_deg: f64, dec_deg: f64) -> SchedulerResult<Self> {
        let coords = Self {
            ra: Degrees::new(ra_deg),
            dec: Degrees::new(dec_deg),
        };
        coords.validate()?;
        Ok(coords)
    }

    /// Build coordinates from right ascension in hours and declination in degrees.
    pub fn from_hours(ra_hours: f64, dec_deg: f64) -> SchedulerResult<Self> {
        Self::new(ra_hours * 15.0, dec_deg)
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        let ra = self.ra.value();
        let dec = self.dec.value();
        if !ra.is_finite() || !(0.0..360.0).contains(&ra) {
            return Err(SchedulerError::InvalidCoordinates(format!(
                "right ascension {ra} is outside [0, 360)"
            )));
        }
        if !dec.is_finite() || !(-90.0..=90.0).contains(&dec) {
            return Err(SchedulerError::InvalidCoordinates(format!(
                "declination {dec} is outside [-90, 90]"
            )));
        }
        Ok(())
    }

    /// Right ascension in hours.
    pub fn ra_hours(&self) -> f64 {
        self.ra.value() / 15.0
    }

    /// Angular distance to another position, in degrees.
    pub fn separation(&self, other: &EquatorialCoordinates) -> Degrees {
        let (ra1, dec1) = (self.ra.value().to_radians(), self.dec.value().to_radians());
        let (ra2, dec2) = (other.ra.value().to_radians(), other.dec.value().to_radians());
        let cos_sep = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * (ra1 - ra2).cos();
        Degrees::new(cos_sep.clamp(-1.0, 1.0).acos().to_degrees())
    }

    /// Precess J2000 coordinates to the mean equinox of `when` (Meeus, ch. 21).
    pub fn precessed_to(&self, when: DateTime<Utc>) -> EquatorialCoordinates {
        let t = ModifiedJulianDate::from_datetime(when).centuries_since_j2000();
        let arcsec = |v: f64| (v / 3600.0).to_radians();
        let zeta = arcsec(2306.2181 * t + 0.30188 * t * t + 0.017998 * t * t * t);
        let z = arcsec(2306.2181 * t + 1.09468 * t * t + 0.018203 * t * t * t);
        let theta = arcsec(2004.3109 * t - 0.42665 * t * t - 0.041833 * t * t * t);

        let ra0 = self.ra.value().to_radians();
        let dec0 = self.dec.value().to_radians();

        let a = dec0.cos() * (ra0 + zeta).sin();
        let b = theta.cos() * dec0.cos() * (ra0 + zeta).cos() - theta.sin() * dec0.sin();
        let c = theta.sin() * dec0.cos() * (ra0 + zeta).cos() + theta.cos() * dec0.sin();

        let ra = (a.atan2(b) + z).to_degrees().rem_euclid(360.0);
        let dec = c.clamp(-1.0, 1.0).asin().to_degrees();
        EquatorialCoordinates {
            ra: Degrees::new(ra),
            dec: Degrees::new(dec),
        }
    }
}
