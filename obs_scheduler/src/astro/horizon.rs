//! Artificial horizon profile.
//!
//! The profile is a closed polyline of (azimuth, minimum altitude) points.
//! Between two points the minimum altitude is interpolated linearly; the
//! segment between the last and the first point wraps through North.

use qtty::Degrees;
use serde::{Deserialize, Serialize};

use super::ArtificialHorizon;
use crate::error::{SchedulerError, SchedulerResult};

/// One vertex of the horizon polyline, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonPoint {
    pub azimuth: f64,
    pub altitude: f64,
}

/// Piecewise linear horizon profile.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonProfile {
    points: Vec<HorizonPoint>,
}

impl HorizonProfile {
    /// Build a profile from unordered points.
    pub fn new(mut points: Vec<HorizonPoint>) -> SchedulerResult<Self> {
        if points.is_empty() {
            return Err(SchedulerError::InvalidHorizon(
                "profile needs at least one point".to_string(),
            ));
        }
        for p in &points {
            if !(0.0..360.0).contains(&p.azimuth) {
                return Err(SchedulerError::InvalidHorizon(format!(
                    "azimuth {} is outside [0, 360)",
                    p.azimuth
                )));
            }
            if !(-90.0..=90.0).contains(&p.altitude) {
                return Err(SchedulerError::InvalidHorizon(format!(
                    "altitude {} is outside [-90, 90]",
                    p.altitude
                )));
            }
        }
        points.sort_by(|a, b| a.azimuth.total_cmp(&b.azimuth));
        if points.windows(2).any(|w| w[0].azimuth == w[1].azimuth) {
            return Err(SchedulerError::InvalidHorizon(
                "duplicate azimuth in profile".to_string(),
            ));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[HorizonPoint] {
        &self.points
    }

    /// Minimum visible altitude at an azimuth.
    pub fn min_altitude_at(&self, azimuth: Degrees) -> Degrees {
        let az = azimuth.value().rem_euclid(360.0);
        let n = self.points.len();
        if n == 1 {
            return Degrees::new(self.points[0].altitude);
        }

        // Index of the first vertex strictly east of `az`, wrapping to 0.
        let upper = self.points.partition_point(|p| p.azimuth <= az);
        let (lo, hi) = if upper == 0 || upper == n {
            (self.points[n - 1], self.points[0])
        } else {
            (self.points[upper - 1], self.points[upper])
        };

        let span = (hi.azimuth - lo.azimuth).rem_euclid(360.0);
        let offset = (az - lo.azimuth).rem_euclid(360.0);
        let fraction = if span == 0.0 { 0.0 } else { offset / span };
        Degrees::new(lo.altitude + fraction * (hi.altitude - lo.altitude))
    }
}

impl ArtificialHorizon for HorizonProfile {
    fn is_below_horizon(&self, azimuth: Degrees, altitude: Degrees) -> bool {
        altitude.value() < self.min_altitude_at(azimuth).value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(azimuth: f64, altitude: f64) -> HorizonPoint {
        HorizonPoint { azimuth, altitude }
    }

    #[test]
    fn test_interpolates_between_points() {
        let profile = HorizonProfile::new(vec![point(90.0, 10.0), point(180.0, 30.0)]).unwrap();
        let alt = profile.min_altitude_at(Degrees::new(135.0));
        assert!((alt.value() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_wraps_through_north() {
        let profile = HorizonProfile::new(vec![point(350.0, 10.0), point(10.0, 30.0)]).unwrap();
        assert!((profile.min_altitude_at(Degrees::new(0.0)).value() - 20.0).abs() < 1e-9);
        assert!((profile.min_altitude_at(Degrees::new(355.0)).value() - 15.0).abs() < 1e-9);
        assert!((profile.min_altitude_at(Degrees::new(5.0)).value() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_below_horizon() {
        let profile = HorizonProfile::new(vec![point(0.0, 20.0), point(180.0, 40.0)]).unwrap();
        assert!(profile.is_below_horizon(Degrees::new(180.0), Degrees::new(35.0)));
        assert!(!profile.is_below_horizon(Degrees::new(180.0), Degrees::new(45.0)));
        assert!(!profile.is_below_horizon(Degrees::new(0.0), Degrees::new(20.0)));
    }

    #[test]
    fn test_single_point_is_flat() {
        let profile = HorizonProfile::new(vec![point(42.0, 12.0)]).unwrap();
        assert_eq!(profile.min_altitude_at(Degrees::new(270.0)).value(), 12.0);
    }

    #[test]
    fn test_rejects_bad_profiles() {
        assert!(HorizonProfile::new(vec![]).is_err());
        assert!(HorizonProfile::new(vec![point(360.0, 10.0)]).is_err());
        assert!(HorizonProfile::new(vec![point(10.0, 91.0)]).is_err());
        assert!(HorizonProfile::new(vec![point(10.0, 5.0), point(10.0, 6.0)]).is_err());
    }
}
