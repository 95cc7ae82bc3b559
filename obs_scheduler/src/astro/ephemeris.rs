//! Ephemeris adapter for a fixed observer.
//!
//! Astronomical night comes from siderust's solar altitude periods. Target and
//! Moon positions use the low-precision formulae of the Astronomical Almanac
//! (Moon ~0.3°), which is plenty for altitude limits and Moon separation.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use qtty::{Degrees, Meter, Quantity};
use siderust::calculus::solar::altitude_periods::find_night_periods;
use siderust::coordinates::centers::ObserverSite;
use siderust::time::Period as SiderustPeriod;
use std::sync::Arc;

use super::{ArtificialHorizon, AstronomicalContext, DawnDusk, HorizonProfile, HorizontalPosition, WeatherStatus};
use crate::clock::Clock;
use crate::config::{SchedulerConfig, TwilightSettings};
use crate::error::{SchedulerError, SchedulerResult};
use crate::models::{EquatorialCoordinates, GeoLocation, ModifiedJulianDate};

/// How far ahead twilight is searched for before assuming polar day or night.
const NIGHT_SCAN_DAYS: i64 = 2;
/// How far back night periods are fetched, so offsets can pull a boundary past `when`.
const NIGHT_LOOKBACK_DAYS: i64 = 1;

/// Night periods found around a reference time.
#[derive(Debug, Clone, PartialEq)]
struct NightPeriods {
    /// Whether the reference time lies inside a night.
    contains_reference: bool,
    /// Real dusks (period starts not clipped by the search window).
    dusks: Vec<DateTime<Utc>>,
    /// Real dawns (period ends not clipped by the search window).
    dawns: Vec<DateTime<Utc>>,
}

/// Ephemeris for a fixed observer.
pub struct Ephemeris {
    location: GeoLocation,
    clock: Arc<dyn Clock>,
    twilight: TwilightSettings,
    horizon: Option<HorizonProfile>,
    weather: RwLock<WeatherStatus>,
}

impl std::fmt::Debug for Ephemeris {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ephemeris")
            .field("location", &self.location)
            .field("twilight", &self.twilight)
            .field("horizon", &self.horizon)
            .finish_non_exhaustive()
    }
}

impl Ephemeris {
    pub fn new(location: GeoLocation, clock: Arc<dyn Clock>) -> Self {
        Self {
            location,
            clock,
            twilight: TwilightSettings::default(),
            horizon: None,
            weather: RwLock::new(WeatherStatus::Idle),
        }
    }

    /// Build an ephemeris from the location, twilight and horizon sections of a config.
    pub fn from_config(config: &SchedulerConfig, clock: Arc<dyn Clock>) -> SchedulerResult<Self> {
        let location = config.location.clone().ok_or_else(|| {
            SchedulerError::Configuration("a [location] section is required".to_string())
        })?;
        location.validate()?;
        let mut ephemeris = Self::new(location, clock).with_twilight(config.twilight.clone());
        if !config.horizon.is_empty() {
            ephemeris = ephemeris.with_horizon(HorizonProfile::new(config.horizon.clone())?);
        }
        Ok(ephemeris)
    }

    pub fn with_twilight(mut self, twilight: TwilightSettings) -> Self {
        self.twilight = twilight;
        self
    }

    pub fn with_horizon(mut self, horizon: HorizonProfile) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn location(&self) -> &GeoLocation {
        &self.location
    }

    /// Record the latest weather verdict.
    pub fn set_weather_status(&self, status: WeatherStatus) {
        *self.weather.write() = status;
    }

    fn observer_site(&self) -> ObserverSite {
        ObserverSite::new(
            Degrees::new(self.location.longitude),
            Degrees::new(self.location.latitude),
            Quantity::<Meter>::new(self.location.elevation_m.unwrap_or(0.0)),
        )
    }

    /// Nights, with the Sun below the twilight altitude, overlapping `[from, to]`.
    pub fn night_periods(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
        let search = SiderustPeriod::new(
            ModifiedJulianDate::from(from).to_siderust(),
            ModifiedJulianDate::from(to).to_siderust(),
        );
        let threshold = Degrees::new(self.twilight.altitude_deg);

        find_night_periods(self.observer_site(), search, threshold)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| {
                let start = ModifiedJulianDate::from_siderust(&p.start).to_datetime()?;
                let end = ModifiedJulianDate::from_siderust(&p.end).to_datetime()?;
                Some((start, end))
            })
            .collect()
    }

    fn nights_around(&self, when: DateTime<Utc>) -> NightPeriods {
        let from = when - Duration::days(NIGHT_LOOKBACK_DAYS);
        let to = when + Duration::days(NIGHT_SCAN_DAYS);
        let mut nights = NightPeriods {
            contains_reference: false,
            dusks: Vec::new(),
            dawns: Vec::new(),
        };
        for (start, end) in self.night_periods(from, to) {
            if start <= when && when < end {
                nights.contains_reference = true;
            }
            if start > from {
                nights.dusks.push(start);
            }
            if end < to {
                nights.dawns.push(end);
            }
        }
        nights
    }

    /// Local mean sidereal time, in degrees.
    pub fn local_sidereal_time(&self, when: DateTime<Utc>) -> f64 {
        let mjd = ModifiedJulianDate::from_datetime(when);
        let d = mjd.days_since_j2000();
        let t = mjd.centuries_since_j2000();
        let gmst = 280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t
            - t * t * t / 38_710_000.0;
        (gmst + self.location.longitude).rem_euclid(360.0)
    }

    /// Geocentric ecliptic longitude of the Sun, in degrees.
    fn sun_longitude(when: DateTime<Utc>) -> f64 {
        let n = ModifiedJulianDate::from_datetime(when).days_since_j2000();
        let mean_anomaly = (357.528 + 0.985_600_3 * n).to_radians();
        280.460 + 0.985_647_4 * n + 1.915 * mean_anomaly.sin() + 0.020 * (2.0 * mean_anomaly).sin()
    }

    /// Geocentric ecliptic longitude and latitude of the Moon, in degrees.
    fn moon_ecliptic(when: DateTime<Utc>) -> (f64, f64) {
        let t = ModifiedJulianDate::from_datetime(when).centuries_since_j2000();
        let s = |deg: f64| deg.to_radians().sin();

        let lambda = 218.32 + 481_267.881 * t
            + 6.29 * s(135.0 + 477_198.87 * t)
            - 1.27 * s(259.3 - 413_335.36 * t)
            + 0.66 * s(235.7 + 890_534.22 * t)
            + 0.21 * s(269.9 + 954_397.74 * t)
            - 0.19 * s(357.5 + 35_999.05 * t)
            - 0.11 * s(186.5 + 966_404.03 * t);
        let beta = 5.13 * s(93.3 + 483_202.02 * t)
            + 0.28 * s(228.2 + 960_400.89 * t)
            - 0.28 * s(318.3 + 6_003.15 * t)
            - 0.17 * s(217.6 - 407_332.21 * t);
        (lambda, beta)
    }

    /// Geocentric equatorial position of the Moon (equinox of date).
    pub fn moon_position(&self, when: DateTime<Utc>) -> EquatorialCoordinates {
        let t = ModifiedJulianDate::from_datetime(when).centuries_since_j2000();
        let (lambda, beta) = Self::moon_ecliptic(when);
        let lambda = lambda.to_radians();
        let beta = beta.to_radians();
        let epsilon = (23.439_291 - 0.013_004_2 * t).to_radians();

        let ra = (lambda.sin() * epsilon.cos() - beta.tan() * epsilon.sin()).atan2(lambda.cos());
        let dec = (beta.sin() * epsilon.cos() + beta.cos() * epsilon.sin() * lambda.sin())
            .clamp(-1.0, 1.0)
            .asin();
        EquatorialCoordinates {
            ra: Degrees::new(ra.to_degrees().rem_euclid(360.0)),
            dec: Degrees::new(dec.to_degrees()),
        }
    }

    /// Horizontal position of coordinates already referred to the equinox of date.
    fn to_horizontal(&self, position: &EquatorialCoordinates, when: DateTime<Utc>) -> HorizontalPosition {
        let hour_angle = (self.local_sidereal_time(when) - position.ra.value()).rem_euclid(360.0);
        let h = hour_angle.to_radians();
        let dec = position.dec.value().to_radians();
        let lat = self.location.latitude.to_radians();

        let sin_alt = lat.sin() * dec.sin() + lat.cos() * dec.cos() * h.cos();
        let altitude = sin_alt.clamp(-1.0, 1.0).asin();
        let azimuth = (-h.sin() * dec.cos()).atan2(lat.cos() * dec.sin() - lat.sin() * dec.cos() * h.cos());

        HorizontalPosition {
            altitude: Degrees::new(altitude.to_degrees()),
            azimuth: Degrees::new(azimuth.to_degrees().rem_euclid(360.0)),
            // West of the meridian: hour angle in (0, 180).
            is_setting: hour_angle > 0.0 && hour_angle < 180.0,
        }
    }
}

impl AstronomicalContext for Ephemeris {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn horizontal_at(&self, target: &EquatorialCoordinates, when: DateTime<Utc>) -> HorizontalPosition {
        self.to_horizontal(&target.precessed_to(when), when)
    }

    fn moon_separation_at(&self, target: &EquatorialCoordinates, when: DateTime<Utc>) -> Degrees {
        self.moon_position(when).separation(&target.precessed_to(when))
    }

    fn moon_horizontal_at(&self, when: DateTime<Utc>) -> HorizontalPosition {
        self.to_horizontal(&self.moon_position(when), when)
    }

    fn moon_illumination_at(&self, when: DateTime<Utc>) -> f64 {
        let (lambda, beta) = Self::moon_ecliptic(when);
        let cos_elongation =
            beta.to_radians().cos() * (lambda - Self::sun_longitude(when)).to_radians().cos();
        // Phase angle ~ 180° - elongation for a geocentric observer.
        ((1.0 - cos_elongation) / 2.0).clamp(0.0, 1.0)
    }

    fn dawn_dusk_after(&self, when: DateTime<Utc>) -> DawnDusk {
        let dusk_offset = Duration::minutes(self.twilight.dusk_offset_minutes);
        let dawn_offset = Duration::minutes(self.twilight.dawn_offset_minutes);
        let nights = self.nights_around(when);

        let dusk = nights.dusks.iter().map(|d| *d + dusk_offset).find(|d| *d > when);
        let dawn = nights.dawns.iter().map(|d| *d + dawn_offset).find(|d| *d > when);
        match (dawn, dusk) {
            (Some(dawn), Some(dusk)) => DawnDusk { dawn, dusk },
            _ => {
                // Polar day or night: no twilight boundary within reach.
                let far = when + Duration::days(NIGHT_SCAN_DAYS);
                let far_dawn = dawn.unwrap_or(far);
                let far_dusk = dusk.unwrap_or(far);
                if nights.contains_reference {
                    DawnDusk {
                        dawn: far_dawn,
                        dusk: far_dusk.max(far_dawn + Duration::minutes(1)),
                    }
                } else {
                    DawnDusk {
                        dawn: far_dawn.max(far_dusk + Duration::minutes(1)),
                        dusk: far_dusk,
                    }
                }
            }
        }
    }

    fn pre_dawn_margin(&self) -> Duration {
        Duration::minutes(self.twilight.pre_dawn_minutes)
    }

    fn horizon(&self) -> Option<&dyn ArtificialHorizon> {
        self.horizon.as_ref().map(|h| h as &dyn ArtificialHorizon)
    }

    fn weather_status(&self) -> WeatherStatus {
        *self.weather.read()
    }
}
