//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use qtty::Degrees;

use obs_scheduler::astro::{
    ArtificialHorizon, AstronomicalContext, DawnDusk, HorizonProfile, HorizontalPosition,
    WeatherStatus,
};
use obs_scheduler::clock::{Clock, ManualClock};
use obs_scheduler::models::EquatorialCoordinates;

type AltitudeFn = Box<dyn Fn(DateTime<Utc>) -> f64 + Send + Sync>;

/// Astronomical context with scripted geometry.
///
/// Target altitude is a closure of time, twilight happens at fixed UTC hours
/// every day, and every astronomical query is counted.
pub struct ScriptedSky {
    pub clock: ManualClock,
    altitude: AltitudeFn,
    is_setting: bool,
    moon_separation: f64,
    moon_altitude: f64,
    moon_illumination: f64,
    twilight_hours: Option<(u32, u32)>,
    pre_dawn: Duration,
    horizon: Option<HorizonProfile>,
    weather: WeatherStatus,
    calls: AtomicUsize,
}

impl ScriptedSky {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            clock: ManualClock::new(now),
            altitude: Box::new(|_| 45.0),
            is_setting: false,
            moon_separation: 90.0,
            moon_altitude: -10.0,
            moon_illumination: 0.5,
            twilight_hours: None,
            pre_dawn: Duration::zero(),
            horizon: None,
            weather: WeatherStatus::Ok,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_altitude(mut self, f: impl Fn(DateTime<Utc>) -> f64 + Send + Sync + 'static) -> Self {
        self.altitude = Box::new(f);
        self
    }

    pub fn with_setting(mut self, is_setting: bool) -> Self {
        self.is_setting = is_setting;
        self
    }

    pub fn with_moon(mut self, separation: f64, altitude: f64, illumination: f64) -> Self {
        self.moon_separation = separation;
        self.moon_altitude = altitude;
        self.moon_illumination = illumination;
        self
    }

    /// Dusk and dawn at fixed UTC hours every day.
    pub fn with_twilight(mut self, dusk_hour: u32, dawn_hour: u32) -> Self {
        self.twilight_hours = Some((dusk_hour, dawn_hour));
        self
    }

    pub fn with_pre_dawn(mut self, margin: Duration) -> Self {
        self.pre_dawn = margin;
        self
    }

    pub fn with_horizon(mut self, horizon: HorizonProfile) -> Self {
        self.horizon = Some(horizon);
        self
    }

    pub fn with_weather(mut self, weather: WeatherStatus) -> Self {
        self.weather = weather;
        self
    }

    pub fn into_arc(self) -> Arc<ScriptedSky> {
        Arc::new(self)
    }

    /// Number of astronomical queries answered so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset_calls(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// First instant strictly after `when` at `hour`:00 UTC.
pub fn next_at_hour(when: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap();
    let candidate = when.date_naive().and_time(time).and_utc();
    if candidate > when {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

impl AstronomicalContext for ScriptedSky {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn horizontal_at(&self, _: &EquatorialCoordinates, when: DateTime<Utc>) -> HorizontalPosition {
        self.count();
        HorizontalPosition {
            altitude: Degrees::new((self.altitude)(when)),
            azimuth: Degrees::new(180.0),
            is_setting: self.is_setting,
        }
    }

    fn moon_separation_at(&self, _: &EquatorialCoordinates, _: DateTime<Utc>) -> Degrees {
        self.count();
        Degrees::new(self.moon_separation)
    }

    fn moon_horizontal_at(&self, _: DateTime<Utc>) -> HorizontalPosition {
        self.count();
        HorizontalPosition {
            altitude: Degrees::new(self.moon_altitude),
            azimuth: Degrees::new(90.0),
            is_setting: false,
        }
    }

    fn moon_illumination_at(&self, _: DateTime<Utc>) -> f64 {
        self.moon_illumination
    }

    fn dawn_dusk_after(&self, when: DateTime<Utc>) -> DawnDusk {
        self.count();
        match self.twilight_hours {
            Some((dusk_hour, dawn_hour)) => DawnDusk {
                dawn: next_at_hour(when, dawn_hour),
                dusk: next_at_hour(when, dusk_hour),
            },
            // Permanent night.
            None => DawnDusk {
                dawn: when + Duration::days(365),
                dusk: when + Duration::days(366),
            },
        }
    }

    fn pre_dawn_margin(&self) -> Duration {
        self.pre_dawn
    }

    fn horizon(&self) -> Option<&dyn ArtificialHorizon> {
        self.horizon.as_ref().map(|h| h as &dyn ArtificialHorizon)
    }

    fn weather_status(&self) -> WeatherStatus {
        self.weather
    }
}

/// Altitude of `high` in `[up, down)` and `low` elsewhere.
pub fn window_altitude(
    up: DateTime<Utc>,
    down: DateTime<Utc>,
    high: f64,
    low: f64,
) -> impl Fn(DateTime<Utc>) -> f64 + Send + Sync + 'static {
    move |t| if t >= up && t < down { high } else { low }
}

/// 2026-01-15 at `hour`:`minute` UTC.
pub fn jan15(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, hour, minute, 0).unwrap()
}

/// 2026-01-16 at `hour`:`minute` UTC.
pub fn jan16(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 16, hour, minute, 0).unwrap()
}

pub fn m31() -> EquatorialCoordinates {
    EquatorialCoordinates::new(10.684, 41.269).unwrap()
}
