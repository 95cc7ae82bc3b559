use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use siderust::astro::ModifiedJulianDate as SiderustMJD;

/// MJD of 1970-01-01 00:00:00 UTC.
const MJD_UNIX_EPOCH: f64 = 40587.0;
/// Offset between Julian Date and Modified Julian Date.
const MJD_TO_JD: f64 = 2_400_000.5;
/// Julian Date of the J2000.0 epoch.
pub const J2000_JD: f64 = 2_451_545.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const DAYS_PER_CENTURY: f64 = 36_525.0;

/// Modified Julian Date, the time scale of the ephemeris formulae.
/// MJD 0 = 1858-11-17 00:00:00 UTC
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ModifiedJulianDate(qtty::Days);

impl ModifiedJulianDate {
    pub fn new<V: Into<qtty::Days>>(v: V) -> Self {
        Self(v.into())
    }

    pub fn value(&self) -> f64 {
        self.0.value()
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let seconds = dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9;
        Self::new(seconds / SECONDS_PER_DAY + MJD_UNIX_EPOCH)
    }

    /// UTC instant of this date, to the millisecond. `None` outside chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let millis = (self.value() - MJD_UNIX_EPOCH) * SECONDS_PER_DAY * 1000.0;
        if !millis.is_finite() {
            return None;
        }
        DateTime::from_timestamp_millis(millis.round() as i64)
    }

    pub fn to_siderust(&self) -> SiderustMJD {
        SiderustMJD::new(self.value())
    }

    pub fn from_siderust(mjd: &SiderustMJD) -> Self {
        Self::new(mjd.value())
    }

    pub fn julian_date(&self) -> f64 {
        self.value() + MJD_TO_JD
    }

    /// Days elapsed since J2000.0, the `n` / `d` of the low-precision formulae.
    pub fn days_since_j2000(&self) -> f64 {
        self.julian_date() - J2000_JD
    }

    /// Julian centuries since J2000.0.
    pub fn centuries_since_j2000(&self) -> f64 {
        self.days_since_j2000() / DAYS_PER_CENTURY
    }
}

impl From<DateTime<Utc>> for ModifiedJulianDate {
    fn from(dt: DateTime<Utc>) -> Self {
        ModifiedJulianDate::from_datetime(dt)
    }
}
