use serde::{Deserialize, Serialize};
use std::fmt;

/// A subsystem whose failures are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    EkosConnect,
    IndiConnect,
    Focus,
    Guide,
    Align,
    Capture,
    ParkingCap,
    ParkingMount,
    ParkingDome,
}

impl Subsystem {
    pub const ALL: [Subsystem; 9] = [
        Subsystem::EkosConnect,
        Subsystem::IndiConnect,
        Subsystem::Focus,
        Subsystem::Guide,
        Subsystem::Align,
        Subsystem::Capture,
        Subsystem::ParkingCap,
        Subsystem::ParkingMount,
        Subsystem::ParkingDome,
    ];

    /// Counters cleared by [`FailureCounters::reset_operational`].
    pub const OPERATIONAL: [Subsystem; 6] = [
        Subsystem::EkosConnect,
        Subsystem::IndiConnect,
        Subsystem::Focus,
        Subsystem::Guide,
        Subsystem::Align,
        Subsystem::Capture,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Subsystem::EkosConnect => "Ekos connection",
            Subsystem::IndiConnect => "INDI connection",
            Subsystem::Focus => "focus",
            Subsystem::Guide => "guide",
            Subsystem::Align => "align",
            Subsystem::Capture => "capture",
            Subsystem::ParkingCap => "cap parking",
            Subsystem::ParkingMount => "mount parking",
            Subsystem::ParkingDome => "dome parking",
        })
    }
}

/// Bounded failure counters, one per subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureCounters {
    counts: [u32; Subsystem::ALL.len()],
    max_attempts: u32,
}

impl FailureCounters {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    pub fn new(max_attempts: u32) -> Self {
        Self {
            counts: [0; Subsystem::ALL.len()],
            max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Count one more failure. Returns whether another attempt is allowed.
    pub fn increase(&mut self, subsystem: Subsystem) -> bool {
        let count = &mut self.counts[subsystem.index()];
        *count = count.saturating_add(1);
        *count <= self.max_attempts
    }

    pub fn count(&self, subsystem: Subsystem) -> u32 {
        self.counts[subsystem.index()]
    }

    pub fn reset(&mut self, subsystem: Subsystem) {
        self.counts[subsystem.index()] = 0;
    }

    /// Clear the connection and operation counters. Parking counters are kept.
    pub fn reset_operational(&mut self) {
        for subsystem in Subsystem::OPERATIONAL {
            self.reset(subsystem);
        }
    }
}

impl Default for FailureCounters {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}
