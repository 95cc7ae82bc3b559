//! Astronomical context consumed by the scheduling core.
//!
//! The core never computes ephemerides directly: it asks an
//! [`AstronomicalContext`] for positions and twilight boundaries. The
//! [`Ephemeris`] type is the built-in implementation over siderust; tests and
//! embedders supply their own.

pub mod context;
pub mod ephemeris;
pub mod horizon;

pub use context::*;
pub use ephemeris::Ephemeris;
pub use horizon::{HorizonPoint, HorizonProfile};
