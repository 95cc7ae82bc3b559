//! Services built on top of the scheduling core.

pub mod iteration_driver;

pub use iteration_driver::{IterationDriver, IterationHandler};
