//! Error types for the scheduling core.
//!
//! Constraint failures are not errors: they are reported as
//! [`ConstraintViolation`](crate::constraints::ConstraintViolation) values so the
//! caller can explain why a job is ineligible. The variants below cover the
//! failures the core cannot recover from on its own (bad configuration, bad
//! input records, a failing iteration handler).

use std::path::PathBuf;

/// Result type for scheduling core operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Error type for scheduling core operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML content could not be parsed.
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON content could not be parsed or produced.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Observer location is out of range.
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// Target coordinates are out of range.
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// Artificial horizon profile is malformed.
    #[error("Invalid horizon profile: {0}")]
    InvalidHorizon(String),

    /// A persisted job record violates a job invariant.
    #[error("Invalid job record '{name}': {reason}")]
    InvalidRecord { name: String, reason: String },

    /// The iteration handler reported a failure.
    #[error("Iteration failed: {0}")]
    Iteration(String),
}

impl SchedulerError {
    /// Build an [`SchedulerError::InvalidRecord`] for the named job.
    pub fn invalid_record(name: impl Into<String>, reason: impl Into<String>) -> Self {
        SchedulerError::InvalidRecord {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
