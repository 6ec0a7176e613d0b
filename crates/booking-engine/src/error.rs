//! Error types for booking-engine operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulingError {
    /// No resource profile matches the requested id.
    #[error("Unknown resource: {0}")]
    NotFound(String),

    /// A proposed slot, resource profile or configuration value is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The calendar data source failed. Never treated as "no conflicts".
    #[error("Busy intervals unavailable for {resource}: {source}")]
    DataUnavailable {
        resource: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Configuration read error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SchedulingError>;
