//! Core error types for crewplan-core.
//!
//! This module defines the error hierarchy using thiserror. Allocation
//! failures are structural (bad ranges, negative input, unknown keys); unmet
//! demand and empty role pools are never errors and surface as plan warnings
//! instead.

use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::model::{InitiativeId, PersonId};

/// Core error type for crewplan-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Allocation engine errors
    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the planner, committer, and adjuster.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    /// Window start is after its end
    #[error("Invalid range: start ({start}) is after end ({end})")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// A day falls outside the initiative window
    #[error("Invalid range: {day} is outside the initiative window {start}..={end}")]
    DayOutsideWindow {
        day: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },

    /// Negative hours where only non-negative values make sense
    #[error("Negative input for '{field}': {value}")]
    NegativeInput { field: String, value: f64 },

    /// Hours above the per-cell maximum
    #[error("Hours out of range for '{field}': {value} (allowed 0..=24)")]
    HoursOutOfRange { field: String, value: f64 },

    /// Non-positive quantization step
    #[error("Invalid step: {0} (must be greater than zero)")]
    InvalidStep(f64),

    /// The initiative does not exist
    #[error("Initiative {0} not found")]
    MissingInitiative(InitiativeId),

    /// A referenced person is not in the directory snapshot
    #[error("Person {0} not found")]
    UnknownPerson(PersonId),

    /// A plan lists the same (person, date) twice
    #[error("Duplicate plan cell for person {person_id} on {date}")]
    DuplicateCell { person_id: PersonId, date: NaiveDate },

    /// The plan re-derived at apply time differs from the preview shown
    #[error("Preview is stale: expected fingerprint {expected}, current plan is {actual}")]
    StalePreview { expected: String, actual: String },
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Row lookup failed
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::from(err))
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_sqlite_error_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(DatabaseError::from(err), DatabaseError::Locked));
    }

    #[test]
    fn allocation_error_wraps_into_core_error() {
        let err: CoreError = AllocationError::InvalidStep(0.0).into();
        assert!(err.to_string().contains("Invalid step"));
    }

    #[test]
    fn day_outside_window_message_names_the_window() {
        let err = AllocationError::DayOutsideWindow {
            day: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            start: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid range: 2025-03-01 is outside the initiative window 2025-03-03..=2025-03-07"
        );
    }
}
