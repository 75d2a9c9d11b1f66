//! Error types for the txt-insight library.
//!
//! This module provides custom error types using `thiserror` so callers can
//! tell a missing contact from an unreachable store from a failed query.

use thiserror::Error;

/// Errors that can occur in the txt-insight library.
#[derive(Error, Debug)]
pub enum InsightError {
    /// No resolution tier matched the name query
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    /// The message store could not be opened (missing file, permission denied)
    #[error("Message store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed parameters or a store-level execution error
    #[error("Query failed: {0}")]
    QueryFailure(#[from] rusqlite::Error),

    /// Caller supplied an out-of-range or malformed argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A classification pattern failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML contact snapshot errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl InsightError {
    /// Whether the error ends the requested operation outright.
    ///
    /// Terminal errors are surfaced to the caller and never retried here.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ContactNotFound(_) | Self::StoreUnavailable(_))
    }
}

/// Convenience type alias for Result with `InsightError`
pub type Result<T> = std::result::Result<T, InsightError>;

impl From<config::ConfigError> for InsightError {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}
