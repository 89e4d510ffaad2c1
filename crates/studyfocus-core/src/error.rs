//! Core error types for studyfocus-core.
//!
//! Errors never terminate the engine: the coordinator recovers locally from
//! configuration and persistence failures. These types exist so callers
//! (CLI, tests, gateways) can report what went wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for studyfocus-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Snapshot storage errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

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

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Value outside the editable range
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Dot-path key that does not exist
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Snapshot load/save errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to open the backing store
    #[error("Failed to open snapshot store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Snapshot could not be encoded or decoded
    #[error("Snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Snapshot written by a newer build
    #[error("Snapshot version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// Background writer has shut down
    #[error("Snapshot writer is closed")]
    WriterClosed,
}

/// Validation errors for user actions.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task already completed: {0}")]
    TaskCompleted(String),

    #[error("Task title must not be empty")]
    EmptyTitle,

    #[error("Invalid site '{input}': {message}")]
    InvalidUrl { input: String, message: String },

    #[error("A ticker is already attached to this session")]
    TickerAlreadyAttached,
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        PersistenceError::Query(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
