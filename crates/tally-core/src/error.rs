//! Core error types for the telemetry engine

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for telemetry operations
pub type TallyResult<T> = Result<T, TallyError>;

/// Main error type for the telemetry engine
///
/// Each variant is one of the engine's named failure classifications, so
/// callers and tests can tell which path was taken. Load and save failures
/// are absorbed locally (logged, state retained); only delta-import
/// validation is surfaced to callers.
#[derive(Error, Debug, Clone)]
pub enum TallyError {
    /// Snapshot file was unreadable or structurally invalid; the engine
    /// proceeds with defaults
    #[error("Snapshot load error: {message}")]
    SnapshotLoad { message: String },

    /// Snapshot file could not be written; in-memory state is retained and
    /// the next flush retries
    #[error("Snapshot save error for {}: {message}", path.display())]
    SnapshotSave { path: PathBuf, message: String },

    /// Delta import payload was empty or contained a negative value
    #[error("Invalid delta import: {message}")]
    InvalidDelta { message: String },
}

impl TallyError {
    /// Create a snapshot load error
    pub fn load(message: impl Into<String>) -> Self {
        Self::SnapshotLoad {
            message: message.into(),
        }
    }

    /// Create a snapshot save error
    pub fn save(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SnapshotSave {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a delta validation error
    pub fn invalid_delta(message: impl Into<String>) -> Self {
        Self::InvalidDelta {
            message: message.into(),
        }
    }

    /// Get the error code for programmatic handling
    pub fn error_code(&self) -> &str {
        match self {
            Self::SnapshotLoad { .. } => "SNAPSHOT_LOAD",
            Self::SnapshotSave { .. } => "SNAPSHOT_SAVE",
            Self::InvalidDelta { .. } => "INVALID_DELTA",
        }
    }
}
