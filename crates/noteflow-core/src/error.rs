//! Error types for the noteflow service.

use thiserror::Error;

/// Result type alias using noteflow's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for noteflow operations.
///
/// Every variant maps onto one of the wire-level error codes surfaced in
/// task `error` fields and SSE `error` events via [`Error::kind`].
#[derive(Error, Debug)]
pub enum Error {
    /// Request validation failed (empty content, oversize image, too many notes).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The concurrency gate could not be acquired in time.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A model call failed permanently or exhausted its retries.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The task deadline was exceeded.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The task was cancelled by the user.
    #[error("Cancelled")]
    Cancelled,

    /// The persistence collaborator rejected a write.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation conflicts with current state (e.g. cancelling a terminal task).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed.
    #[error("Request error: {0}")]
    Request(String),

    /// File I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wire-level error code for the error taxonomy.
    ///
    /// Codes outside the task-failure taxonomy (`not_found`, `conflict`)
    /// only appear on synchronous API responses, never on task records.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::CapacityExceeded(_) => "capacity_exceeded",
            Error::ModelUnavailable(_) => "model_unavailable",
            Error::Timeout(_) => "timeout",
            Error::Cancelled => "cancelled",
            Error::PersistenceFailed(_) => "persistence_failed",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Serialization(_)
            | Error::Config(_)
            | Error::Request(_)
            | Error::Io(_)
            | Error::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
