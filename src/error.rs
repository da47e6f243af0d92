//! Error types.
//!
//! Collaborator failures are [`SourceError`]s, cache write failures are
//! [`CacheError`]s, and everything the orchestrators hand back to a caller
//! is a [`CensusError`]. Only `CensusError` knows how it is presented to
//! the outside world.

use serde::Serialize;
use thiserror::Error;

/// Public message for a rejected request.
pub const INVALID_REQUEST_MESSAGE: &str = "Invalid Request";

/// Public message for a failed aggregation. Never carries upstream detail.
pub const INTERNAL_ERROR_MESSAGE: &str = "An Internal Error Occurred";

/// A data source call that did not produce a value.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store for `source` errored or could not be reached.
    #[error("{source_name} unavailable: {message}")]
    Unavailable {
        source_name: &'static str,
        message: String,
    },

    /// A fan-out task panicked or was aborted before reporting.
    #[error("fan-out task failed: {0}")]
    Task(String),
}

impl SourceError {
    #[allow(dead_code)]
    pub fn unavailable(source_name: &'static str, message: impl Into<String>) -> Self {
        SourceError::Unavailable {
            source_name,
            message: message.into(),
        }
    }
}

impl From<tokio::task::JoinError> for SourceError {
    fn from(err: tokio::task::JoinError) -> Self {
        SourceError::Task(err.to_string())
    }
}

/// A cache write that did not happen. Logged, never propagated.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot cache an entry without a key")]
    MissingKey,

    #[error("cannot cache an entry without a body")]
    MissingBody,

    #[error("cache serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the census and league orchestrators.
#[derive(Debug, Error)]
pub enum CensusError {
    /// Missing or malformed input, detected before any I/O.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Aggregation failed somewhere in the fan-out tree.
    #[error("aggregation failed: {0}")]
    Internal(#[from] SourceError),

    /// The aggregated document could not be serialized.
    #[error("failed to encode response: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// JSON body sent alongside a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub message: &'static str,
}

impl CensusError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        CensusError::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// HTTP-equivalent status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            CensusError::InvalidRequest { .. } => 400,
            CensusError::Internal(_) | CensusError::Encoding(_) => 500,
        }
    }

    /// The fixed, caller-facing body for this error.
    pub fn error_body(&self) -> ErrorBody {
        let message = match self {
            CensusError::InvalidRequest { .. } => INVALID_REQUEST_MESSAGE,
            CensusError::Internal(_) | CensusError::Encoding(_) => INTERNAL_ERROR_MESSAGE,
        };
        ErrorBody { message }
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            CensusError::InvalidRequest { .. } => 2,
            CensusError::Internal(_) | CensusError::Encoding(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_maps_to_400() {
        let err = CensusError::invalid("missing billId");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_body().message, "Invalid Request");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_internal_error_hides_upstream_text() {
        let err = CensusError::from(SourceError::unavailable(
            "population",
            "connection refused to 10.0.0.4:3306",
        ));
        assert_eq!(err.status_code(), 500);

        let body = serde_json::to_string(&err.error_body()).unwrap();
        assert_eq!(body, r#"{"message":"An Internal Error Occurred"}"#);
        assert!(!body.contains("10.0.0.4"));
    }
}
