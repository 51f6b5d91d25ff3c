//! Error types for the inference service client.
//!
//! # Design
//! Every failure the client can produce lands in one `ApiError`. The variant
//! tells the caller where the call broke down: local input validation, the
//! network, the server, or JSON decoding. `Server` keeps the raw status code
//! and body because the service reports its own reason in the body
//! (`{"error":"model 'x' not found"}`) and callers routinely surface it.

use thiserror::Error;

/// Errors returned by every `OllamaClient` operation and by `EventStream`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required parameter was missing or blank. Raised before any I/O.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request could not be completed: connect failure, timeout, or the
    /// connection dropped while a body was being read.
    #[error("transport failed: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Server { status: u16, body: String },

    /// A response body, or one NDJSON line of it, was not valid JSON.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Discriminant of an [`ApiError`], for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Server,
    Decode,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Transport(_) => ErrorKind::Transport,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Decode(_) => ErrorKind::Decode,
        }
    }

    /// HTTP status code, present only when the server rejected the call.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable description, including the server body for `Server`.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Shorthand for the "required field is blank" validation failure.
    pub(crate) fn missing(field: &str) -> Self {
        ApiError::Validation(format!("`{field}` is required"))
    }
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(t) => ApiError::Transport(format!("timed out ({t:?})")),
            other => ApiError::Transport(other.to_string()),
        }
    }
}
