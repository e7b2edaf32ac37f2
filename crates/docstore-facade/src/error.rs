//! Error types for `docstore-facade`.
//!
//! Every failure raised by the remote store is surfaced as one [`Error`]
//! variant carrying the server's own error list. The facade never translates
//! or recovers from errors; [`Error::kind`] groups variants into the coarse
//! taxonomy callers usually branch on.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for facade and client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// One entry of the `errors` array returned by the query endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryError {
    /// Machine-readable code, e.g. `instance not found`.
    pub code: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Path inside the submitted expression where the error occurred.
    #[serde(default)]
    pub position: Vec<serde_json::Value>,
}

/// Error payload of a non-success response.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerErrors {
    /// HTTP status code of the response.
    pub status: u16,
    /// Errors reported by the server, in order.
    pub errors: Vec<QueryError>,
}

#[derive(Deserialize)]
struct ErrorBody {
    errors: Vec<QueryError>,
}

impl ServerErrors {
    /// Creates a payload holding a single error.
    pub fn single(status: u16, code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            status,
            errors: vec![QueryError {
                code: code.into(),
                description: description.into(),
                position: Vec::new(),
            }],
        }
    }

    /// Parses an error response body.
    ///
    /// Bodies that are not the expected `{"errors": [...]}` shape are kept
    /// verbatim as the description of a single `unknown` error.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) if !parsed.errors.is_empty() => Self {
                status,
                errors: parsed.errors,
            },
            _ => Self::single(status, "unknown", body.trim()),
        }
    }

    /// Code of the first reported error.
    #[must_use]
    pub fn code(&self) -> &str {
        self.errors.first().map_or("unknown", |e| e.code.as_str())
    }

    /// Description of the first reported error.
    #[must_use]
    pub fn description(&self) -> &str {
        self.errors.first().map_or("", |e| e.description.as_str())
    }
}

impl fmt::Display for ServerErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())?;
        if self.errors.len() > 1 {
            write!(f, " and {} more", self.errors.len() - 1)?;
        }
        Ok(())
    }
}

/// Coarse classification of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid, expired or insufficiently privileged credential.
    Authentication,
    /// Referenced document, collection or index entry does not exist.
    NotFound,
    /// Malformed query arguments rejected by the server.
    Validation,
    /// Connectivity, timeout, contention or throttling.
    TransientNetwork,
    /// Server-side failure or a response that could not be decoded.
    Internal,
    /// Local configuration problem.
    Config,
}

/// Errors that can occur while talking to the document store.
///
/// Error codes follow the pattern `DOCSTORE-XXX`.
#[derive(Error, Debug)]
pub enum Error {
    /// The secret is empty or not usable as a bearer token (DOCSTORE-001).
    #[error("[DOCSTORE-001] Invalid secret: {0}")]
    InvalidSecret(String),

    /// Configuration error (DOCSTORE-002).
    #[error("[DOCSTORE-002] Configuration error: {0}")]
    Config(String),

    /// Request rejected as malformed, HTTP 400 (DOCSTORE-003).
    #[error("[DOCSTORE-003] Bad request: {0}")]
    BadRequest(ServerErrors),

    /// Credential rejected, HTTP 401 (DOCSTORE-004).
    #[error("[DOCSTORE-004] Unauthorized: {0}")]
    Unauthorized(ServerErrors),

    /// Credential lacks privileges, HTTP 403 (DOCSTORE-005).
    #[error("[DOCSTORE-005] Permission denied: {0}")]
    PermissionDenied(ServerErrors),

    /// Document, collection or index entry not found, HTTP 404 (DOCSTORE-006).
    #[error("[DOCSTORE-006] Not found: {0}")]
    NotFound(ServerErrors),

    /// Transaction contention, HTTP 409 (DOCSTORE-007).
    #[error("[DOCSTORE-007] Conflict: {0}")]
    Conflict(ServerErrors),

    /// Request throttled, HTTP 429 (DOCSTORE-008).
    #[error("[DOCSTORE-008] Too many requests: {0}")]
    TooManyRequests(ServerErrors),

    /// Server-side failure, HTTP 500 (DOCSTORE-009).
    #[error("[DOCSTORE-009] Internal server error: {0}")]
    Internal(ServerErrors),

    /// Service unavailable or gateway failure, HTTP 502/503/504 (DOCSTORE-010).
    #[error("[DOCSTORE-010] Service unavailable: {0}")]
    Unavailable(ServerErrors),

    /// Any other non-success status (DOCSTORE-011).
    #[error("[DOCSTORE-011] Unexpected status {status}: {0}", status = .0.status)]
    UnexpectedStatus(ServerErrors),

    /// Transport failure before a response was received (DOCSTORE-012).
    #[error("[DOCSTORE-012] Network error: {message}")]
    Network {
        /// Transport error message.
        message: String,
        /// Whether the request timed out.
        timeout: bool,
    },

    /// Response could not be decoded (DOCSTORE-013).
    #[error("[DOCSTORE-013] Decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Maps a non-success response to the matching variant.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let errors = ServerErrors::from_body(status, body);
        match status {
            400 => Self::BadRequest(errors),
            401 => Self::Unauthorized(errors),
            403 => Self::PermissionDenied(errors),
            404 => Self::NotFound(errors),
            409 => Self::Conflict(errors),
            429 => Self::TooManyRequests(errors),
            500 => Self::Internal(errors),
            502..=504 => Self::Unavailable(errors),
            _ => Self::UnexpectedStatus(errors),
        }
    }

    /// Returns the error code (e.g., "DOCSTORE-006").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSecret(_) => "DOCSTORE-001",
            Self::Config(_) => "DOCSTORE-002",
            Self::BadRequest(_) => "DOCSTORE-003",
            Self::Unauthorized(_) => "DOCSTORE-004",
            Self::PermissionDenied(_) => "DOCSTORE-005",
            Self::NotFound(_) => "DOCSTORE-006",
            Self::Conflict(_) => "DOCSTORE-007",
            Self::TooManyRequests(_) => "DOCSTORE-008",
            Self::Internal(_) => "DOCSTORE-009",
            Self::Unavailable(_) => "DOCSTORE-010",
            Self::UnexpectedStatus(_) => "DOCSTORE-011",
            Self::Network { .. } => "DOCSTORE-012",
            Self::Decode(_) => "DOCSTORE-013",
        }
    }

    /// Returns the taxonomy bucket of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSecret(_) | Self::Unauthorized(_) | Self::PermissionDenied(_) => {
                ErrorKind::Authentication
            }
            Self::Config(_) => ErrorKind::Config,
            Self::BadRequest(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_)
            | Self::TooManyRequests(_)
            | Self::Unavailable(_)
            | Self::Network { .. } => ErrorKind::TransientNetwork,
            Self::Internal(_) | Self::UnexpectedStatus(_) | Self::Decode(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if retrying the same request may succeed.
    ///
    /// The facade itself never retries.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::TransientNetwork)
    }

    /// Returns true for [`Error::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Server error payload, if this error came from a response.
    #[must_use]
    pub fn server_errors(&self) -> Option<&ServerErrors> {
        match self {
            Self::BadRequest(e)
            | Self::Unauthorized(e)
            | Self::PermissionDenied(e)
            | Self::NotFound(e)
            | Self::Conflict(e)
            | Self::TooManyRequests(e)
            | Self::Internal(e)
            | Self::Unavailable(e)
            | Self::UnexpectedStatus(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        Self::Network {
            timeout: err.is_timeout(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
