//! Error types for the transfer engine.

use std::fmt;
use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// Broad classification of a transfer failure.
///
/// HTTP status codes map onto kinds at error construction time via
/// [`ErrorKind::from_status`]; everything else falls out of the error
/// variant itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The remote resource does not exist (HTTP 404).
    NotFound,
    /// The remote resource already exists (HTTP 409).
    AlreadyExists,
    /// Access to the remote resource is forbidden (HTTP 403).
    Forbidden,
    /// The request lacked valid credentials (HTTP 401).
    NotAuthorized,
    /// The request or local options were invalid (HTTP 400).
    InvalidOptions,
    /// The payload exceeded a remote limit (HTTP 413).
    TooLarge,
    /// The remote is throttling requests (HTTP 429).
    TooManyRequests,
    /// The remote does not implement the operation (HTTP 501).
    NotSupported,
    /// Anything that does not fit another kind.
    Unknown,
    /// A local filesystem failure.
    Io,
    /// A response failed validation, e.g. a missing Content-Length header.
    Validation,
}

impl ErrorKind {
    /// Map an HTTP status code to an error kind.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            400 => Self::InvalidOptions,
            401 => Self::NotAuthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::AlreadyExists,
            413 => Self::TooLarge,
            429 => Self::TooManyRequests,
            501 => Self::NotSupported,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::Forbidden => "forbidden",
            Self::NotAuthorized => "not authorized",
            Self::InvalidOptions => "invalid options",
            Self::TooLarge => "too large",
            Self::TooManyRequests => "too many requests",
            Self::NotSupported => "not supported",
            Self::Unknown => "unknown",
            Self::Io => "io",
            Self::Validation => "validation",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while transferring files.
#[derive(Debug, Error)]
pub enum TransferError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote replied with a non-success status code.
    #[error("Request failed with status code {status}")]
    Status {
        /// HTTP status code of the response.
        status: u16,
        /// Kind derived from the status code.
        kind: ErrorKind,
    },

    /// A download response failed validation.
    #[error("{message}")]
    Download {
        /// Human-readable description of the validation failure.
        message: String,
        /// Whether the failure is worth retrying.
        transient: bool,
    },

    /// I/O error against the local filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing required field in a builder.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// Invalid option or parameter value.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Invalid URL construction.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The upload protocol returned an unusable response.
    #[error("upload protocol error: {0}")]
    Protocol(String),
}

/// A specialized `Result` type for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;

/// A transfer error shared between pipeline stages and event payloads.
pub type SharedError = Arc<TransferError>;

impl TransferError {
    /// Build an error from a non-success HTTP status.
    pub fn from_status(status: StatusCode) -> Self {
        Self::Status {
            status: status.as_u16(),
            kind: ErrorKind::from_status(status),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_) => ErrorKind::Unknown,
            Self::Status { kind, .. } => *kind,
            Self::Download { .. } => ErrorKind::Validation,
            Self::Io(_) => ErrorKind::Io,
            Self::MissingField(_) | Self::InvalidOptions(_) | Self::InvalidUrl(_) => {
                ErrorKind::InvalidOptions
            }
            Self::Protocol(_) => ErrorKind::Unknown,
        }
    }

    /// Whether the retry loop should attempt this failure again.
    ///
    /// Network-level errors, HTTP 5xx, HTTP 429, and truncated download
    /// bodies are transient; other HTTP statuses and validation failures
    /// are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Download { transient, .. } => *transient,
            _ => false,
        }
    }
}
