//! Domain error types
//!
//! All errors surfaced by the library are domain-specific. Third-party error
//! types (driver, object store, Arrow, Parquet) are converted at the boundary
//! so callers never have to depend on them.

use thiserror::Error;

/// Main Stowage error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum StowageError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Source document store errors (connection, query)
    #[error("Source error: {0}")]
    Source(String),

    /// Blob store errors, carrying their failure classification
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Export process errors
    #[error("Export error: {0}")]
    Export(String),

    /// Record normalization or columnar encoding errors
    #[error("Normalization error: {0}")]
    Normalization(String),

    /// Checkpoint / manifest state errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Schema drift detection or rewrite errors
    #[error("Drift error: {0}")]
    Drift(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Failure classes reported by the blob store boundary
///
/// The retry policy is driven by this classification, never by the text of
/// an error message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    NotFound,
    PermissionDenied,
    Unauthenticated,
    AlreadyExists,
    InvalidRequest,
    /// HTTP 429
    RateLimited,
    /// HTTP 503
    ServiceUnavailable,
    /// HTTP 500
    Internal,
    /// HTTP 502
    BadGateway,
    /// HTTP 504
    GatewayTimeout,
    /// Server-side deadline exceeded
    DeadlineExceeded,
    /// Client-side request timeout (408 or socket timeout)
    RequestTimeout,
    Other,
}

impl StorageErrorKind {
    /// Whether this failure belongs to the transient allow-list
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageErrorKind::RateLimited
                | StorageErrorKind::ServiceUnavailable
                | StorageErrorKind::Internal
                | StorageErrorKind::BadGateway
                | StorageErrorKind::GatewayTimeout
                | StorageErrorKind::DeadlineExceeded
                | StorageErrorKind::RequestTimeout
        )
    }

    /// Maps an HTTP status code onto a failure class
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => StorageErrorKind::Unauthenticated,
            403 => StorageErrorKind::PermissionDenied,
            404 => StorageErrorKind::NotFound,
            408 => StorageErrorKind::RequestTimeout,
            409 | 412 => StorageErrorKind::AlreadyExists,
            429 => StorageErrorKind::RateLimited,
            500 => StorageErrorKind::Internal,
            502 => StorageErrorKind::BadGateway,
            503 => StorageErrorKind::ServiceUnavailable,
            504 => StorageErrorKind::GatewayTimeout,
            400..=499 => StorageErrorKind::InvalidRequest,
            _ => StorageErrorKind::Other,
        }
    }
}

/// Blob store error with its classification
#[derive(Debug, Clone, Error)]
#[error("{operation} {path}: {message} ({kind:?})")]
pub struct StorageError {
    /// Failure class
    pub kind: StorageErrorKind,

    /// Operation that failed (e.g. "upload", "read_text")
    pub operation: String,

    /// Object path the operation targeted
    pub path: String,

    /// Underlying error message
    pub message: String,
}

impl StorageError {
    /// Creates a new storage error
    pub fn new(
        kind: StorageErrorKind,
        operation: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            operation: operation.into(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether the retry driver may try again
    pub fn is_retryable(&self) -> bool {
        self.kind.is_transient()
    }

    /// Whether the object was missing
    pub fn is_not_found(&self) -> bool {
        self.kind == StorageErrorKind::NotFound
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for StowageError {
    fn from(err: std::io::Error) -> Self {
        StowageError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for StowageError {
    fn from(err: serde_json::Error) -> Self {
        StowageError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for StowageError {
    fn from(err: toml::de::Error) -> Self {
        StowageError::Configuration(format!("TOML parse error: {err}"))
    }
}

impl From<arrow::error::ArrowError> for StowageError {
    fn from(err: arrow::error::ArrowError) -> Self {
        StowageError::Normalization(format!("Arrow error: {err}"))
    }
}

impl From<parquet::errors::ParquetError> for StowageError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        StowageError::Normalization(format!("Parquet error: {err}"))
    }
}

impl From<mongodb::error::Error> for StowageError {
    fn from(err: mongodb::error::Error) -> Self {
        StowageError::Source(err.to_string())
    }
}
