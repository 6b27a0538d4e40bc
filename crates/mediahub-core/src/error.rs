//! Error types module
//!
//! All failures that cross crate boundaries are unified under [`AppError`]. Each
//! variant belongs to one [`ErrorKind`] of the media library taxonomy (source,
//! validation, storage, not-found, corrupt media), which callers use to decide
//! whether to surface, collect or retry.
//!
//! The `Database` variant wraps `sqlx::Error` when the `sqlx` feature is enabled and
//! falls back to a plain message otherwise.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues and bad input
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Coarse classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unreadable or unknown input, remote fetch failure
    Source,
    /// File too large, mime type not allowed
    Validation,
    /// Backend unreachable, disk not configured
    Storage,
    /// Referenced asset or original file missing
    NotFound,
    /// Image decode failure during derivation
    CorruptMedia,
    /// Database and other unexpected failures
    Internal,
}

/// Metadata describing how an error should be reported.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "FILE_TOO_LARGE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (the operation can be retried as-is)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the caller
    fn suggested_action(&self) -> Option<&'static str>;

    /// Caller-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Ingestion-time validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("File '{file_name}' size of {size} bytes exceeds the maximum allowed of {max} bytes")]
    FileTooLarge {
        file_name: String,
        size: u64,
        max: u64,
    },

    #[error("Mime type '{mime_type}' is not allowed for file '{file_name}'")]
    MimeTypeNotAllowed {
        file_name: String,
        mime_type: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Source error: {0}")]
    Source(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Disk [{0}] is not configured")]
    DiskNotConfigured(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File does not exist: {0}")]
    FileDoesNotExist(String),

    #[error("Corrupt media: {0}")]
    CorruptMedia(String),

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::Source(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (kind, error_code, recoverable, suggested_action, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    ErrorKind,
    &'static str,
    bool,
    Option<&'static str>,
    LogLevel,
) {
    match err {
        AppError::Source(_) => (
            ErrorKind::Source,
            "SOURCE_ERROR",
            false,
            Some("Check that the file, disk key, URL or payload is readable"),
            LogLevel::Warn,
        ),
        AppError::Validation(ValidationError::FileTooLarge { .. }) => (
            ErrorKind::Validation,
            "FILE_TOO_LARGE",
            false,
            Some("Reduce file size below the configured maximum"),
            LogLevel::Debug,
        ),
        AppError::Validation(ValidationError::MimeTypeNotAllowed { .. }) => (
            ErrorKind::Validation,
            "MIME_TYPE_NOT_ALLOWED",
            false,
            Some("Upload a file of an allowed type"),
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            ErrorKind::Storage,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        AppError::DiskNotConfigured(_) => (
            ErrorKind::Storage,
            "DISK_NOT_CONFIGURED",
            false,
            Some("Add the disk to MEDIAHUB_DISKS"),
            LogLevel::Error,
        ),
        AppError::NotFound(_) => (
            ErrorKind::NotFound,
            "NOT_FOUND",
            false,
            Some("Verify the asset ID exists"),
            LogLevel::Debug,
        ),
        AppError::FileDoesNotExist(_) => (
            ErrorKind::NotFound,
            "FILE_DOES_NOT_EXIST",
            false,
            Some("Re-upload the original file"),
            LogLevel::Warn,
        ),
        AppError::CorruptMedia(_) => (
            ErrorKind::CorruptMedia,
            "CORRUPT_MEDIA",
            false,
            Some("Check image format and try a different file"),
            LogLevel::Warn,
        ),
        AppError::Database(_) => (
            ErrorKind::Internal,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            ErrorKind::Internal,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorKind {
        app_error_static_metadata(self).0
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();
        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }
        details
    }
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Source(ref msg) => msg.clone(),
            AppError::Validation(ref err) => err.to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::DiskNotConfigured(ref disk) => format!("Disk [{}] is not configured", disk),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::FileDoesNotExist(ref msg) => msg.clone(),
            AppError::CorruptMedia(_) => "Failed to decode media".to_string(),
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal error".to_string()
            }
        }
    }
}
