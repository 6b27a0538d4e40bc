//! Caller-facing error reports
//!
//! [`ErrorResponse`] is the serializable view of an [`AppError`]: the message a caller
//! may see plus the taxonomy code, never the internal details.

use mediahub_core::{AppError, ErrorKind, ErrorMetadata};
use serde::Serialize;

/// Standard error report format for command output
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<&'static str>,
    pub recoverable: bool,
}

fn kind_name(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Source => "source",
        ErrorKind::Validation => "validation",
        ErrorKind::Storage => "storage",
        ErrorKind::NotFound => "not_found",
        ErrorKind::CorruptMedia => "corrupt_media",
        ErrorKind::Internal => "internal",
    }
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        Self {
            error: err.client_message(),
            code: err.error_code(),
            kind: kind_name(err.kind()),
            suggested_action: err.suggested_action(),
            recoverable: err.is_recoverable(),
        }
    }
}
