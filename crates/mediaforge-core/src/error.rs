//! Error taxonomy for the media pipeline.
//!
//! Every transform/store operation returns a tagged `MediaResult` instead of
//! panicking; retry and abort decisions are driven by `is_retryable` and
//! `is_operational` rather than by matching on message strings.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx`
//! feature, so processing-only consumers can build without a database driver.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    /// Source bytes are not a valid or supported image. Never retried; the
    /// asset is skipped and the batch continues.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A required external binary (ffmpeg/ffprobe) is missing. Fails the whole
    /// operation before any unit work begins.
    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    /// Video transcode exceeded its wall-clock budget. Partial output is
    /// discarded; retried up to the bounded retry count.
    #[error("Transcode timed out after {seconds}s")]
    TranscodeTimeout { seconds: u64 },

    /// Referenced object absent from storage. Retrying will not make the
    /// object appear.
    #[error("Object not found in storage: {0}")]
    StorageNotFound(String),

    /// Owner missing, or the owner's field no longer references this file.
    /// Surfaced for operator review; never auto-heals by deleting the record.
    #[error("Referential drift: {0}")]
    ReferentialDrift(String),

    /// A named-size operation was requested against a config that does not
    /// reflect the requested state. The operator must edit config first.
    #[error("Config inconsistency: {0}")]
    ConfigInconsistency(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Whether a work unit failing with this error should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            MediaError::TranscodeTimeout { .. }
            | MediaError::Storage(_)
            | MediaError::Database(_)
            | MediaError::Internal(_) => true,
            MediaError::Decode(_)
            | MediaError::ToolUnavailable(_)
            | MediaError::StorageNotFound(_)
            | MediaError::ReferentialDrift(_)
            | MediaError::ConfigInconsistency(_)
            | MediaError::InvalidInput(_) => false,
        }
    }

    /// Operational/precondition errors abort the whole bulk operation before
    /// any unit work begins, instead of being counted per asset.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            MediaError::ToolUnavailable(_)
                | MediaError::ConfigInconsistency(_)
                | MediaError::InvalidInput(_)
        )
    }

    /// Machine-readable code for summaries and progress payloads.
    pub fn code(&self) -> &'static str {
        match self {
            MediaError::Decode(_) => "DECODE_ERROR",
            MediaError::ToolUnavailable(_) => "TOOL_UNAVAILABLE",
            MediaError::TranscodeTimeout { .. } => "TRANSCODE_TIMEOUT",
            MediaError::StorageNotFound(_) => "STORAGE_NOT_FOUND",
            MediaError::ReferentialDrift(_) => "REFERENTIAL_DRIFT",
            MediaError::ConfigInconsistency(_) => "CONFIG_INCONSISTENCY",
            MediaError::Storage(_) => "STORAGE_ERROR",
            MediaError::Database(_) => "DATABASE_ERROR",
            MediaError::InvalidInput(_) => "INVALID_INPUT",
            MediaError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for MediaError {
    fn from(err: SqlxError) -> Self {
        MediaError::Database(err)
    }
}

impl From<io::Error> for MediaError {
    fn from(err: io::Error) -> Self {
        MediaError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for MediaError {
    fn from(err: serde_json::Error) -> Self {
        MediaError::InvalidInput(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_not_retryable() {
        let err = MediaError::Decode("bad magic bytes".into());
        assert!(!err.is_retryable());
        assert!(!err.is_operational());
        assert_eq!(err.code(), "DECODE_ERROR");
    }

    #[test]
    fn tool_unavailable_is_operational() {
        let err = MediaError::ToolUnavailable("ffmpeg not found".into());
        assert!(err.is_operational());
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_is_retryable_but_not_operational() {
        let err = MediaError::TranscodeTimeout { seconds: 3600 };
        assert!(err.is_retryable());
        assert!(!err.is_operational());
        assert_eq!(err.to_string(), "Transcode timed out after 3600s");
    }

    #[test]
    fn storage_not_found_is_terminal() {
        let err = MediaError::StorageNotFound("products/42/card/a.webp".into());
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "STORAGE_NOT_FOUND");
    }

    #[test]
    fn config_inconsistency_aborts_run() {
        let err = MediaError::ConfigInconsistency("size 'uhd' not configured".into());
        assert!(err.is_operational());
    }
}
