//! Error types for the executor module.

use std::path::PathBuf;
use thiserror::Error;

use crate::storage::StorageError;

/// Errors that can occur while staging, encoding, or publishing an output.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Source bytes could not be downloaded or read.
    #[error("Source unavailable ({location}): {reason}")]
    SourceUnavailable { location: String, reason: String },

    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// The filter/codec pipeline failed.
    #[error("Encode failed: {reason}")]
    EncodeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Encode did not finish in time and was killed.
    #[error("Encode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The staged file could not be probed.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// Staging directory I/O failed.
    #[error("Staging error: {0}")]
    Staging(#[from] std::io::Error),

    /// The artifact store rejected the upload.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StorageError),
}

/// Coarse classification used by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorErrorKind {
    SourceUnavailable,
    EncodeFailed,
    StorageUnavailable,
}

impl ExecutorErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceUnavailable => "source_unavailable",
            Self::EncodeFailed => "encode_failed",
            Self::StorageUnavailable => "storage_unavailable",
        }
    }
}

impl ExecutorError {
    pub fn source_unavailable(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    pub fn encode_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
            stderr,
        }
    }

    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ExecutorErrorKind {
        match self {
            Self::SourceUnavailable { .. } => ExecutorErrorKind::SourceUnavailable,
            Self::StorageUnavailable(_) => ExecutorErrorKind::StorageUnavailable,
            Self::FfmpegNotFound { .. }
            | Self::FfprobeNotFound { .. }
            | Self::EncodeFailed { .. }
            | Self::Timeout { .. }
            | Self::ProbeFailed { .. }
            | Self::Staging(_) => ExecutorErrorKind::EncodeFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ExecutorError::source_unavailable("https://x/y.mp4", "404").kind(),
            ExecutorErrorKind::SourceUnavailable
        );
        assert_eq!(
            ExecutorError::Timeout { timeout_secs: 10 }.kind(),
            ExecutorErrorKind::EncodeFailed
        );
        assert_eq!(
            ExecutorError::StorageUnavailable(StorageError::upload("disk full")).kind(),
            ExecutorErrorKind::StorageUnavailable
        );
    }

    #[test]
    fn test_display() {
        let err = ExecutorError::encode_failed("FFmpeg exited with code: Some(1)", None);
        assert_eq!(err.to_string(), "Encode failed: FFmpeg exited with code: Some(1)");
    }
}
