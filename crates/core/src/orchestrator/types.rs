//! Types for the uniquify orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::{ExecutorError, ExecutorErrorKind};
use crate::preset::{ModificationSettings, PresetError, StorageEstimate, TimeEstimate};
use crate::quality::DefectType;
use crate::queue::QueueError;
use crate::transform::{TargetPlatform, TransformError};
use crate::video::{ProcessedVideo, ProcessingStatus, StatusCounts, StoreError};

/// Most versions a single submission may request per source.
pub const MAX_VERSIONS_PER_VIDEO: u32 = 10;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid preset: {name}")]
    InvalidPreset { name: String },

    #[error("unknown defect type: {name}")]
    UnknownDefect { name: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] TransformError),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("encode failed: {0}")]
    EncodeFailed(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("processed video not found: {0}")]
    NotFound(String),

    #[error("invalid state for {id}: {status}")]
    InvalidState { id: String, status: ProcessingStatus },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

impl OrchestratorError {
    /// Whether another attempt could succeed without changing the job.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable(_)
                | Self::EncodeFailed(_)
                | Self::StorageUnavailable(_)
                | Self::Persistence(_)
        )
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidPreset { .. } => "invalid_preset",
            Self::UnknownDefect { .. } => "unknown_defect",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::SourceUnavailable(_) => "source_unavailable",
            Self::EncodeFailed(_) => "encode_failed",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::Persistence(_) => "persistence",
            Self::NotFound(_) => "not_found",
            Self::InvalidState { .. } => "invalid_state",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Queue(_) => "queue",
        }
    }
}

impl From<PresetError> for OrchestratorError {
    fn from(e: PresetError) -> Self {
        match e {
            PresetError::InvalidPreset { name } => Self::InvalidPreset { name },
            PresetError::UnknownDefect { name } => Self::UnknownDefect { name },
            PresetError::InvalidCatalog { reason } => Self::InvalidRequest(reason),
        }
    }
}

impl From<ExecutorError> for OrchestratorError {
    fn from(e: ExecutorError) -> Self {
        let message = e.to_string();
        match e.kind() {
            ExecutorErrorKind::SourceUnavailable => Self::SourceUnavailable(message),
            ExecutorErrorKind::EncodeFailed => Self::EncodeFailed(message),
            ExecutorErrorKind::StorageUnavailable => Self::StorageUnavailable(message),
        }
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::InvalidTransition { id, from, .. } => Self::InvalidState { id, status: from },
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// A source video referenced by a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceVideo {
    pub id: String,
    /// URL, absolute path or storage key the source store can fetch.
    pub location: String,
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

/// Request for `versions_per_video` outputs of every source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub user_id: String,
    pub campaign_id: String,
    pub sources: Vec<SourceVideo>,
    /// Preset name; the default preset when absent.
    #[serde(default)]
    pub preset: Option<String>,
    pub versions_per_video: u32,
    /// Falls back to the worker's default platform.
    #[serde(default)]
    pub target_platform: Option<TargetPlatform>,
}

/// What a submission created.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    pub campaign_id: String,
    pub preset: String,
    pub target_platform: TargetPlatform,
    pub videos: Vec<ProcessedVideo>,
    pub estimated_storage: StorageEstimate,
    pub estimated_time: TimeEstimate,
}

/// Options for a full reprocess.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReprocessOptions {
    /// Preset for a fresh draw. Ignored when `settings` is given.
    #[serde(default)]
    pub preset: Option<String>,
    /// Explicit settings to apply instead of a random draw.
    #[serde(default)]
    pub settings: Option<ModificationSettings>,
}

impl ReprocessOptions {
    pub fn with_preset(preset: impl Into<String>) -> Self {
        Self {
            preset: Some(preset.into()),
            settings: None,
        }
    }

    pub fn with_settings(settings: ModificationSettings) -> Self {
        Self {
            preset: None,
            settings: Some(settings),
        }
    }
}

/// The unit a worker is currently encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentVideo {
    pub id: String,
    pub source_video_id: String,
    pub version_number: u32,
}

/// A failed unit with its last error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedVideo {
    pub id: String,
    pub source_video_id: String,
    pub version_number: u32,
    pub error_message: Option<String>,
    /// No automatic retry remains.
    pub terminal: bool,
}

/// Aggregate progress of a campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStatus {
    pub campaign_id: String,
    pub counts: StatusCounts,
    pub total: u64,
    /// `round(completed / total * 100)`, 0 for an empty campaign.
    pub percent_complete: u8,
    pub current: Option<CurrentVideo>,
    pub failures: Vec<FailedVideo>,
}

impl BatchStatus {
    pub fn percent(completed: u64, total: u64) -> u8 {
        if total == 0 {
            return 0;
        }
        ((completed as f64 / total as f64) * 100.0).round() as u8
    }
}

/// One remediation available for a flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Remedy {
    pub defect: DefectType,
    pub recommendation: String,
    /// Settings a quick fix for this defect would apply.
    pub adjusted_settings: ModificationSettings,
}

/// A completed unit with quality flags and its remedies.
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedVideo {
    pub video: ProcessedVideo,
    pub remedies: Vec<Remedy>,
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OrchestratorStatus {
    pub running: bool,
    pub workers: usize,
    /// Jobs being processed right now.
    pub active_jobs: usize,
    pub queued_jobs: usize,
    pub delayed_jobs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_complete() {
        assert_eq!(BatchStatus::percent(0, 0), 0);
        assert_eq!(BatchStatus::percent(1, 3), 33);
        assert_eq!(BatchStatus::percent(2, 3), 67);
        assert_eq!(BatchStatus::percent(5, 5), 100);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(OrchestratorError::SourceUnavailable("404".into()).is_retryable());
        assert!(OrchestratorError::EncodeFailed("exit 1".into()).is_retryable());
        assert!(OrchestratorError::StorageUnavailable("disk".into()).is_retryable());
        assert!(!OrchestratorError::InvalidPreset {
            name: "ultra".into()
        }
        .is_retryable());
        assert!(!OrchestratorError::from(TransformError::invalid_parameter(
            "speed",
            0.0,
            "must be within [0.5, 2]"
        ))
        .is_retryable());
    }

    #[test]
    fn test_from_store_error() {
        let err = OrchestratorError::from(StoreError::InvalidTransition {
            id: "pv-1".into(),
            from: ProcessingStatus::Pending,
            to: ProcessingStatus::Reprocessing,
        });
        assert!(matches!(
            err,
            OrchestratorError::InvalidState {
                status: ProcessingStatus::Pending,
                ..
            }
        ));
        assert!(matches!(
            OrchestratorError::from(StoreError::NotFound("x".into())),
            OrchestratorError::NotFound(_)
        ));
        assert!(matches!(
            OrchestratorError::from(StoreError::Database("locked".into())),
            OrchestratorError::Persistence(_)
        ));
    }

    #[test]
    fn test_from_executor_error() {
        let err = OrchestratorError::from(ExecutorError::source_unavailable("s3://x", "404"));
        assert!(matches!(err, OrchestratorError::SourceUnavailable(_)));
        assert_eq!(err.label(), "source_unavailable");
    }
}
