use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Submission
    /// A batch of processed videos was created and enqueued.
    BatchSubmitted {
        campaign_id: String,
        user_id: String,
        /// Preset used for the draws
        preset: String,
        target_platform: String,
        source_count: u32,
        versions_per_video: u32,
        /// Processed videos created (sources x versions)
        videos_created: u32,
    },

    // Processing lifecycle
    ProcessingStarted {
        processed_video_id: String,
        campaign_id: String,
        target_platform: String,
        /// 1-based delivery attempt
        attempt: u32,
        max_attempts: u32,
        revision: u32,
    },
    ProcessingCompleted {
        processed_video_id: String,
        campaign_id: String,
        target_platform: String,
        attempt: u32,
        output_location: String,
        output_size_bytes: u64,
        /// Defect types raised by verification
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        quality_flags: Vec<String>,
        duration_ms: u64,
    },
    ProcessingFailed {
        processed_video_id: String,
        campaign_id: String,
        target_platform: String,
        attempt: u32,
        error: String,
        /// No automatic attempt remains
        terminal: bool,
    },
    /// A delivery for an outdated revision was dropped.
    StaleJobSkipped {
        processed_video_id: String,
        job_revision: u32,
        current_revision: u32,
    },

    // Remediation
    QuickFixApplied {
        processed_video_id: String,
        campaign_id: String,
        defect: String,
        revision: u32,
    },
    ReprocessRequested {
        processed_video_id: String,
        campaign_id: String,
        /// Preset drawn from, absent when explicit settings were supplied
        preset: Option<String>,
        revision: u32,
    },
    /// A queued job was withdrawn before a worker picked it up.
    JobCancelled {
        processed_video_id: String,
        campaign_id: String,
        job_id: String,
    },
}

impl AuditEvent {
    /// Returns the event type as a string for storage
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::BatchSubmitted { .. } => "batch_submitted",
            Self::ProcessingStarted { .. } => "processing_started",
            Self::ProcessingCompleted { .. } => "processing_completed",
            Self::ProcessingFailed { .. } => "processing_failed",
            Self::StaleJobSkipped { .. } => "stale_job_skipped",
            Self::QuickFixApplied { .. } => "quick_fix_applied",
            Self::ReprocessRequested { .. } => "reprocess_requested",
            Self::JobCancelled { .. } => "job_cancelled",
        }
    }

    /// Extract the processed video id if this event concerns one unit
    pub fn processed_video_id(&self) -> Option<&str> {
        match self {
            Self::ProcessingStarted {
                processed_video_id, ..
            }
            | Self::ProcessingCompleted {
                processed_video_id, ..
            }
            | Self::ProcessingFailed {
                processed_video_id, ..
            }
            | Self::StaleJobSkipped {
                processed_video_id, ..
            }
            | Self::QuickFixApplied {
                processed_video_id, ..
            }
            | Self::ReprocessRequested {
                processed_video_id, ..
            }
            | Self::JobCancelled {
                processed_video_id, ..
            } => Some(processed_video_id),
            _ => None,
        }
    }

    /// Extract the campaign id if the event carries one
    pub fn campaign_id(&self) -> Option<&str> {
        match self {
            Self::BatchSubmitted { campaign_id, .. }
            | Self::ProcessingStarted { campaign_id, .. }
            | Self::ProcessingCompleted { campaign_id, .. }
            | Self::ProcessingFailed { campaign_id, .. }
            | Self::QuickFixApplied { campaign_id, .. }
            | Self::ReprocessRequested { campaign_id, .. }
            | Self::JobCancelled { campaign_id, .. } => Some(campaign_id),
            _ => None,
        }
    }
}

/// A stored audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub processed_video_id: Option<String>,
    pub campaign_id: Option<String>,
    pub data: AuditEvent,
}
