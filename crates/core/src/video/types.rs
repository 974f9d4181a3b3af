//! Processed video records and their lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::preset::ModificationSettings;
use crate::quality::QualityFlag;
use crate::transform::TargetPlatform;

/// Lifecycle status of a processed video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Reprocessing,
}

impl ProcessingStatus {
    pub const ALL: [ProcessingStatus; 5] = [
        ProcessingStatus::Pending,
        ProcessingStatus::Processing,
        ProcessingStatus::Completed,
        ProcessingStatus::Failed,
        ProcessingStatus::Reprocessing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Reprocessing => "reprocessing",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `processing -> processing` covers redelivery after a lost worker and
    /// `reprocessing -> reprocessing` a second remediation before pickup.
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        matches!(
            (self, next),
            (Pending | Processing | Failed | Reprocessing, Processing)
                | (Processing, Completed | Failed)
                | (Completed | Failed | Reprocessing, Reprocessing)
        )
    }

    /// Whether a remediation (quick-fix / reprocess) may start from here.
    pub fn can_remediate(&self) -> bool {
        self.can_transition_to(ProcessingStatus::Reprocessing)
    }

    /// Whether a queued job may still be withdrawn. A failed unit can be
    /// waiting for a retry.
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::Pending | ProcessingStatus::Reprocessing | ProcessingStatus::Failed
        )
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown processing status: {}", s))
    }
}

/// One requested output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedVideo {
    pub id: String,
    pub campaign_id: String,
    pub user_id: String,
    pub source_video_id: String,
    pub source_location: String,
    pub source_duration_secs: Option<f64>,
    /// 1-based, unique per source within a campaign.
    pub version_number: u32,
    /// Preset the current settings were drawn from, if any.
    pub preset: Option<String>,
    pub settings: ModificationSettings,
    pub target_platform: TargetPlatform,
    pub status: ProcessingStatus,
    pub output_location: Option<String>,
    pub output_size_bytes: Option<u64>,
    pub quality_verified: bool,
    pub quality_flags: Vec<QualityFlag>,
    pub error_message: Option<String>,
    /// Failed attempts since the last remediation.
    pub retry_count: u32,
    /// Failed with no automatic attempt left.
    pub terminal: bool,
    /// Bumped by every remediation; stale jobs carry an older value.
    pub revision: u32,
    /// Queue handle of the most recently enqueued job.
    pub job_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessedVideo {
    pub fn is_flagged(&self) -> bool {
        self.status == ProcessingStatus::Completed && !self.quality_flags.is_empty()
    }
}

/// Fields supplied when a processed video is created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProcessedVideo {
    pub campaign_id: String,
    pub user_id: String,
    pub source_video_id: String,
    pub source_location: String,
    pub source_duration_secs: Option<f64>,
    pub version_number: u32,
    pub preset: Option<String>,
    pub settings: ModificationSettings,
    pub target_platform: TargetPlatform,
}

/// A state change applied through the store.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoUpdate {
    /// A worker picked the job up.
    Processing,
    /// Output published and verified.
    Completed {
        output_location: String,
        output_size_bytes: u64,
        quality_flags: Vec<QualityFlag>,
    },
    /// An attempt failed. `terminal` is set when no attempt remains.
    Failed { message: String, terminal: bool },
    /// Settings replaced by a remediation.
    Reprocessing {
        settings: ModificationSettings,
        preset: Option<String>,
    },
    /// The queued job was withdrawn before a worker started it.
    Cancelled,
}

impl VideoUpdate {
    pub fn target_status(&self) -> ProcessingStatus {
        match self {
            VideoUpdate::Processing => ProcessingStatus::Processing,
            VideoUpdate::Completed { .. } => ProcessingStatus::Completed,
            VideoUpdate::Failed { .. } => ProcessingStatus::Failed,
            VideoUpdate::Reprocessing { .. } => ProcessingStatus::Reprocessing,
            VideoUpdate::Cancelled => ProcessingStatus::Failed,
        }
    }

    /// Whether this update may be applied to a record in `current`.
    pub fn is_allowed_from(&self, current: ProcessingStatus) -> bool {
        match self {
            VideoUpdate::Cancelled => current.can_cancel(),
            other => current.can_transition_to(other.target_status()),
        }
    }

    /// Applies the update to an in-memory record.
    pub fn apply(self, video: &mut ProcessedVideo, now: DateTime<Utc>) {
        video.status = self.target_status();
        video.updated_at = now;
        match self {
            VideoUpdate::Processing => {
                video.error_message = None;
                video.terminal = false;
            }
            VideoUpdate::Completed {
                output_location,
                output_size_bytes,
                quality_flags,
            } => {
                video.output_location = Some(output_location);
                video.output_size_bytes = Some(output_size_bytes);
                video.quality_verified = quality_flags.is_empty();
                video.quality_flags = quality_flags;
                video.error_message = None;
                video.terminal = false;
            }
            VideoUpdate::Failed { message, terminal } => {
                video.error_message = Some(message);
                video.retry_count += 1;
                video.terminal = terminal;
            }
            VideoUpdate::Reprocessing { settings, preset } => {
                video.settings = settings;
                video.preset = preset;
                video.revision += 1;
                video.retry_count = 0;
                video.terminal = false;
                video.error_message = None;
                video.quality_verified = false;
                video.quality_flags.clear();
            }
            VideoUpdate::Cancelled => {
                video.error_message = Some("cancelled before processing".to_string());
                video.terminal = true;
            }
        }
    }
}

/// Per-status totals for a campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    pub reprocessing: u64,
}

impl StatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed + self.reprocessing
    }

    pub fn add(&mut self, status: ProcessingStatus, n: u64) {
        match status {
            ProcessingStatus::Pending => self.pending += n,
            ProcessingStatus::Processing => self.processing += n,
            ProcessingStatus::Completed => self.completed += n,
            ProcessingStatus::Failed => self.failed += n,
            ProcessingStatus::Reprocessing => self.reprocessing += n,
        }
    }
}
