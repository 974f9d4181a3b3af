//! The processed video persistence boundary.

use thiserror::Error;

use super::types::{NewProcessedVideo, ProcessedVideo, ProcessingStatus, StatusCounts, VideoUpdate};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Processed video not found: {0}")]
    NotFound(String),

    /// The record's current status does not allow the requested change.
    #[error("Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: ProcessingStatus,
        to: ProcessingStatus,
    },

    /// The record was remediated since the caller read it.
    #[error("Revision mismatch for {id}: expected {expected}, found {current}")]
    RevisionMismatch {
        id: String,
        expected: u32,
        current: u32,
    },

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, ref msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StoreError::Conflict(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Filter for listing processed videos.
#[derive(Debug, Clone)]
pub struct VideoFilter {
    pub campaign_id: Option<String>,
    pub source_video_id: Option<String>,
    pub status: Option<ProcessingStatus>,
    pub flagged_only: bool,
    pub limit: u32,
    pub offset: u32,
}

impl Default for VideoFilter {
    fn default() -> Self {
        Self {
            campaign_id: None,
            source_video_id: None,
            status: None,
            flagged_only: false,
            limit: 1000,
            offset: 0,
        }
    }
}

impl VideoFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }

    pub fn with_source(mut self, source_video_id: impl Into<String>) -> Self {
        self.source_video_id = Some(source_video_id.into());
        self
    }

    pub fn with_status(mut self, status: ProcessingStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Completed records carrying at least one quality flag.
    pub fn flagged(mut self) -> Self {
        self.flagged_only = true;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }
}

/// Persistence for [`ProcessedVideo`] records.
///
/// Status changes go through [`ProcessedVideoStore::update`], which rejects
/// transitions the lifecycle does not allow.
pub trait ProcessedVideoStore: Send + Sync {
    fn create(&self, video: NewProcessedVideo) -> Result<ProcessedVideo, StoreError>;

    fn get(&self, id: &str) -> Result<Option<ProcessedVideo>, StoreError>;

    /// Lists records ordered by source, then version number.
    fn list(&self, filter: &VideoFilter) -> Result<Vec<ProcessedVideo>, StoreError>;

    fn count(&self, filter: &VideoFilter) -> Result<i64, StoreError>;

    fn status_counts(&self, campaign_id: &str) -> Result<StatusCounts, StoreError>;

    /// Applies a status change after validating the transition.
    fn update(&self, id: &str, update: VideoUpdate) -> Result<ProcessedVideo, StoreError>;

    /// Like [`ProcessedVideoStore::update`], but only while the record is
    /// still at `revision`. The revision check and the write are atomic.
    fn update_at_revision(
        &self,
        id: &str,
        revision: u32,
        update: VideoUpdate,
    ) -> Result<ProcessedVideo, StoreError>;

    /// Records the queue handle of the latest job for a record.
    fn set_job_id(&self, id: &str, job_id: &str) -> Result<(), StoreError>;
}
