//! Queue payloads and delivery types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::preset::ModificationSettings;
use crate::transform::TargetPlatform;

/// Work for one execution attempt of a processed video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniquifyJob {
    pub processed_video_id: String,
    pub source_video_id: String,
    pub source_location: String,
    pub settings: ModificationSettings,
    pub target_platform: TargetPlatform,
    /// Revision of the processed video this job was enqueued for.
    pub revision: u32,
}

/// Retry delay policy between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backoff {
    Fixed { delay_ms: u64 },
    Exponential { delay_ms: u64, max_delay_ms: u64 },
}

impl Backoff {
    /// Delay before the attempt that follows `failed_attempts` failures.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential {
                delay_ms,
                max_delay_ms,
            } => {
                let exp = failed_attempts.saturating_sub(1).min(32);
                let delay = delay_ms.saturating_mul(1u64 << exp);
                Duration::from_millis(delay.min(max_delay_ms))
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            delay_ms: 5_000,
            max_delay_ms: 300_000,
        }
    }
}

/// Per-job delivery policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnqueueOptions {
    /// Total delivery attempts, including the first.
    pub attempts: u32,
    pub backoff: Backoff,
    /// Higher values are delivered first; ties are FIFO.
    pub priority: i32,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Backoff::default(),
            priority: 0,
        }
    }
}

impl EnqueueOptions {
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Opaque identity of an enqueued job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(pub String);

impl JobHandle {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A job handed to a worker.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub handle: JobHandle,
    pub job: UniquifyJob,
    /// 1-based attempt number of this delivery.
    pub attempt: u32,
    pub max_attempts: u32,
}

impl Delivery {
    pub fn is_last_attempt(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// What happened to a negatively acknowledged job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackOutcome {
    /// Scheduled for another attempt after `delay`.
    Retrying { next_attempt: u32, delay: Duration },
    /// No attempts left (or retry was not requested); the job is gone.
    Exhausted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Ready to be delivered.
    pub waiting: usize,
    /// Waiting for a backoff delay to pass.
    pub delayed: usize,
    pub in_flight: usize,
}
