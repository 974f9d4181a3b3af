//! The job queue boundary.

use std::time::Duration;

use async_trait::async_trait;

use super::error::QueueError;
use super::types::{Delivery, EnqueueOptions, JobHandle, NackOutcome, QueueStats, UniquifyJob};

/// At-least-once job transport.
///
/// A delivered job stays in flight until it is acked or nacked. The
/// transport honours each job's attempt budget and backoff policy.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: UniquifyJob, options: EnqueueOptions) -> Result<JobHandle, QueueError>;

    /// Waits up to `timeout` for a deliverable job.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Marks a delivered job as done.
    async fn ack(&self, handle: &JobHandle) -> Result<(), QueueError>;

    /// Marks a delivered job as failed, scheduling a retry when `retry` is
    /// set and attempts remain.
    async fn nack(&self, handle: &JobHandle, retry: bool) -> Result<NackOutcome, QueueError>;

    /// Removes a job that has not been delivered yet.
    ///
    /// Returns `false` if the job is already in flight.
    async fn cancel(&self, handle: &JobHandle) -> Result<bool, QueueError>;

    async fn stats(&self) -> QueueStats;
}
