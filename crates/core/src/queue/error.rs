//! Error types for the job queue.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// The handle does not refer to a job the queue knows about.
    #[error("Job not found: {id}")]
    NotFound { id: String },

    /// The job exists but is not currently delivered to a worker.
    #[error("Job not in flight: {id}")]
    NotInFlight { id: String },

    #[error("Invalid enqueue options: {reason}")]
    InvalidOptions { reason: String },

    #[error("Queue transport error: {0}")]
    Transport(String),
}
