//! Job queue boundary and the in-process implementation.

mod error;
mod memory;
mod traits;
mod types;

pub use error::QueueError;
pub use memory::MemoryJobQueue;
pub use traits::JobQueue;
pub use types::{
    Backoff, Delivery, EnqueueOptions, JobHandle, NackOutcome, QueueStats, UniquifyJob,
};
