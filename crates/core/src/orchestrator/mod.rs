//! Job orchestration for uniquify batches.
//!
//! The orchestrator owns the lifecycle of every processed video:
//! - **Submission**: one record and one queued job per requested version
//! - **Processing**: a bounded worker pool compiles, encodes, verifies and publishes
//! - **Remediation**: quick fixes and reprocessing bump the record's revision
//!   so that jobs for superseded settings are dropped on delivery

mod config;
mod runner;
mod types;

pub use config::{OrchestratorConfig, RetryConfig};
pub use runner::{UniquifyOrchestrator, UniquifyPipeline};
pub use types::{
    BatchStatus, CurrentVideo, FailedVideo, FlaggedVideo, OrchestratorError, OrchestratorStatus,
    Remedy, ReprocessOptions, SourceVideo, SubmitRequest, SubmitResult, MAX_VERSIONS_PER_VIDEO,
};
