//! Trait definitions for the executor module.

use async_trait::async_trait;
use std::path::Path;
use tokio::sync::mpsc;

use super::error::ExecutorError;
use super::types::{EncodeJob, EncodeOutcome, EncodeProgress, MediaInfo};

/// Runs a compiled filter graph in a single encoding pass.
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Returns the name of this encoder implementation.
    fn name(&self) -> &str;

    /// Probes a media file.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, ExecutorError>;

    /// Encodes `job.input_path` into `job.output_path`.
    ///
    /// If a progress sender is given it receives periodic updates; a full
    /// or dropped channel never stalls the encode.
    async fn encode(
        &self,
        job: EncodeJob,
        progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<EncodeOutcome, ExecutorError>;

    /// Checks that the encoder is usable.
    async fn validate(&self) -> Result<(), ExecutorError>;
}
