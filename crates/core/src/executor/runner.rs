//! Stage, encode, and publish one output.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::error::ExecutorError;
use super::staging::StagingArea;
use super::traits::MediaEncoder;
use super::types::{EncodeJob, EncodeProgress, OutputArtifact};
use crate::storage::{copy_to_file, ArtifactStore, PublishedArtifact, SourceStore, StorageKey};
use crate::transform::FilterGraph;

/// Content type of every published output.
pub const OUTPUT_CONTENT_TYPE: &str = "video/mp4";

/// Runs compiled filter graphs against source media.
///
/// Each call to [`TransformExecutor::execute`] owns a fresh staging area.
/// On failure the area is dropped before the error is returned; on success
/// it travels inside the [`OutputArtifact`] until [`TransformExecutor::publish`]
/// (or a drop) releases it.
pub struct TransformExecutor {
    staging_root: PathBuf,
    sources: Arc<dyn SourceStore>,
    encoder: Arc<dyn MediaEncoder>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl TransformExecutor {
    pub fn new(
        staging_root: PathBuf,
        sources: Arc<dyn SourceStore>,
        encoder: Arc<dyn MediaEncoder>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            staging_root,
            sources,
            encoder,
            artifacts,
        }
    }

    pub fn encoder(&self) -> &Arc<dyn MediaEncoder> {
        &self.encoder
    }

    pub async fn execute(
        &self,
        job_id: &str,
        source_location: &str,
        graph: &FilterGraph,
    ) -> Result<OutputArtifact, ExecutorError> {
        self.execute_with_progress(job_id, source_location, graph, None)
            .await
    }

    pub async fn execute_with_progress(
        &self,
        job_id: &str,
        source_location: &str,
        graph: &FilterGraph,
        progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<OutputArtifact, ExecutorError> {
        let staging = StagingArea::create(&self.staging_root, job_id)?;
        let input_path = staging.input_path();
        let output_path = staging.output_path();

        let stream = self
            .sources
            .fetch(source_location)
            .await
            .map_err(|e| ExecutorError::source_unavailable(source_location, e))?;
        let downloaded = copy_to_file(stream, &input_path)
            .await
            .map_err(|e| ExecutorError::source_unavailable(source_location, e))?;
        debug!(job_id, bytes = downloaded, "Staged source");

        let source_info = self.encoder.probe(&input_path).await?;
        let graph = graph.fit_to_source(source_info.width, source_info.height);

        info!(
            job_id,
            platform = %graph.platform,
            stages = ?graph.stage_names(),
            "Encoding"
        );
        let outcome = self
            .encoder
            .encode(
                EncodeJob {
                    job_id: job_id.to_string(),
                    input_path,
                    output_path,
                    graph,
                },
                progress_tx,
            )
            .await?;

        Ok(OutputArtifact {
            path: outcome.output_path,
            size_bytes: outcome.output_size_bytes,
            source_info,
            encode_duration_ms: outcome.duration_ms,
            staging,
        })
    }

    /// Uploads the artifact and releases its staging area.
    pub async fn publish(
        &self,
        artifact: OutputArtifact,
        key: &StorageKey,
    ) -> Result<PublishedArtifact, ExecutorError> {
        let result = self
            .artifacts
            .put(&artifact.path, key, OUTPUT_CONTENT_TYPE)
            .await
            .map_err(ExecutorError::StorageUnavailable);

        if let Err(e) = artifact.staging.close() {
            warn!(error = %e, "Staging cleanup failed after publish");
        }
        result
    }
}
