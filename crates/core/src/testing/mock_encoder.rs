//! Mock encoder for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::executor::{
    EncodeJob, EncodeOutcome, EncodeProgress, ExecutorError, MediaEncoder, MediaInfo,
};

/// A recorded encode for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedEncode {
    pub job: EncodeJob,
    pub success: bool,
}

/// Mock implementation of the MediaEncoder trait.
///
/// Encodes copy the staged input to the output path, so whatever bytes the
/// source store served end up in the artifact. Failures can be queued one
/// at a time or forced for every encode.
///
/// # Example
///
/// ```rust,ignore
/// use postplex_core::testing::MockEncoder;
///
/// let encoder = MockEncoder::new();
/// encoder.push_error(ExecutorError::encode_failed("boom", None)).await;
///
/// // First encode fails, the next one succeeds.
/// ```
#[derive(Debug)]
pub struct MockEncoder {
    encodes: Arc<RwLock<Vec<RecordedEncode>>>,
    /// Errors returned by the next encodes, in order.
    queued_errors: Arc<RwLock<VecDeque<ExecutorError>>>,
    /// When set, every encode fails with this reason.
    always_fail: Arc<RwLock<Option<String>>>,
    /// Returned by probe for every path.
    media_info: Arc<RwLock<MediaInfo>>,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoder {
    pub fn new() -> Self {
        Self {
            encodes: Arc::new(RwLock::new(Vec::new())),
            queued_errors: Arc::new(RwLock::new(VecDeque::new())),
            always_fail: Arc::new(RwLock::new(None)),
            media_info: Arc::new(RwLock::new(Self::default_info())),
        }
    }

    /// A 30 second 1080x1920 clip with stereo audio.
    pub fn default_info() -> MediaInfo {
        MediaInfo {
            path: PathBuf::new(),
            size_bytes: 10 * 1024 * 1024,
            duration_secs: 30.0,
            format: "mov,mp4,m4a,3gp,3g2,mj2".to_string(),
            video_codec: Some("h264".to_string()),
            width: Some(1080),
            height: Some(1920),
            fps: Some(30.0),
            audio_codec: Some("aac".to_string()),
            audio_sample_rate: Some(44_100),
        }
    }

    pub async fn recorded_encodes(&self) -> Vec<RecordedEncode> {
        self.encodes.read().await.clone()
    }

    pub async fn encode_count(&self) -> usize {
        self.encodes.read().await.len()
    }

    /// Queue an error for the next encode.
    pub async fn push_error(&self, error: ExecutorError) {
        self.queued_errors.write().await.push_back(error);
    }

    /// Make every encode fail until cleared with `None`.
    pub async fn set_always_fail(&self, reason: Option<&str>) {
        *self.always_fail.write().await = reason.map(str::to_string);
    }

    pub async fn set_media_info(&self, info: MediaInfo) {
        *self.media_info.write().await = info;
    }

    async fn take_error(&self) -> Option<ExecutorError> {
        if let Some(reason) = self.always_fail.read().await.clone() {
            return Some(ExecutorError::encode_failed(reason, None));
        }
        self.queued_errors.write().await.pop_front()
    }
}

#[async_trait]
impl MediaEncoder for MockEncoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, ExecutorError> {
        let mut info = self.media_info.read().await.clone();
        info.path = path.to_path_buf();
        Ok(info)
    }

    async fn encode(
        &self,
        job: EncodeJob,
        progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<EncodeOutcome, ExecutorError> {
        if let Some(err) = self.take_error().await {
            // Leave a partial output behind, like a crashed ffmpeg would.
            let _ = tokio::fs::write(&job.output_path, b"partial").await;
            self.encodes.write().await.push(RecordedEncode {
                job,
                success: false,
            });
            return Err(err);
        }

        tokio::fs::copy(&job.input_path, &job.output_path).await?;
        let output_size_bytes = tokio::fs::metadata(&job.output_path).await?.len();

        if let Some(tx) = progress_tx {
            let duration = self.media_info.read().await.duration_secs;
            let _ = tx.try_send(EncodeProgress {
                job_id: job.job_id.clone(),
                percent: 100.0,
                time_secs: duration,
                duration_secs: Some(duration),
                speed: Some("1x".to_string()),
            });
        }

        let outcome = EncodeOutcome {
            output_path: job.output_path.clone(),
            output_size_bytes,
            duration_ms: 5,
        };
        self.encodes.write().await.push(RecordedEncode { job, success: true });
        Ok(outcome)
    }

    async fn validate(&self) -> Result<(), ExecutorError> {
        Ok(())
    }
}
