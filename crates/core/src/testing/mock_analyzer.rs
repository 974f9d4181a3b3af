//! Mock media analyzer for testing.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::MockEncoder;
use crate::executor::MediaInfo;
use crate::quality::{AnalysisError, MediaAnalyzer};

/// Signals the mock reports for every file. A `None` field makes the
/// matching analysis fail.
#[derive(Debug, Clone)]
pub struct MockSignals {
    pub info: Option<MediaInfo>,
    pub mean_luminance: Option<f64>,
    /// `Some(None)` means the file has no audio stream.
    pub audio_peak_db: Option<Option<f64>>,
}

impl Default for MockSignals {
    /// Signals of a clean output matching [`MockEncoder::default_info`].
    fn default() -> Self {
        Self {
            info: Some(MockEncoder::default_info()),
            mean_luminance: Some(120.0),
            audio_peak_db: Some(Some(-6.0)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MockAnalyzer {
    signals: Arc<RwLock<MockSignals>>,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_signals(&self, signals: MockSignals) {
        *self.signals.write().await = signals;
    }

    pub async fn set_mean_luminance(&self, luma: f64) {
        self.signals.write().await.mean_luminance = Some(luma);
    }

    pub async fn set_output_duration(&self, secs: f64) {
        if let Some(info) = self.signals.write().await.info.as_mut() {
            info.duration_secs = secs;
        }
    }
}

#[async_trait]
impl MediaAnalyzer for MockAnalyzer {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, AnalysisError> {
        let mut info = self
            .signals
            .read()
            .await
            .info
            .clone()
            .ok_or_else(|| AnalysisError::failed("probe disabled"))?;
        info.path = path.to_path_buf();
        Ok(info)
    }

    async fn mean_luminance(&self, _path: &Path) -> Result<f64, AnalysisError> {
        self.signals
            .read()
            .await
            .mean_luminance
            .ok_or(AnalysisError::MissingSignal { signal: "YAVG" })
    }

    async fn audio_peak_db(&self, _path: &Path) -> Result<Option<f64>, AnalysisError> {
        self.signals
            .read()
            .await
            .audio_peak_db
            .ok_or(AnalysisError::MissingSignal { signal: "max_volume" })
    }
}
