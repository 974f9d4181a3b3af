//! Output quality verification.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::analyzer::MediaAnalyzer;
use super::flag::{DefectType, QualityFlag};
use crate::executor::{MediaInfo, OutputArtifact};
use crate::metrics;

/// Mean luma below this is too dark.
pub const MIN_MEAN_LUMINANCE: f64 = 30.0;
/// Mean luma above this is overexposed.
pub const MAX_MEAN_LUMINANCE: f64 = 240.0;
/// Largest tolerated output/source duration gap.
pub const MAX_DURATION_DIFF_SECS: f64 = 2.0;
/// Largest tolerated pixel-count loss, in percent of the source.
pub const MAX_RESOLUTION_LOSS_PERCENT: f64 = 10.0;
/// Peak level above which audio counts as clipped, in dBFS.
pub const AUDIO_CLIPPING_DB: f64 = -1.0;

/// Raw measurements a verification pass is judged on.
///
/// A `None` signal could not be extracted and its check is skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualitySignals {
    pub mean_luminance: Option<f64>,
    pub output_duration_secs: Option<f64>,
    pub source_duration_secs: Option<f64>,
    pub output_pixels: Option<u64>,
    pub source_pixels: Option<u64>,
    pub audio_peak_db: Option<f64>,
}

/// Applies the fixed thresholds to a set of signals.
pub fn evaluate(signals: &QualitySignals) -> Vec<QualityFlag> {
    let mut flags = Vec::new();

    if let Some(luma) = signals.mean_luminance {
        if luma < MIN_MEAN_LUMINANCE {
            flags.push(QualityFlag::new(DefectType::TooDark));
        }
        if luma > MAX_MEAN_LUMINANCE {
            flags.push(QualityFlag::new(DefectType::Overexposed));
        }
    }

    if let (Some(out), Some(src)) = (signals.output_duration_secs, signals.source_duration_secs) {
        if (out - src).abs() > MAX_DURATION_DIFF_SECS {
            flags.push(QualityFlag::new(DefectType::DurationChange));
        }
    }

    if let Some(peak) = signals.audio_peak_db {
        if peak > AUDIO_CLIPPING_DB {
            flags.push(QualityFlag::new(DefectType::AudioDistorted));
        }
    }

    if let (Some(out), Some(src)) = (signals.output_pixels, signals.source_pixels) {
        if src > 0 {
            let loss = (src as f64 - out as f64) / src as f64 * 100.0;
            if loss > MAX_RESOLUTION_LOSS_PERCENT {
                flags.push(QualityFlag::new(DefectType::ResolutionReduced));
            }
        }
    }

    flags
}

/// The outcome of one verification pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub flags: Vec<QualityFlag>,
}

impl QualityReport {
    pub fn new(flags: Vec<QualityFlag>) -> Self {
        Self { flags }
    }

    /// True exactly when no flag was raised.
    pub fn is_verified(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn has(&self, defect: DefectType) -> bool {
        self.flags.iter().any(|f| f.defect == defect)
    }

    pub fn into_flags(self) -> Vec<QualityFlag> {
        self.flags
    }
}

/// Inspects encoded outputs and classifies defects.
///
/// Verification never fails: a signal that cannot be extracted is logged
/// and its check skipped.
pub struct QualityVerifier {
    analyzer: Arc<dyn MediaAnalyzer>,
}

impl QualityVerifier {
    pub fn new(analyzer: Arc<dyn MediaAnalyzer>) -> Self {
        Self { analyzer }
    }

    pub async fn verify(&self, artifact: &OutputArtifact, source_duration_secs: f64) -> QualityReport {
        self.verify_path(&artifact.path, &artifact.source_info, source_duration_secs)
            .await
    }

    pub async fn verify_path(
        &self,
        output: &Path,
        source: &MediaInfo,
        source_duration_secs: f64,
    ) -> QualityReport {
        let signals = self.collect(output, source, source_duration_secs).await;
        let report = QualityReport::new(evaluate(&signals));

        for flag in &report.flags {
            metrics::QUALITY_FLAGS_TOTAL
                .with_label_values(&[flag.defect.as_str()])
                .inc();
        }
        debug!(
            path = %output.display(),
            ?signals,
            flags = report.flags.len(),
            "Verified output"
        );
        report
    }

    async fn collect(&self, output: &Path, source: &MediaInfo, source_duration_secs: f64) -> QualitySignals {
        let mut signals = QualitySignals {
            source_duration_secs: measured(source_duration_secs),
            source_pixels: source.pixel_count(),
            ..Default::default()
        };

        match self.analyzer.probe(output).await {
            Ok(info) => {
                signals.output_duration_secs = measured(info.duration_secs);
                if signals.output_duration_secs.is_none() {
                    warn!(path = %output.display(), "Output duration unknown, skipping duration check");
                }
                signals.output_pixels = info.pixel_count();
            }
            Err(e) => warn!(path = %output.display(), error = %e, "Probe failed, skipping duration and resolution checks"),
        }

        match self.analyzer.mean_luminance(output).await {
            Ok(luma) => signals.mean_luminance = Some(luma),
            Err(e) => warn!(path = %output.display(), error = %e, "Luminance analysis failed, skipping brightness checks"),
        }

        match self.analyzer.audio_peak_db(output).await {
            Ok(peak) => signals.audio_peak_db = peak,
            Err(e) => warn!(path = %output.display(), error = %e, "Audio analysis failed, skipping clipping check"),
        }

        signals
    }
}

/// ffprobe reports 0 when a container carries no duration.
fn measured(secs: f64) -> Option<f64> {
    (secs.is_finite() && secs > 0.0).then_some(secs)
}
