//! Types shared by the executor and its encoders.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::staging::StagingArea;
use crate::transform::FilterGraph;

/// Container and stream facts reported by ffprobe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub duration_secs: f64,
    pub format: String,
    pub video_codec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f32>,
    pub audio_codec: Option<String>,
    pub audio_sample_rate: Option<u32>,
}

impl MediaInfo {
    /// Frame pixel count, when both dimensions are known.
    pub fn pixel_count(&self) -> Option<u64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(u64::from(w) * u64::from(h)),
            _ => None,
        }
    }

    pub fn has_audio(&self) -> bool {
        self.audio_codec.is_some()
    }
}

/// One single-pass encode.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub job_id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub graph: FilterGraph,
}

/// Progress reported while encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodeProgress {
    pub job_id: String,
    pub percent: f32,
    pub time_secs: f64,
    pub duration_secs: Option<f64>,
    pub speed: Option<String>,
}

/// Result of a finished encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOutcome {
    pub output_path: PathBuf,
    pub output_size_bytes: u64,
    pub duration_ms: u64,
}

/// An encoded output still held in its staging area.
///
/// Dropping the artifact removes the staged files.
#[derive(Debug)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Facts about the staged source, used as the verification baseline.
    pub source_info: MediaInfo,
    pub encode_duration_ms: u64,
    pub staging: StagingArea,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_count() {
        let info = MediaInfo {
            width: Some(1080),
            height: Some(1920),
            ..Default::default()
        };
        assert_eq!(info.pixel_count(), Some(2_073_600));
        assert_eq!(MediaInfo::default().pixel_count(), None);
        assert!(!info.has_audio());
    }
}
