//! Signal extraction for quality checks.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use regex_lite::Regex;
use thiserror::Error;
use tokio::process::Command;

use crate::executor::{run_ffprobe, EncoderConfig, MediaInfo};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Analysis tool failed: {reason}")]
    Failed { reason: String },

    #[error("Signal not present in analysis output: {signal}")]
    MissingSignal { signal: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    pub fn failed(reason: impl ToString) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }
}

/// Extracts the coarse signals the verifier needs from a media file.
#[async_trait]
pub trait MediaAnalyzer: Send + Sync {
    /// Duration and frame dimensions.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, AnalysisError>;

    /// Mean 8-bit luma over sampled frames.
    async fn mean_luminance(&self, path: &Path) -> Result<f64, AnalysisError>;

    /// Peak audio level in dBFS, or `None` when there is no audio stream.
    async fn audio_peak_db(&self, path: &Path) -> Result<Option<f64>, AnalysisError>;
}

/// ffprobe / ffmpeg based analyzer.
///
/// Luma comes from the `signalstats` filter (YAVG), the audio peak from
/// `volumedetect` (max_volume).
pub struct FfmpegAnalyzer {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
    /// Every n-th frame is sampled for luminance.
    frame_step: u32,
}

impl FfmpegAnalyzer {
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
            frame_step: 30,
        }
    }

    async fn run_ffmpeg(&self, args: &[String]) -> Result<String, AnalysisError> {
        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            return Err(AnalysisError::failed(format!(
                "ffmpeg exited with code: {:?}",
                output.status.code()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }
}

/// Averages every `YAVG` value printed by the metadata filter.
pub(crate) fn parse_mean_luminance(output: &str) -> Option<f64> {
    let re = Regex::new(r"lavfi\.signalstats\.YAVG=(\d+(?:\.\d+)?)").ok()?;
    let values: Vec<f64> = re
        .captures_iter(output)
        .filter_map(|c| c[1].parse().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Extracts `max_volume` from volumedetect output.
pub(crate) fn parse_max_volume(output: &str) -> Option<f64> {
    let re = Regex::new(r"max_volume:\s*(-?(?:\d+(?:\.\d+)?|inf))\s*dB").ok()?;
    let caps = re.captures(output)?;
    match &caps[1] {
        "-inf" => Some(f64::NEG_INFINITY),
        value => value.parse().ok(),
    }
}

#[async_trait]
impl MediaAnalyzer for FfmpegAnalyzer {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, AnalysisError> {
        run_ffprobe(&self.ffprobe_path, path)
            .await
            .map_err(AnalysisError::failed)
    }

    async fn mean_luminance(&self, path: &Path) -> Result<f64, AnalysisError> {
        let filter = format!(
            "select='not(mod(n\\,{}))',signalstats,metadata=print:key=lavfi.signalstats.YAVG",
            self.frame_step
        );
        let input = path.to_string_lossy().into_owned();
        let args = [
            "-hide_banner",
            "-nostats",
            "-i",
            input.as_str(),
            "-vf",
            filter.as_str(),
            "-an",
            "-f",
            "null",
            "-",
        ]
        .map(String::from);

        let output = self.run_ffmpeg(&args).await?;
        parse_mean_luminance(&output).ok_or(AnalysisError::MissingSignal { signal: "YAVG" })
    }

    async fn audio_peak_db(&self, path: &Path) -> Result<Option<f64>, AnalysisError> {
        let info = self.probe(path).await?;
        if !info.has_audio() {
            return Ok(None);
        }

        let input = path.to_string_lossy().into_owned();
        let args = [
            "-hide_banner",
            "-nostats",
            "-i",
            input.as_str(),
            "-vn",
            "-af",
            "volumedetect",
            "-f",
            "null",
            "-",
        ]
        .map(String::from);

        let output = self.run_ffmpeg(&args).await?;
        parse_max_volume(&output)
            .map(Some)
            .ok_or(AnalysisError::MissingSignal {
                signal: "max_volume",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mean_luminance() {
        let output = "\
[Parsed_metadata_2 @ 0x55] frame:0    pts:0       pts_time:0
[Parsed_metadata_2 @ 0x55] lavfi.signalstats.YAVG=100.5
[Parsed_metadata_2 @ 0x55] frame:1    pts:30      pts_time:1
[Parsed_metadata_2 @ 0x55] lavfi.signalstats.YAVG=120.5
";
        assert_eq!(parse_mean_luminance(output), Some(110.5));
        assert_eq!(parse_mean_luminance("nothing here"), None);
    }

    #[test]
    fn test_parse_max_volume() {
        let output = "\
[Parsed_volumedetect_0 @ 0x1] mean_volume: -21.3 dB
[Parsed_volumedetect_0 @ 0x1] max_volume: -0.4 dB
";
        assert_eq!(parse_max_volume(output), Some(-0.4));
        assert_eq!(
            parse_max_volume("[x] max_volume: 0.0 dB"),
            Some(0.0)
        );
        assert_eq!(
            parse_max_volume("[x] max_volume: -inf dB"),
            Some(f64::NEG_INFINITY)
        );
        assert_eq!(parse_max_volume("mean_volume: -3 dB"), None);
    }

    #[tokio::test]
    async fn test_probe_missing_file_fails() {
        let analyzer = FfmpegAnalyzer::new(&EncoderConfig::default());
        assert!(analyzer.probe(Path::new("/no/such/file.mp4")).await.is_err());
    }
}
