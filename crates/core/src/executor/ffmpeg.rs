//! FFmpeg-based encoder implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::EncoderConfig;
use super::error::ExecutorError;
use super::traits::MediaEncoder;
use super::types::{EncodeJob, EncodeOutcome, EncodeProgress, MediaInfo};

/// Encodes with ffmpeg using a fixed H.264 / AAC / MP4 output policy.
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

impl FfmpegEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(EncoderConfig::default())
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Builds the ffmpeg argument list for one encode.
    pub fn build_args(&self, job: &EncodeJob) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            job.input_path.to_string_lossy().to_string(),
        ];

        if let Some(vf) = job.graph.video_filter() {
            args.extend(["-vf".to_string(), vf]);
        }
        if let Some(af) = job.graph.audio_filter() {
            args.extend(["-af".to_string(), af]);
        }

        args.extend([
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.config.preset.clone(),
            "-crf".to_string(),
            self.config.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", self.config.audio_bitrate_kbps),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]);

        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);

        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        args.push(job.output_path.to_string_lossy().to_string());
        args
    }

    async fn run_encode(
        &self,
        job: &EncodeJob,
        progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<EncodeOutcome, ExecutorError> {
        let start = Instant::now();

        // Input duration drives the progress percentage
        let duration_secs = self.probe(&job.input_path).await.ok().map(|i| i.duration_secs);
        let args = self.build_args(job);
        debug!(job_id = %job.job_id, ?args, "Spawning ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExecutorError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    ExecutorError::Staging(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutorError::encode_failed("ffmpeg stderr not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();

        let time_regex = Regex::new(r"out_time_ms=(\d+)").ok();
        let speed_regex = Regex::new(r"speed=\s*(\d+\.?\d*)x").ok();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut current_time = 0.0;
            let mut current_speed = None;
            let mut last_progress_send = Instant::now();
            let progress_interval = Duration::from_millis(500);
            let mut error_output = String::new();

            while let Ok(Some(line)) = reader.next_line().await {
                if line.contains("Error") || line.contains("error") {
                    error_output.push_str(&line);
                    error_output.push('\n');
                }

                if let Some(caps) = time_regex.as_ref().and_then(|re| re.captures(&line)) {
                    // out_time_ms is reported in microseconds
                    if let Ok(us) = caps[1].parse::<f64>() {
                        current_time = us / 1_000_000.0;
                    }
                }
                if let Some(caps) = speed_regex.as_ref().and_then(|re| re.captures(&line)) {
                    current_speed = Some(format!("{}x", &caps[1]));
                }

                if let Some(ref tx) = progress_tx {
                    if last_progress_send.elapsed() >= progress_interval {
                        let percent = match duration_secs {
                            Some(dur) if dur > 0.0 => (current_time / dur * 100.0).min(100.0) as f32,
                            _ => 0.0,
                        };
                        let _ = tx.try_send(EncodeProgress {
                            job_id: job.job_id.clone(),
                            percent,
                            time_secs: current_time,
                            duration_secs,
                            speed: current_speed.clone(),
                        });
                        last_progress_send = Instant::now();
                    }
                }
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, error_output))
        })
        .await;

        match result {
            Ok(Ok((status, error_output))) => {
                if !status.success() {
                    return Err(ExecutorError::encode_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        (!error_output.is_empty()).then_some(error_output),
                    ));
                }
            }
            Ok(Err(e)) => return Err(ExecutorError::Staging(e)),
            Err(_) => {
                let _ = child.kill().await;
                return Err(ExecutorError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        }

        let output_meta = tokio::fs::metadata(&job.output_path)
            .await
            .map_err(|_| ExecutorError::encode_failed("Output file not created", None))?;

        Ok(EncodeOutcome {
            output_path: job.output_path.clone(),
            output_size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Runs ffprobe on `path` and parses its JSON report.
pub(crate) async fn run_ffprobe(ffprobe_path: &Path, path: &Path) -> Result<MediaInfo, ExecutorError> {
    if !path.exists() {
        return Err(ExecutorError::probe_failed(format!(
            "file not found: {}",
            path.display()
        )));
    }

    let output = Command::new(ffprobe_path)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExecutorError::FfprobeNotFound {
                    path: ffprobe_path.to_path_buf(),
                }
            } else {
                ExecutorError::Staging(e)
            }
        })?;

    if !output.status.success() {
        return Err(ExecutorError::probe_failed(format!(
            "ffprobe exited with code: {:?}",
            output.status.code()
        )));
    }

    parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))
}

/// Parses ffprobe JSON output into [`MediaInfo`].
pub(crate) fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, ExecutorError> {
    #[derive(Deserialize)]
    struct ProbeOutput {
        format: ProbeFormat,
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    #[derive(Deserialize)]
    struct ProbeFormat {
        format_name: String,
        duration: Option<String>,
        size: Option<String>,
    }

    #[derive(Deserialize)]
    struct ProbeStream {
        codec_type: String,
        codec_name: Option<String>,
        sample_rate: Option<String>,
        width: Option<u32>,
        height: Option<u32>,
        r_frame_rate: Option<String>,
    }

    let probe: ProbeOutput = serde_json::from_str(output)
        .map_err(|e| ExecutorError::probe_failed(format!("Failed to parse ffprobe output: {}", e)))?;

    let audio = probe.streams.iter().find(|s| s.codec_type == "audio");
    let video = probe.streams.iter().find(|s| s.codec_type == "video");

    Ok(MediaInfo {
        path: path.to_path_buf(),
        size_bytes: probe
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        duration_secs: probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse().ok())
            .unwrap_or(0.0),
        format: probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown")
            .to_string(),
        video_codec: video.and_then(|s| s.codec_name.clone()),
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
        fps: video
            .and_then(|s| s.r_frame_rate.as_deref())
            .and_then(parse_frame_rate),
        audio_codec: audio.and_then(|s| s.codec_name.clone()),
        audio_sample_rate: audio
            .and_then(|s| s.sample_rate.as_deref())
            .and_then(|r| r.parse().ok()),
    })
}

/// Parses rates like "30000/1001" or "25".
fn parse_frame_rate(rate: &str) -> Option<f32> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f32>().ok()?;
            let den = den.parse::<f32>().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => rate.parse().ok(),
    }
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, ExecutorError> {
        run_ffprobe(&self.config.ffprobe_path, path).await
    }

    async fn encode(
        &self,
        job: EncodeJob,
        progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<EncodeOutcome, ExecutorError> {
        self.run_encode(&job, progress_tx).await
    }

    async fn validate(&self) -> Result<(), ExecutorError> {
        let check = |path: &Path| {
            let path = path.to_path_buf();
            async move {
                Command::new(&path)
                    .arg("-version")
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await
                    .map(|s| s.success())
                    .unwrap_or(false)
            }
        };

        if !check(&self.config.ffmpeg_path).await {
            return Err(ExecutorError::FfmpegNotFound {
                path: self.config.ffmpeg_path.clone(),
            });
        }
        if !check(&self.config.ffprobe_path).await {
            return Err(ExecutorError::FfprobeNotFound {
                path: self.config.ffprobe_path.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{TargetPlatform, TransformCompiler};
    use crate::preset::ModificationSettings;
    use std::path::PathBuf;

    fn job(settings: ModificationSettings) -> EncodeJob {
        EncodeJob {
            job_id: "pv-1".to_string(),
            input_path: PathBuf::from("/stage/input"),
            output_path: PathBuf::from("/stage/output.mp4"),
            graph: TransformCompiler::default()
                .compile(&settings, TargetPlatform::Tiktok)
                .unwrap(),
        }
    }

    #[test]
    fn test_build_args_fixed_policy() {
        let encoder = FfmpegEncoder::with_defaults();
        let args = encoder.build_args(&job(ModificationSettings::default()));

        assert_eq!(&args[..3], &["-y", "-i", "/stage/input"]);
        assert!(!args.contains(&"-vf".to_string()));
        assert!(!args.contains(&"-af".to_string()));
        for pair in [
            ["-c:v", "libx264"],
            ["-preset", "medium"],
            ["-crf", "23"],
            ["-c:a", "aac"],
            ["-b:a", "128k"],
            ["-movflags", "+faststart"],
        ] {
            assert!(
                args.windows(2).any(|w| w[0] == pair[0] && w[1] == pair[1]),
                "missing {:?}",
                pair
            );
        }
        assert_eq!(args.last().unwrap(), "/stage/output.mp4");
    }

    #[test]
    fn test_build_args_filters() {
        let encoder = FfmpegEncoder::with_defaults();
        let args = encoder.build_args(&job(ModificationSettings {
            speed: 1.25,
            flipped: true,
            ..Default::default()
        }));

        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "setpts=0.8*PTS,hflip");
        let af = args.iter().position(|a| a == "-af").unwrap();
        assert_eq!(args[af + 1], "atempo=1.25");
        assert!(vf < args.iter().position(|a| a == "-c:v").unwrap());
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1080, "height": 1920, "r_frame_rate": "30000/1001"},
                {"codec_type": "audio", "codec_name": "aac", "sample_rate": "44100"}
            ],
            "format": {"filename": "x.mp4", "format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "45.012", "size": "5242880"}
        }"#;
        let info = parse_probe_output(Path::new("/x.mp4"), json).unwrap();
        assert_eq!(info.format, "mov");
        assert_eq!(info.duration_secs, 45.012);
        assert_eq!(info.size_bytes, 5_242_880);
        assert_eq!(info.width, Some(1080));
        assert_eq!(info.pixel_count(), Some(1080 * 1920));
        assert!((info.fps.unwrap() - 29.97).abs() < 0.01);
        assert_eq!(info.audio_sample_rate, Some(44100));
    }

    #[test]
    fn test_parse_probe_output_invalid() {
        assert!(matches!(
            parse_probe_output(Path::new("/x"), "not json"),
            Err(ExecutorError::ProbeFailed { .. })
        ));
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("30/0"), None);
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let encoder = FfmpegEncoder::with_defaults();
        let result = encoder.probe(Path::new("/definitely/not/here.mp4")).await;
        assert!(matches!(result, Err(ExecutorError::ProbeFailed { .. })));
    }

    #[tokio::test]
    async fn test_validate_missing_binary() {
        let encoder = FfmpegEncoder::new(EncoderConfig::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        ));
        assert!(matches!(
            encoder.validate().await,
            Err(ExecutorError::FfmpegNotFound { .. })
        ));
    }
}
