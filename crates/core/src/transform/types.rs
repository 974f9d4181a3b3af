//! Filter graph types.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Platform an output is destined for.
///
/// Recorded on every graph and job. It does not alter the filter set yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
    #[default]
    Tiktok,
    Instagram,
    Facebook,
}

impl TargetPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetPlatform::Tiktok => "tiktok",
            TargetPlatform::Instagram => "instagram",
            TargetPlatform::Facebook => "facebook",
        }
    }
}

impl fmt::Display for TargetPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tiktok" => Ok(TargetPlatform::Tiktok),
            "instagram" => Ok(TargetPlatform::Instagram),
            "facebook" => Ok(TargetPlatform::Facebook),
            other => Err(format!("unknown target platform: {}", other)),
        }
    }
}

/// A single visual filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum VideoStage {
    /// Retimes frames so playback runs at `speed`.
    TimeRemap { speed: f64 },
    /// Brightness delta in `[-1, 1]`.
    Brightness { value: f64 },
    /// Saturation multiplier around 1.0.
    Saturation { value: f64 },
    /// Symmetric trim; `fraction` is removed from each edge.
    Crop { fraction: f64 },
    /// Scales a cropped frame back up to the source dimensions. `target` is
    /// the probed source frame, bound by [`FilterGraph::fit_to_source`].
    Rescale {
        fraction: f64,
        #[serde(default)]
        target: Option<(u32, u32)>,
    },
    HFlip,
    Rotate { radians: f64 },
    Noise { strength: f64 },
}

impl VideoStage {
    pub fn name(&self) -> &'static str {
        match self {
            VideoStage::TimeRemap { .. } => "time_remap",
            VideoStage::Brightness { .. } => "brightness",
            VideoStage::Saturation { .. } => "saturation",
            VideoStage::Crop { .. } => "crop",
            VideoStage::Rescale { .. } => "rescale",
            VideoStage::HFlip => "hflip",
            VideoStage::Rotate { .. } => "rotate",
            VideoStage::Noise { .. } => "noise",
        }
    }

    /// Renders the stage as an ffmpeg filter expression.
    pub fn to_filter(&self) -> String {
        match *self {
            VideoStage::TimeRemap { speed } => format!("setpts={}*PTS", 1.0 / speed),
            VideoStage::Brightness { value } => format!("eq=brightness={}", value),
            VideoStage::Saturation { value } => format!("eq=saturation={}", value),
            VideoStage::Crop { fraction } => {
                let keep = 1.0 - 2.0 * fraction;
                format!("crop=iw*{keep}:ih*{keep}")
            }
            // libx264 needs even dimensions
            VideoStage::Rescale {
                target: Some((width, height)),
                ..
            } => format!("scale={}:{}", width & !1, height & !1),
            VideoStage::Rescale {
                fraction,
                target: None,
            } => {
                let keep = 1.0 - 2.0 * fraction;
                format!("scale=trunc(iw/{keep}/2)*2:trunc(ih/{keep}/2)*2")
            }
            VideoStage::HFlip => "hflip".to_string(),
            VideoStage::Rotate { radians } => format!("rotate={}:fillcolor=black@0", radians),
            VideoStage::Noise { strength } => format!("noise=alls={}:allf=t+u", strength),
        }
    }

    pub(crate) fn rotate_degrees(degrees: f64) -> Self {
        VideoStage::Rotate {
            radians: degrees * PI / 180.0,
        }
    }
}

/// A single audio filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum AudioStage {
    /// Tempo change matching the video time remap.
    Tempo { rate: f64 },
    /// Pitch shift by `factor`. Input is first resampled to `sample_rate`
    /// so the relabel in `asetrate` is exact whatever the source rate, then
    /// the tempo side effect is undone so duration stays unchanged.
    Pitch { factor: f64, sample_rate: u32 },
}

impl AudioStage {
    pub fn name(&self) -> &'static str {
        match self {
            AudioStage::Tempo { .. } => "tempo",
            AudioStage::Pitch { .. } => "pitch",
        }
    }

    pub fn to_filter(&self) -> String {
        match *self {
            AudioStage::Tempo { rate } => format!("atempo={}", rate),
            AudioStage::Pitch {
                factor,
                sample_rate,
            } => format!(
                "aresample={rate},asetrate={rate}*{factor},aresample={rate},atempo={}",
                1.0 / factor,
                rate = sample_rate,
            ),
        }
    }
}

/// Ordered visual and audio stages compiled from one settings draw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterGraph {
    pub platform: TargetPlatform,
    pub video: Vec<VideoStage>,
    pub audio: Vec<AudioStage>,
}

impl FilterGraph {
    pub fn is_empty(&self) -> bool {
        self.video.is_empty() && self.audio.is_empty()
    }

    /// The `-vf` argument, if any visual stage is present.
    pub fn video_filter(&self) -> Option<String> {
        join(self.video.iter().map(VideoStage::to_filter))
    }

    /// The `-af` argument, if any audio stage is present.
    pub fn audio_filter(&self) -> Option<String> {
        join(self.audio.iter().map(AudioStage::to_filter))
    }

    /// Binds rescale stages to the probed source frame so the output keeps
    /// the source resolution exactly. Unknown dimensions leave the graph as is.
    pub fn fit_to_source(&self, width: Option<u32>, height: Option<u32>) -> FilterGraph {
        let mut graph = self.clone();
        if let (Some(w), Some(h)) = (width, height) {
            for stage in &mut graph.video {
                if let VideoStage::Rescale { target, .. } = stage {
                    *target = Some((w, h));
                }
            }
        }
        graph
    }

    /// Stage names in order, visual first. Used for logs and audit.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.video
            .iter()
            .map(VideoStage::name)
            .chain(self.audio.iter().map(AudioStage::name))
            .collect()
    }

    /// Rate of the time-remap stage, or 1.0 when absent.
    pub fn time_remap_speed(&self) -> f64 {
        self.video
            .iter()
            .find_map(|s| match s {
                VideoStage::TimeRemap { speed } => Some(*speed),
                _ => None,
            })
            .unwrap_or(1.0)
    }
}

fn join(parts: impl Iterator<Item = String>) -> Option<String> {
    let joined = parts.collect::<Vec<_>>().join(",");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}
