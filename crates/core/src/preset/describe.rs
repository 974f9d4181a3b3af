//! Human-readable summaries and batch estimates.

use serde::Serialize;

use super::types::ModificationSettings;

/// Megabytes assumed per processed output when none is given.
pub const DEFAULT_OUTPUT_SIZE_MB: f64 = 5.0;

/// Seconds of source video assumed per output when none is given.
pub const DEFAULT_VIDEO_DURATION_SECS: f64 = 45.0;

/// Lists the visible effects of a settings draw.
pub fn describe_modifications(settings: &ModificationSettings) -> Vec<&'static str> {
    let mut out = Vec::new();

    if settings.speed < 0.98 {
        out.push("Slightly slower playback");
    } else if settings.speed > 1.02 {
        out.push("Slightly faster playback");
    } else if settings.speed != 1.0 {
        out.push("Subtle speed adjustment");
    }

    if settings.brightness > 3.0 {
        out.push("Brighter appearance");
    } else if settings.brightness < -3.0 {
        out.push("Darker appearance");
    } else if settings.brightness != 0.0 {
        out.push("Subtle brightness adjustment");
    }

    if settings.saturation > 3.0 {
        out.push("More vibrant colors");
    } else if settings.saturation < -3.0 {
        out.push("Less vibrant colors");
    } else if settings.saturation != 0.0 {
        out.push("Subtle color adjustment");
    }

    if settings.crop > 0.0 {
        out.push("Subtle edge crop");
    }
    if settings.audio_pitch != 0.0 {
        out.push("Minor audio adjustment");
    }
    if settings.flipped {
        out.push("Horizontally flipped");
    }
    if settings.rotation != 0.0 {
        out.push("Slight rotation");
    }
    if settings.noise > 0.0 {
        out.push("Added film grain");
    }

    if out.is_empty() {
        out.push("Minimal processing");
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageEstimate {
    pub total_mb: f64,
    pub display: String,
}

/// Estimates storage used by `video_count * versions_per_video` outputs.
pub fn estimate_processed_storage(
    video_count: u32,
    versions_per_video: u32,
    average_size_mb: f64,
) -> StorageEstimate {
    let total_mb = f64::from(video_count * versions_per_video) * average_size_mb;
    StorageEstimate {
        total_mb,
        display: format!("{:.1}GB", total_mb / 1024.0),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeEstimate {
    pub total_minutes: u64,
    pub display: String,
}

/// Estimates wall time assuming roughly 10s of work per 45s of video.
pub fn estimate_processing_time(
    video_count: u32,
    versions_per_video: u32,
    average_duration_secs: f64,
) -> TimeEstimate {
    let outputs = f64::from(video_count * versions_per_video);
    let per_output = average_duration_secs / DEFAULT_VIDEO_DURATION_SECS * 10.0;
    let total_minutes = (outputs * per_output / 60.0).ceil().max(0.0) as u64;

    let display = match total_minutes {
        0 => "less than a minute".to_string(),
        1 => "1 minute".to_string(),
        m if m < 60 => format!("{} minutes", m),
        m => {
            let hours = m / 60;
            let minutes = m % 60;
            if minutes > 0 {
                format!("{}h {}m", hours, minutes)
            } else if hours > 1 {
                format!("{} hours", hours)
            } else {
                "1 hour".to_string()
            }
        }
    };

    TimeEstimate {
        total_minutes,
        display,
    }
}
