use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::executor::EncoderConfig;
use crate::orchestrator::{OrchestratorConfig, RetryConfig};
use crate::preset::{Preset, PresetCatalog, PresetError};

/// Root configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub worker: OrchestratorConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Replacement preset catalog. Empty means the built-in presets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presets: Vec<Preset>,
}

impl Config {
    /// Builds the preset catalog this configuration selects.
    pub fn preset_catalog(&self) -> Result<Arc<PresetCatalog>, PresetError> {
        if self.presets.is_empty() {
            Ok(PresetCatalog::builtin())
        } else {
            PresetCatalog::new(self.presets.clone()).map(Arc::new)
        }
    }
}

/// Database configuration. Processed videos and the audit trail share the file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("postplex.db")
}

/// Where per-attempt staging directories are created.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagingConfig {
    #[serde(default = "default_staging_dir")]
    pub dir: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: default_staging_dir(),
        }
    }
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("postplex-staging")
}

/// Source video acquisition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Root for storage keys that are neither URLs nor absolute paths.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Timeout for HTTP source requests in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    300
}

/// Published output storage.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_root")]
    pub root: PathBuf,

    /// Base URL the artifact root is served under. Without it, locations
    /// are `file://` URLs.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: default_artifacts_root(),
            public_base_url: None,
        }
    }
}

fn default_artifacts_root() -> PathBuf {
    PathBuf::from("artifacts")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TargetPlatform;

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.worker.concurrency, 2);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.database.path, PathBuf::from("postplex.db"));
        assert_eq!(config.encoder.crf, 23);
        assert_eq!(config.source.request_timeout_secs, 300);
        assert_eq!(config.artifacts.root, PathBuf::from("artifacts"));
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.presets.is_empty());
    }

    #[test]
    fn test_deserialize_sections() {
        let config: Config = toml::from_str(
            r#"
[worker]
concurrency = 3
default_platform = "facebook"

[retry]
max_attempts = 5

[encoder]
ffmpeg_path = "/usr/local/bin/ffmpeg"
crf = 20

[artifacts]
root = "/srv/media"
public_base_url = "https://cdn.example.com/media"

[logging]
format = "json"
"#,
        )
        .unwrap();
        assert_eq!(config.worker.concurrency, 3);
        assert_eq!(config.worker.default_platform, TargetPlatform::Facebook);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 5000);
        assert_eq!(config.encoder.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(config.encoder.crf, 20);
        assert_eq!(
            config.artifacts.public_base_url.as_deref(),
            Some("https://cdn.example.com/media")
        );
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_builtin_catalog_when_no_presets() {
        let catalog = Config::default().preset_catalog().unwrap();
        assert!(catalog.contains("smart"));
        assert_eq!(catalog.presets().len(), 3);
    }

    #[test]
    fn test_custom_presets_replace_builtin() {
        let config: Config = toml::from_str(
            r#"
[[presets]]
name = "subtle"
display_name = "Subtle"
detection_risk = 4
visual_change = 1

[presets.ranges]
flip_chance = 0.0
speed = { min = 0.99, max = 1.01 }
brightness = { min = -1.0, max = 1.0 }
saturation = { min = -1.0, max = 1.0 }
crop = { min = 0.5, max = 1.0 }
audio_pitch = { min = 0.0, max = 0.5 }
rotation = { min = 0.0, max = 0.0 }
noise = { min = 0.0, max = 0.0 }
"#,
        )
        .unwrap();
        let catalog = config.preset_catalog().unwrap();
        assert_eq!(catalog.names(), vec!["subtle"]);
        assert!(!catalog.contains("smart"));
    }
}
