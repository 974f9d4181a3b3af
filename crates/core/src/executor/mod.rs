//! Media transform execution.
//!
//! The [`TransformExecutor`] streams a source into a per-attempt
//! [`StagingArea`], runs one encode through a [`MediaEncoder`], and
//! publishes the result through an [`ArtifactStore`](crate::storage::ArtifactStore).

mod config;
mod error;
mod ffmpeg;
mod runner;
mod staging;
mod traits;
mod types;

pub use config::EncoderConfig;
pub use error::{ExecutorError, ExecutorErrorKind};
pub use ffmpeg::FfmpegEncoder;
pub(crate) use ffmpeg::run_ffprobe;
pub use runner::{TransformExecutor, OUTPUT_CONTENT_TYPE};
pub use staging::StagingArea;
pub use traits::MediaEncoder;
pub use types::{EncodeJob, EncodeOutcome, EncodeProgress, MediaInfo, OutputArtifact};
