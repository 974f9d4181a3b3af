//! Compilation of modification settings into media filter graphs.

mod compiler;
mod error;
mod types;

pub use compiler::{validate_settings, TransformCompiler, DEFAULT_SAMPLE_RATE};
pub use error::TransformError;
pub use types::{AudioStage, FilterGraph, TargetPlatform, VideoStage};
