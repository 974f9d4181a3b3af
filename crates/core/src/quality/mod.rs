//! Post-encode quality verification.
//!
//! Signal extraction sits behind [`MediaAnalyzer`]; the flagging policy in
//! [`evaluate`] uses global thresholds that do not depend on the preset.

mod analyzer;
mod flag;
mod verifier;

pub use analyzer::{AnalysisError, FfmpegAnalyzer, MediaAnalyzer};
pub use flag::{DefectType, QualityFlag};
pub use verifier::{
    evaluate, QualityReport, QualitySignals, QualityVerifier, AUDIO_CLIPPING_DB,
    MAX_DURATION_DIFF_SECS, MAX_MEAN_LUMINANCE, MAX_RESOLUTION_LOSS_PERCENT, MIN_MEAN_LUMINANCE,
};
