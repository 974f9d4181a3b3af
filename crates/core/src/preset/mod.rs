//! Presets, randomized parameter generation, and remediation.
//!
//! A [`PresetCatalog`] holds named tiers of parameter ranges. The
//! [`ParameterGenerator`] draws one [`ModificationSettings`] per requested
//! output, and the [`Remediator`] applies deterministic one-step fixes for
//! detected defects.

mod catalog;
mod describe;
mod error;
mod generator;
mod remediation;
mod types;

pub use catalog::{PresetCatalog, DEFAULT_PRESET};
pub use describe::{
    describe_modifications, estimate_processed_storage, estimate_processing_time,
    StorageEstimate, TimeEstimate, DEFAULT_OUTPUT_SIZE_MB, DEFAULT_VIDEO_DURATION_SECS,
};
pub use error::PresetError;
pub use generator::ParameterGenerator;
pub use remediation::{Remediator, BRIGHTNESS_STEP};
pub use types::{ModificationSettings, ParameterRange, ParameterRanges, Preset};
