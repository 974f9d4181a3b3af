//! Deterministic, defect-targeted corrections.

use tracing::debug;

use super::catalog::PresetCatalog;
use super::error::PresetError;
use super::types::{ModificationSettings, ParameterRanges};
use crate::quality::DefectType;

/// Brightness change applied by a single too-dark / overexposed fix.
pub const BRIGHTNESS_STEP: f64 = 5.0;

/// Applies one-step corrections that move settings toward safer values.
///
/// Brightness is clamped to the catalog's legal envelope. A value already
/// at (or past) the clamp bound is returned unchanged.
#[derive(Debug, Clone)]
pub struct Remediator {
    bounds: ParameterRanges,
}

impl Remediator {
    pub fn new(catalog: &PresetCatalog) -> Self {
        Self {
            bounds: catalog.legal_bounds(),
        }
    }

    pub fn bounds(&self) -> &ParameterRanges {
        &self.bounds
    }

    pub fn adjust(&self, settings: &ModificationSettings, defect: DefectType) -> ModificationSettings {
        let mut adjusted = *settings;
        let brightness = &self.bounds.brightness;

        match defect {
            DefectType::TooDark => {
                if settings.brightness < brightness.max {
                    adjusted.brightness = (settings.brightness + BRIGHTNESS_STEP).min(brightness.max);
                }
            }
            DefectType::Overexposed => {
                if settings.brightness > brightness.min {
                    adjusted.brightness = (settings.brightness - BRIGHTNESS_STEP).max(brightness.min);
                }
            }
            DefectType::DurationChange => {
                adjusted.speed = 1.0 + (settings.speed - 1.0) * 0.5;
            }
            DefectType::AudioDistorted => {
                adjusted.audio_pitch = settings.audio_pitch * 0.5;
            }
            DefectType::ResolutionReduced => {
                adjusted.crop = settings.crop * 0.5;
            }
        }

        debug!(defect = %defect, before = ?settings, after = ?adjusted, "Adjusted settings");
        adjusted
    }

    /// Like [`Remediator::adjust`], taking the defect by its wire name.
    pub fn adjust_named(
        &self,
        settings: &ModificationSettings,
        defect: &str,
    ) -> Result<ModificationSettings, PresetError> {
        let defect: DefectType = defect.parse()?;
        Ok(self.adjust(settings, defect))
    }
}
