//! Preset catalog.

use std::sync::Arc;

use once_cell::sync::Lazy;

use super::error::PresetError;
use super::types::{ParameterRange, ParameterRanges, Preset};

/// Name of the preset used when a caller does not pick one.
pub const DEFAULT_PRESET: &str = "smart";

static BUILTIN: Lazy<Arc<PresetCatalog>> = Lazy::new(|| {
    Arc::new(PresetCatalog {
        presets: builtin_presets(),
    })
});

fn builtin_presets() -> Vec<Preset> {
    vec![
        Preset {
            name: "safe".to_string(),
            display_name: "Safe Mode".to_string(),
            description: "Looks almost identical to the original. Very subtle changes that are nearly invisible.".to_string(),
            detection_risk: 5,
            visual_change: 1,
            best_for: vec![
                "Testing new accounts".to_string(),
                "High-quality product videos".to_string(),
                "Brand-focused content".to_string(),
            ],
            ranges: ParameterRanges {
                speed: ParameterRange::new(0.98, 1.02),
                brightness: ParameterRange::new(-2.0, 3.0),
                saturation: ParameterRange::new(-3.0, 3.0),
                crop: ParameterRange::new(0.5, 1.5),
                audio_pitch: ParameterRange::new(-0.5, 1.0),
                flip_chance: 0.0,
                rotation: ParameterRange::new(0.0, 0.0),
                noise: ParameterRange::new(0.0, 0.0),
            },
        },
        Preset {
            name: "smart".to_string(),
            display_name: "Smart Mode".to_string(),
            description: "Natural-looking changes. Hard to spot the difference, but definitely unique.".to_string(),
            detection_risk: 5,
            visual_change: 3,
            best_for: vec![
                "Growing multiple accounts".to_string(),
                "Reposting popular content".to_string(),
                "Daily posting 2-3 times per day".to_string(),
            ],
            ranges: ParameterRanges {
                speed: ParameterRange::new(0.95, 1.05),
                brightness: ParameterRange::new(-5.0, 7.0),
                saturation: ParameterRange::new(-5.0, 8.0),
                crop: ParameterRange::new(1.0, 3.0),
                audio_pitch: ParameterRange::new(-1.5, 2.0),
                flip_chance: 0.25,
                rotation: ParameterRange::new(0.2, 0.8),
                noise: ParameterRange::new(0.0, 3.0),
            },
        },
        Preset {
            name: "maximum".to_string(),
            display_name: "Maximum Mode".to_string(),
            description: "Clearly different from original. Maximum protection against detection.".to_string(),
            detection_risk: 5,
            visual_change: 5,
            best_for: vec![
                "Faceless channels".to_string(),
                "Compilation content".to_string(),
                "Aggressive reposting strategies".to_string(),
            ],
            ranges: ParameterRanges {
                speed: ParameterRange::new(0.90, 1.10),
                brightness: ParameterRange::new(-8.0, 12.0),
                saturation: ParameterRange::new(-8.0, 12.0),
                crop: ParameterRange::new(2.0, 5.0),
                audio_pitch: ParameterRange::new(-2.5, 3.0),
                flip_chance: 0.5,
                rotation: ParameterRange::new(0.5, 1.5),
                noise: ParameterRange::new(3.0, 7.0),
            },
        },
    ]
}

/// An immutable set of presets, looked up by name.
#[derive(Debug, Clone)]
pub struct PresetCatalog {
    presets: Vec<Preset>,
}

impl PresetCatalog {
    /// Builds a catalog from configured presets, validating each one.
    pub fn new(presets: Vec<Preset>) -> Result<Self, PresetError> {
        if presets.is_empty() {
            return Err(PresetError::invalid_catalog(
                "catalog must define at least one preset",
            ));
        }
        for (i, preset) in presets.iter().enumerate() {
            preset.validate()?;
            if presets[..i].iter().any(|p| p.name == preset.name) {
                return Err(PresetError::invalid_catalog(format!(
                    "duplicate preset name '{}'",
                    preset.name
                )));
            }
        }
        Ok(Self { presets })
    }

    /// The built-in safe / smart / maximum tiers, initialised once.
    pub fn builtin() -> Arc<PresetCatalog> {
        Arc::clone(&BUILTIN)
    }

    /// Looks up a preset by name.
    pub fn get(&self, name: &str) -> Result<&Preset, PresetError> {
        self.presets
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| PresetError::invalid_preset(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.presets.iter().any(|p| p.name == name)
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn names(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.name.as_str()).collect()
    }

    /// The envelope of every preset's ranges.
    ///
    /// Remediation clamps against these bounds, so a quick-fix can never
    /// push a value outside what some preset would have produced.
    pub fn legal_bounds(&self) -> ParameterRanges {
        // `new` rejects empty catalogs and the builtin table is non-empty.
        let first = &self.presets[0].ranges;
        self.presets[1..]
            .iter()
            .fold(first.clone(), |acc, preset| {
                let r = &preset.ranges;
                ParameterRanges {
                    speed: acc.speed.union(&r.speed),
                    brightness: acc.brightness.union(&r.brightness),
                    saturation: acc.saturation.union(&r.saturation),
                    crop: acc.crop.union(&r.crop),
                    audio_pitch: acc.audio_pitch.union(&r.audio_pitch),
                    flip_chance: acc.flip_chance.max(r.flip_chance),
                    rotation: acc.rotation.union(&r.rotation),
                    noise: acc.noise.union(&r.noise),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_has_three_tiers() {
        let catalog = PresetCatalog::builtin();
        assert_eq!(catalog.names(), vec!["safe", "smart", "maximum"]);
        assert!(catalog.contains(DEFAULT_PRESET));
        for preset in catalog.presets() {
            preset.validate().unwrap();
        }
    }

    #[test]
    fn test_builtin_is_shared() {
        let a = PresetCatalog::builtin();
        let b = PresetCatalog::builtin();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_safe_disables_rotation_and_noise() {
        let catalog = PresetCatalog::builtin();
        let safe = catalog.get("safe").unwrap();
        assert!(safe.ranges.rotation.is_fixed());
        assert_eq!(safe.ranges.rotation.max, 0.0);
        assert_eq!(safe.ranges.noise.max, 0.0);
        assert_eq!(safe.ranges.flip_chance, 0.0);
    }

    #[test]
    fn test_unknown_preset() {
        let catalog = PresetCatalog::builtin();
        assert_eq!(
            catalog.get("extreme").unwrap_err(),
            PresetError::invalid_preset("extreme")
        );
    }

    #[test]
    fn test_legal_bounds_is_envelope() {
        let bounds = PresetCatalog::builtin().legal_bounds();
        assert_eq!(bounds.brightness, ParameterRange::new(-8.0, 12.0));
        assert_eq!(bounds.speed, ParameterRange::new(0.90, 1.10));
        assert_eq!(bounds.crop, ParameterRange::new(0.5, 5.0));
        assert_eq!(bounds.flip_chance, 0.5);
    }

    #[test]
    fn test_new_rejects_duplicates_and_empty() {
        assert!(PresetCatalog::new(vec![]).is_err());

        let safe = PresetCatalog::builtin().get("safe").unwrap().clone();
        let err = PresetCatalog::new(vec![safe.clone(), safe]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_new_accepts_custom_tier() {
        let mut gentle = PresetCatalog::builtin().get("safe").unwrap().clone();
        gentle.name = "gentle".to_string();
        gentle.ranges.brightness = ParameterRange::new(0.0, 1.0);
        let catalog = PresetCatalog::new(vec![gentle]).unwrap();
        assert!(catalog.contains("gentle"));
        assert!(!catalog.contains("safe"));
        assert_eq!(catalog.legal_bounds().brightness.max, 1.0);
    }
}
