//! Preset and settings types.

use serde::{Deserialize, Serialize};

use super::error::PresetError;

/// A closed numeric interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
}

impl ParameterRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Returns true if `value` lies inside the interval, bounds included.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Returns true if the interval collapses to a single point.
    pub fn is_fixed(&self) -> bool {
        self.min == self.max
    }

    /// Smallest interval covering both `self` and `other`.
    pub fn union(&self, other: &ParameterRange) -> ParameterRange {
        ParameterRange::new(self.min.min(other.min), self.max.max(other.max))
    }

    fn validate(&self, field: &str) -> Result<(), PresetError> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(PresetError::invalid_catalog(format!(
                "{} range must be finite",
                field
            )));
        }
        if self.min > self.max {
            return Err(PresetError::invalid_catalog(format!(
                "{} range has min {} greater than max {}",
                field, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Per-parameter ranges declared by a preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRanges {
    /// Playback speed multiplier.
    pub speed: ParameterRange,
    /// Brightness delta, in percent.
    pub brightness: ParameterRange,
    /// Saturation delta, in percent.
    pub saturation: ParameterRange,
    /// Percentage trimmed from each edge.
    pub crop: ParameterRange,
    /// Audio pitch delta, in percent.
    pub audio_pitch: ParameterRange,
    /// Probability of a horizontal flip, in `[0, 1]`.
    pub flip_chance: f64,
    /// Rotation, in degrees.
    pub rotation: ParameterRange,
    /// Grain intensity.
    pub noise: ParameterRange,
}

impl ParameterRanges {
    /// Validates every range and the flip probability.
    pub fn validate(&self) -> Result<(), PresetError> {
        self.speed.validate("speed")?;
        self.brightness.validate("brightness")?;
        self.saturation.validate("saturation")?;
        self.crop.validate("crop")?;
        self.audio_pitch.validate("audio_pitch")?;
        self.rotation.validate("rotation")?;
        self.noise.validate("noise")?;
        if !(0.0..=1.0).contains(&self.flip_chance) {
            return Err(PresetError::invalid_catalog(format!(
                "flip_chance must be within [0, 1], got {}",
                self.flip_chance
            )));
        }
        if self.speed.min <= 0.0 {
            return Err(PresetError::invalid_catalog("speed range must be positive"));
        }
        Ok(())
    }

    /// Returns true if every scalar field of `settings` lies in its range.
    pub fn contains(&self, settings: &ModificationSettings) -> bool {
        self.speed.contains(settings.speed)
            && self.brightness.contains(settings.brightness)
            && self.saturation.contains(settings.saturation)
            && self.crop.contains(settings.crop)
            && self.audio_pitch.contains(settings.audio_pitch)
            && self.rotation.contains(settings.rotation)
            && self.noise.contains(settings.noise)
    }
}

/// A named risk/visual-change tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// 1..=5, where 5 is the lowest detection risk.
    pub detection_risk: u8,
    /// 1..=5, where 5 is the most visible change.
    pub visual_change: u8,
    #[serde(default)]
    pub best_for: Vec<String>,
    pub ranges: ParameterRanges,
}

impl Preset {
    pub fn validate(&self) -> Result<(), PresetError> {
        if self.name.trim().is_empty() {
            return Err(PresetError::invalid_catalog("preset name cannot be empty"));
        }
        for (field, value) in [
            ("detection_risk", self.detection_risk),
            ("visual_change", self.visual_change),
        ] {
            if !(1..=5).contains(&value) {
                return Err(PresetError::invalid_catalog(format!(
                    "preset '{}': {} must be within 1..=5, got {}",
                    self.name, field, value
                )));
            }
        }
        self.ranges.validate().map_err(|e| match e {
            PresetError::InvalidCatalog { reason } => {
                PresetError::invalid_catalog(format!("preset '{}': {}", self.name, reason))
            }
            other => other,
        })
    }
}

/// One concrete parameter draw applied to a single output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModificationSettings {
    pub speed: f64,
    pub brightness: f64,
    pub saturation: f64,
    pub crop: f64,
    pub audio_pitch: f64,
    pub flipped: bool,
    pub rotation: f64,
    pub noise: f64,
}

impl Default for ModificationSettings {
    /// The identity transform.
    fn default() -> Self {
        Self {
            speed: 1.0,
            brightness: 0.0,
            saturation: 0.0,
            crop: 0.0,
            audio_pitch: 0.0,
            flipped: false,
            rotation: 0.0,
            noise: 0.0,
        }
    }
}

impl ModificationSettings {
    /// Returns true if applying these settings changes nothing.
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges() -> ParameterRanges {
        ParameterRanges {
            speed: ParameterRange::new(0.95, 1.05),
            brightness: ParameterRange::new(-5.0, 7.0),
            saturation: ParameterRange::new(-5.0, 8.0),
            crop: ParameterRange::new(1.0, 3.0),
            audio_pitch: ParameterRange::new(-1.5, 2.0),
            flip_chance: 0.25,
            rotation: ParameterRange::new(0.2, 0.8),
            noise: ParameterRange::new(0.0, 3.0),
        }
    }

    #[test]
    fn test_range_contains_bounds() {
        let range = ParameterRange::new(-2.0, 3.0);
        assert!(range.contains(-2.0));
        assert!(range.contains(3.0));
        assert!(!range.contains(3.0001));
        assert!(ParameterRange::new(0.0, 0.0).is_fixed());
    }

    #[test]
    fn test_range_union() {
        let merged = ParameterRange::new(-2.0, 3.0).union(&ParameterRange::new(-8.0, 1.0));
        assert_eq!(merged, ParameterRange::new(-8.0, 3.0));
    }

    #[test]
    fn test_ranges_validation() {
        assert!(ranges().validate().is_ok());

        let mut bad = ranges();
        bad.crop = ParameterRange::new(3.0, 1.0);
        assert!(matches!(
            bad.validate(),
            Err(PresetError::InvalidCatalog { .. })
        ));

        let mut bad = ranges();
        bad.flip_chance = 1.5;
        assert!(bad.validate().is_err());

        let mut bad = ranges();
        bad.noise = ParameterRange::new(0.0, f64::NAN);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_preset_validation_names_preset() {
        let preset = Preset {
            name: "custom".to_string(),
            display_name: "Custom".to_string(),
            description: String::new(),
            detection_risk: 0,
            visual_change: 3,
            best_for: vec![],
            ranges: ranges(),
        };
        let err = preset.validate().unwrap_err();
        assert!(err.to_string().contains("custom"));
    }

    #[test]
    fn test_default_settings_are_identity() {
        let settings = ModificationSettings::default();
        assert!(settings.is_identity());
        assert_eq!(settings.speed, 1.0);

        let changed = ModificationSettings {
            flipped: true,
            ..settings
        };
        assert!(!changed.is_identity());
    }

    #[test]
    fn test_settings_serde_roundtrip() {
        let settings = ModificationSettings {
            speed: 1.02,
            audio_pitch: -0.4,
            ..Default::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"audio_pitch\":-0.4"));
        let parsed: ModificationSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, settings);
    }
}
