//! Defect taxonomy and quality flags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::preset::PresetError;

/// The fixed set of defects the verifier can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectType {
    TooDark,
    Overexposed,
    DurationChange,
    AudioDistorted,
    ResolutionReduced,
}

impl DefectType {
    pub const ALL: [DefectType; 5] = [
        DefectType::TooDark,
        DefectType::Overexposed,
        DefectType::DurationChange,
        DefectType::AudioDistorted,
        DefectType::ResolutionReduced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DefectType::TooDark => "too_dark",
            DefectType::Overexposed => "overexposed",
            DefectType::DurationChange => "duration_change",
            DefectType::AudioDistorted => "audio_distorted",
            DefectType::ResolutionReduced => "resolution_reduced",
        }
    }

    /// Message shown next to the flag.
    pub fn message(&self) -> &'static str {
        match self {
            DefectType::TooDark => "Video may be too dark",
            DefectType::Overexposed => "Video may be overexposed",
            DefectType::DurationChange => "Duration changed significantly",
            DefectType::AudioDistorted => "Audio may be distorted",
            DefectType::ResolutionReduced => "Resolution reduced",
        }
    }

    /// Suggested remediation.
    pub fn recommendation(&self) -> &'static str {
        match self {
            DefectType::TooDark => "Reprocess with increased brightness",
            DefectType::Overexposed => "Reprocess with decreased brightness",
            DefectType::DurationChange => "Reprocess with different speed settings",
            DefectType::AudioDistorted => "Reprocess with smaller pitch adjustment",
            DefectType::ResolutionReduced => "Reprocess with smaller crop value",
        }
    }
}

impl fmt::Display for DefectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefectType {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DefectType::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| PresetError::unknown_defect(s))
    }
}

/// A classified defect found on an output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityFlag {
    #[serde(rename = "type")]
    pub defect: DefectType,
    pub message: String,
    pub recommendation: String,
}

impl QualityFlag {
    pub fn new(defect: DefectType) -> Self {
        Self {
            defect,
            message: defect.message().to_string(),
            recommendation: defect.recommendation().to_string(),
        }
    }
}

impl From<DefectType> for QualityFlag {
    fn from(defect: DefectType) -> Self {
        QualityFlag::new(defect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        for defect in DefectType::ALL {
            assert_eq!(defect.as_str().parse::<DefectType>().unwrap(), defect);
        }
    }

    #[test]
    fn test_parse_unknown() {
        let err = "blurry".parse::<DefectType>().unwrap_err();
        assert_eq!(err, PresetError::unknown_defect("blurry"));
    }

    #[test]
    fn test_flag_serializes_with_type_tag() {
        let flag = QualityFlag::new(DefectType::AudioDistorted);
        let json = serde_json::to_value(&flag).unwrap();
        assert_eq!(json["type"], "audio_distorted");
        assert_eq!(json["message"], "Audio may be distorted");
        assert_eq!(json["recommendation"], "Reprocess with smaller pitch adjustment");
    }
}
