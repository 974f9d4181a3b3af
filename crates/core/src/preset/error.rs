//! Error types for the preset module.

use thiserror::Error;

/// Errors raised while resolving presets or remediating settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PresetError {
    /// No preset with the requested name exists in the catalog.
    #[error("Invalid preset: {name}")]
    InvalidPreset { name: String },

    /// The defect name does not map to a known remediation.
    #[error("Unknown defect type: {name}")]
    UnknownDefect { name: String },

    /// A catalog definition failed validation.
    #[error("Invalid preset catalog: {reason}")]
    InvalidCatalog { reason: String },
}

impl PresetError {
    pub fn invalid_preset(name: impl Into<String>) -> Self {
        Self::InvalidPreset { name: name.into() }
    }

    pub fn unknown_defect(name: impl Into<String>) -> Self {
        Self::UnknownDefect { name: name.into() }
    }

    pub fn invalid_catalog(reason: impl Into<String>) -> Self {
        Self::InvalidCatalog {
            reason: reason.into(),
        }
    }
}
