//! Error types for the transform module.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// A settings value is outside the domain the filters accept.
    #[error("Invalid parameter {parameter}={value}: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        value: f64,
        reason: String,
    },
}

impl TransformError {
    pub fn invalid_parameter(parameter: &'static str, value: f64, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter,
            value,
            reason: reason.into(),
        }
    }
}
