//! Error types for source and artifact storage.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing exists at the location.
    #[error("Not found: {location}")]
    NotFound { location: String },

    /// The location could not be interpreted.
    #[error("Invalid location: {location}")]
    InvalidLocation { location: String },

    /// Remote fetch failed.
    #[error("HTTP error: {reason}")]
    Http { reason: String },

    /// Upload or publish failed.
    #[error("Upload failed: {reason}")]
    Upload { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(location: impl Into<String>) -> Self {
        Self::NotFound {
            location: location.into(),
        }
    }

    pub fn invalid_location(location: impl Into<String>) -> Self {
        Self::InvalidLocation {
            location: location.into(),
        }
    }

    pub fn http(reason: impl ToString) -> Self {
        Self::Http {
            reason: reason.to_string(),
        }
    }

    pub fn upload(reason: impl Into<String>) -> Self {
        Self::Upload {
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        StorageError::http(e)
    }
}
