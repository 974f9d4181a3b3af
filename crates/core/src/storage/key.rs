//! Artifact storage keys.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Object key under which an artifact is published.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Key for a processed output:
    /// `processed/{user}/{campaign}/{timestamp_ms}-{output_id}.mp4`.
    ///
    /// Every segment is sanitised, so a key never escapes its prefix.
    pub fn processed(user_id: &str, campaign_id: &str, output_id: &str, at: DateTime<Utc>) -> Self {
        Self(format!(
            "processed/{}/{}/{}-{}.mp4",
            clean_segment(user_id),
            clean_segment(campaign_id),
            at.timestamp_millis(),
            clean_segment(output_id)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Replaces everything outside `[A-Za-z0-9.-]` with `_`; a segment made
/// only of dots becomes underscores as well.
fn clean_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "_".repeat(cleaned.len().max(1))
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_processed_key_layout() {
        let key = StorageKey::processed("user-1", "camp-9", "pv-abc", at());
        assert_eq!(
            key.as_str(),
            format!("processed/user-1/camp-9/{}-pv-abc.mp4", at().timestamp_millis())
        );
        assert_eq!(key.segments().count(), 4);
    }

    #[test]
    fn test_segments_are_sanitized() {
        let key = StorageKey::processed("../etc", "a b/c", "..", at());
        let segments: Vec<_> = key.segments().collect();
        assert_eq!(segments[1], ".._etc");
        assert_eq!(segments[2], "a_b_c");
        assert!(segments[3].ends_with("-__.mp4"));
        assert!(!key.segments().any(|s| s == ".."));
    }

    #[test]
    fn test_empty_segment() {
        let key = StorageKey::processed("", "c", "o", at());
        assert_eq!(key.segments().nth(1), Some("_"));
    }
}
