//! Batch files passed on the command line.
//!
//! A batch file holds one submission or a JSON array of them, in the shape
//! of [`SubmitRequest`].

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use postplex_core::orchestrator::SubmitRequest;

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchFile {
    Many(Vec<SubmitRequest>),
    One(SubmitRequest),
}

/// Reads every submission in the file at `path`.
pub fn read_batch(path: &Path) -> Result<Vec<SubmitRequest>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {:?}", path))?;
    parse_batch(&content).with_context(|| format!("Invalid batch file {:?}", path))
}

fn parse_batch(content: &str) -> Result<Vec<SubmitRequest>> {
    let batch: BatchFile = serde_json::from_str(content)?;
    Ok(match batch {
        BatchFile::Many(requests) => requests,
        BatchFile::One(request) => vec![request],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use postplex_core::TargetPlatform;

    const ONE: &str = r#"{
        "user_id": "user-1",
        "campaign_id": "spring",
        "sources": [{"id": "src-1", "location": "https://cdn.example.com/a.mp4"}],
        "versions_per_video": 3,
        "target_platform": "instagram"
    }"#;

    #[test]
    fn test_single_submission() {
        let requests = parse_batch(ONE).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].versions_per_video, 3);
        assert_eq!(requests[0].preset, None);
        assert_eq!(requests[0].target_platform, Some(TargetPlatform::Instagram));
        assert_eq!(requests[0].sources[0].duration_secs, None);
    }

    #[test]
    fn test_submission_array_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, format!("[{}, {}]", ONE, ONE)).unwrap();

        let requests = read_batch(&path).unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn test_invalid_batch_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"user_id\": 1}").unwrap();

        let err = read_batch(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.json"));
        assert!(read_batch(&dir.path().join("missing.json")).is_err());
    }
}
