//! Per-attempt staging directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

const INPUT_NAME: &str = "input";
const OUTPUT_NAME: &str = "output.mp4";

/// An exclusive scratch directory for one execution attempt.
///
/// The directory and everything in it is deleted when the area is dropped,
/// so every exit path releases it. [`StagingArea::close`] removes it
/// eagerly and reports I/O failures.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Creates a fresh directory under `root`, creating `root` if needed.
    pub fn create(root: &Path, label: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("uniquify-{}-", sanitize_label(label)))
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "Created staging area");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the downloaded source is written.
    pub fn input_path(&self) -> PathBuf {
        self.dir.path().join(INPUT_NAME)
    }

    /// Where the encoder writes its output.
    pub fn output_path(&self) -> PathBuf {
        self.dir.path().join(OUTPUT_NAME)
    }

    /// Removes the directory now.
    pub fn close(self) -> std::io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to remove staging area");
        })
    }
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(48)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_drop_removes_dir() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let staging = StagingArea::create(root.path(), "job-1").unwrap();
            std::fs::write(staging.input_path(), b"data").unwrap();
            std::fs::write(staging.output_path(), b"data").unwrap();
            staging.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_close_removes_dir() {
        let root = tempfile::tempdir().unwrap();
        let staging = StagingArea::create(root.path(), "job-2").unwrap();
        let path = staging.path().to_path_buf();
        assert!(path.starts_with(root.path()));
        staging.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_creates_missing_root_and_sanitizes_label() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a/b");
        let staging = StagingArea::create(&nested, "../weird id").unwrap();
        let name = staging.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("uniquify-___weird_id-"));
        assert!(staging.path().starts_with(&nested));
    }
}
