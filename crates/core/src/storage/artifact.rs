//! Artifact publication.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::info;

use super::error::StorageError;
use super::key::StorageKey;

/// Where a published artifact landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedArtifact {
    pub key: StorageKey,
    /// Public location consumers fetch the artifact from.
    pub location: String,
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the content.
    pub checksum: String,
    pub content_type: String,
}

/// Stores finished artifacts under caller-derived keys.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Uploads the file at `file` under `key`.
    async fn put(
        &self,
        file: &Path,
        key: &StorageKey,
        content_type: &str,
    ) -> Result<PublishedArtifact, StorageError>;
}

/// Publishes artifacts into a local directory tree.
///
/// Files are written beside their final name and renamed into place, so a
/// reader never observes a partial artifact.
pub struct FsArtifactStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FsArtifactStore {
    pub fn new(root: PathBuf, public_base_url: Option<String>) -> Self {
        Self {
            root,
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn path_for(&self, key: &StorageKey) -> PathBuf {
        key.segments().fold(self.root.clone(), |p, s| p.join(s))
    }

    fn location_for(&self, key: &StorageKey, path: &Path) -> String {
        match &self.public_base_url {
            Some(base) => {
                let encoded: Vec<String> = key
                    .segments()
                    .map(|s| urlencoding::encode(s).into_owned())
                    .collect();
                format!("{}/{}", base, encoded.join("/"))
            }
            None => format!("file://{}", path.display()),
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(
        &self,
        file: &Path,
        key: &StorageKey,
        content_type: &str,
    ) -> Result<PublishedArtifact, StorageError> {
        let dest = self.path_for(key);
        let parent = dest
            .parent()
            .ok_or_else(|| StorageError::invalid_location(key.as_str()))?;
        tokio::fs::create_dir_all(parent).await?;

        let partial = dest.with_extension("partial");
        let mut reader = tokio::fs::File::open(file).await?;
        let mut writer = tokio::fs::File::create(&partial).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; 64 * 1024];
        let mut size_bytes = 0u64;

        loop {
            let read = reader.read(&mut buf).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
            writer.write_all(&buf[..read]).await?;
            size_bytes += read as u64;
        }
        writer.flush().await?;
        drop(writer);
        tokio::fs::rename(&partial, &dest).await?;

        let checksum = format!("{:x}", hasher.finalize());
        let location = self.location_for(key, &dest);
        info!(key = %key, size_bytes, "Published artifact");

        Ok(PublishedArtifact {
            key: key.clone(),
            location,
            size_bytes,
            checksum,
            content_type: content_type.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_put_copies_and_checksums() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("out.mp4");
        std::fs::write(&src, b"hello").unwrap();

        let store = FsArtifactStore::new(
            dir.path().join("artifacts"),
            Some("https://cdn.example.com/media/".to_string()),
        );
        let key = StorageKey::processed("u1", "c1", "pv 1", Utc::now());
        let published = store.put(&src, &key, "video/mp4").await.unwrap();

        assert_eq!(published.size_bytes, 5);
        assert_eq!(
            published.checksum,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(published
            .location
            .starts_with("https://cdn.example.com/media/processed/u1/c1/"));
        assert_eq!(std::fs::read(store.path_for(&key)).unwrap(), b"hello");
        assert!(src.exists());
    }

    #[tokio::test]
    async fn test_put_without_base_url_uses_file_location() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("out.mp4");
        std::fs::write(&src, b"x").unwrap();

        let store = FsArtifactStore::new(dir.path().join("a"), None);
        let key = StorageKey::processed("u", "c", "o", Utc::now());
        let published = store.put(&src, &key, "video/mp4").await.unwrap();
        assert!(published.location.starts_with("file://"));
        assert_eq!(published.content_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_put_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().to_path_buf(), None);
        let key = StorageKey::processed("u", "c", "o", Utc::now());
        assert!(matches!(
            store.put(&dir.path().join("missing"), &key, "video/mp4").await,
            Err(StorageError::Io(_))
        ));
    }
}
