//! Mock source and artifact stores for testing.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{ArtifactStore, ByteStream, PublishedArtifact, SourceStore, StorageError, StorageKey};

/// In-memory source media keyed by location.
#[derive(Debug, Default)]
pub struct MockSourceStore {
    sources: Arc<RwLock<HashMap<String, Bytes>>>,
    /// Number of upcoming fetches that fail regardless of location.
    failures: Arc<RwLock<u32>>,
    fetches: Arc<RwLock<Vec<String>>>,
}

impl MockSourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, location: impl Into<String>, content: impl Into<Bytes>) {
        self.sources
            .write()
            .await
            .insert(location.into(), content.into());
    }

    /// Fail the next `count` fetches with an HTTP error.
    pub async fn fail_next(&self, count: u32) {
        *self.failures.write().await = count;
    }

    pub async fn fetched(&self) -> Vec<String> {
        self.fetches.read().await.clone()
    }
}

#[async_trait]
impl SourceStore for MockSourceStore {
    async fn fetch(&self, location: &str) -> Result<ByteStream, StorageError> {
        self.fetches.write().await.push(location.to_string());

        {
            let mut failures = self.failures.write().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(StorageError::http("503 Service Unavailable"));
            }
        }

        let content = self
            .sources
            .read()
            .await
            .get(location)
            .cloned()
            .ok_or_else(|| StorageError::not_found(location))?;
        let chunks: Vec<Result<Bytes, StorageError>> = vec![Ok(content)];
        Ok(Box::pin(stream::iter(chunks)))
    }
}

/// A stored artifact for test assertions.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub published: PublishedArtifact,
    pub content: Bytes,
}

/// In-memory artifact store.
#[derive(Debug, Default)]
pub struct MockArtifactStore {
    artifacts: Arc<RwLock<Vec<StoredArtifact>>>,
    queued_errors: Arc<RwLock<VecDeque<String>>>,
}

impl MockArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an upload failure for the next put.
    pub async fn push_error(&self, reason: impl Into<String>) {
        self.queued_errors.write().await.push_back(reason.into());
    }

    pub async fn stored(&self) -> Vec<StoredArtifact> {
        self.artifacts.read().await.clone()
    }

    pub async fn get(&self, location: &str) -> Option<StoredArtifact> {
        self.artifacts
            .read()
            .await
            .iter()
            .find(|a| a.published.location == location)
            .cloned()
    }
}

#[async_trait]
impl ArtifactStore for MockArtifactStore {
    async fn put(
        &self,
        file: &Path,
        key: &StorageKey,
        content_type: &str,
    ) -> Result<PublishedArtifact, StorageError> {
        if let Some(reason) = self.queued_errors.write().await.pop_front() {
            return Err(StorageError::upload(reason));
        }

        let content = Bytes::from(tokio::fs::read(file).await?);
        let published = PublishedArtifact {
            key: key.clone(),
            location: format!("mock://{}", key),
            size_bytes: content.len() as u64,
            checksum: format!("{:x}", Sha256::digest(&content)),
            content_type: content_type.to_string(),
        };
        self.artifacts.write().await.push(StoredArtifact {
            published: published.clone(),
            content,
        });
        Ok(published)
    }
}
