//! Source video acquisition.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::error::StorageError;

/// A stream of source bytes.
pub type ByteStream = BoxStream<'static, Result<Bytes, StorageError>>;

const CHUNK_SIZE: usize = 64 * 1024;

/// Reads source media by URL or storage key.
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Opens a streaming read of the media at `location`.
    async fn fetch(&self, location: &str) -> Result<ByteStream, StorageError>;
}

/// Fetches `http(s)://` URLs with reqwest, and `file://` URLs, absolute
/// paths, or keys relative to a local root from disk.
pub struct DefaultSourceStore {
    client: reqwest::Client,
    root: Option<PathBuf>,
}

impl DefaultSourceStore {
    pub fn new(root: Option<PathBuf>, request_timeout: Duration) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client, root })
    }

    fn resolve_path(&self, location: &str) -> Result<PathBuf, StorageError> {
        if let Some(path) = location.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        let path = Path::new(location);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        let escapes = path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        match &self.root {
            Some(root) if !escapes && !location.is_empty() => Ok(root.join(path)),
            _ => Err(StorageError::invalid_location(location)),
        }
    }

    async fn fetch_http(&self, url: &str) -> Result<ByteStream, StorageError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::not_found(url));
        }
        if !status.is_success() {
            return Err(StorageError::http(format!("{} returned {}", url, status)));
        }
        Ok(response.bytes_stream().map_err(StorageError::from).boxed())
    }
}

#[async_trait]
impl SourceStore for DefaultSourceStore {
    async fn fetch(&self, location: &str) -> Result<ByteStream, StorageError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            debug!(location, "Fetching remote source");
            return self.fetch_http(location).await;
        }

        let path = self.resolve_path(location)?;
        debug!(path = %path.display(), "Opening local source");
        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::not_found(location)
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(file_stream(file))
    }
}

/// Streams a file in fixed-size chunks.
pub fn file_stream(file: tokio::fs::File) -> ByteStream {
    stream::try_unfold(file, |mut file| async move {
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        let read = file.read_buf(&mut buf).await?;
        if read == 0 {
            Ok::<_, StorageError>(None)
        } else {
            Ok(Some((buf.freeze(), file)))
        }
    })
    .boxed()
}

/// Drains `stream` into a new file at `dest`, returning the byte count.
pub async fn copy_to_file(mut stream: ByteStream, dest: &Path) -> Result<u64, StorageError> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
