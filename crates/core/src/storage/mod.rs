//! Source and artifact storage boundaries.

mod artifact;
mod error;
mod key;
mod source;

pub use artifact::{ArtifactStore, FsArtifactStore, PublishedArtifact};
pub use error::StorageError;
pub use key::StorageKey;
pub use source::{copy_to_file, file_stream, ByteStream, DefaultSourceStore, SourceStore};
