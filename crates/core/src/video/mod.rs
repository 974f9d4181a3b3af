//! Processed video records and their persistence.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteVideoStore;
pub use store::{ProcessedVideoStore, StoreError, VideoFilter};
pub use types::{
    NewProcessedVideo, ProcessedVideo, ProcessingStatus, StatusCounts, VideoUpdate,
};
