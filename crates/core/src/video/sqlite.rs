//! SQLite-backed processed video store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{ProcessedVideoStore, StoreError, VideoFilter};
use super::types::{NewProcessedVideo, ProcessedVideo, ProcessingStatus, StatusCounts, VideoUpdate};

const COLUMNS: &str = "id, campaign_id, user_id, source_video_id, source_location, \
    source_duration_secs, version_number, preset, settings, target_platform, status, \
    output_location, output_size_bytes, quality_verified, quality_flags, error_message, \
    retry_count, terminal, revision, job_id, created_at, updated_at";

/// SQLite-backed processed video store.
pub struct SqliteVideoStore {
    conn: Mutex<Connection>,
}

impl SqliteVideoStore {
    /// Opens (or creates) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS processed_videos (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                source_video_id TEXT NOT NULL,
                source_location TEXT NOT NULL,
                source_duration_secs REAL,
                version_number INTEGER NOT NULL,
                preset TEXT,
                settings TEXT NOT NULL,
                target_platform TEXT NOT NULL,
                status TEXT NOT NULL,
                output_location TEXT,
                output_size_bytes INTEGER,
                quality_verified INTEGER NOT NULL DEFAULT 0,
                quality_flags TEXT NOT NULL DEFAULT '[]',
                error_message TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                terminal INTEGER NOT NULL DEFAULT 0,
                revision INTEGER NOT NULL DEFAULT 0,
                job_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (campaign_id, source_video_id, version_number)
            );

            CREATE INDEX IF NOT EXISTS idx_processed_videos_campaign ON processed_videos(campaign_id);
            CREATE INDEX IF NOT EXISTS idx_processed_videos_source ON processed_videos(source_video_id);
            CREATE INDEX IF NOT EXISTS idx_processed_videos_status ON processed_videos(status);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    fn build_where_clause(filter: &VideoFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref campaign_id) = filter.campaign_id {
            conditions.push("campaign_id = ?");
            params.push(Box::new(campaign_id.clone()));
        }
        if let Some(ref source_video_id) = filter.source_video_id {
            conditions.push("source_video_id = ?");
            params.push(Box::new(source_video_id.clone()));
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }
        if filter.flagged_only {
            conditions.push("status = 'completed' AND json_array_length(quality_flags) > 0");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (where_clause, params)
    }

    fn row_to_video(row: &rusqlite::Row) -> rusqlite::Result<ProcessedVideo> {
        Ok(ProcessedVideo {
            id: row.get(0)?,
            campaign_id: row.get(1)?,
            user_id: row.get(2)?,
            source_video_id: row.get(3)?,
            source_location: row.get(4)?,
            source_duration_secs: row.get(5)?,
            version_number: row.get(6)?,
            preset: row.get(7)?,
            settings: json_column(row, 8)?,
            target_platform: parse_column(row, 9)?,
            status: parse_column(row, 10)?,
            output_location: row.get(11)?,
            output_size_bytes: row.get::<_, Option<i64>>(12)?.map(|n| n as u64),
            quality_verified: row.get(13)?,
            quality_flags: json_column(row, 14)?,
            error_message: row.get(15)?,
            retry_count: row.get(16)?,
            terminal: row.get(17)?,
            revision: row.get(18)?,
            job_id: row.get(19)?,
            created_at: time_column(row, 20)?,
            updated_at: time_column(row, 21)?,
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<ProcessedVideo>, StoreError> {
        let sql = format!("SELECT {} FROM processed_videos WHERE id = ?", COLUMNS);
        Ok(conn
            .query_row(&sql, params![id], Self::row_to_video)
            .optional()?)
    }

    fn apply_update(
        &self,
        id: &str,
        expected_revision: Option<u32>,
        update: VideoUpdate,
    ) -> Result<ProcessedVideo, StoreError> {
        let conn = self.lock()?;
        let mut video = Self::fetch(&conn, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(expected) = expected_revision {
            if video.revision != expected {
                return Err(StoreError::RevisionMismatch {
                    id: id.to_string(),
                    expected,
                    current: video.revision,
                });
            }
        }

        if !update.is_allowed_from(video.status) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from: video.status,
                to: update.target_status(),
            });
        }

        update.apply(&mut video, Utc::now());

        conn.execute(
            "UPDATE processed_videos SET preset = ?, settings = ?, status = ?, output_location = ?, \
             output_size_bytes = ?, quality_verified = ?, quality_flags = ?, error_message = ?, \
             retry_count = ?, terminal = ?, revision = ?, updated_at = ? WHERE id = ?",
            params![
                video.preset,
                to_json(&video.settings)?,
                video.status.as_str(),
                video.output_location,
                video.output_size_bytes.map(|n| n as i64),
                video.quality_verified,
                to_json(&video.quality_flags)?,
                video.error_message,
                video.retry_count,
                video.terminal,
                video.revision,
                video.updated_at.to_rfc3339(),
                id,
            ],
        )?;

        Ok(video)
    }
}

fn conversion_error(index: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &rusqlite::Row, index: usize) -> rusqlite::Result<T> {
    let text: String = row.get(index)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(index, e))
}

fn parse_column<T>(row: &rusqlite::Row, index: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let text: String = row.get(index)?;
    text.parse()
        .map_err(|e: String| conversion_error(index, std::io::Error::other(e)))
}

fn time_column(row: &rusqlite::Row, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(index, e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Database(e.to_string()))
}

impl ProcessedVideoStore for SqliteVideoStore {
    fn create(&self, video: NewProcessedVideo) -> Result<ProcessedVideo, StoreError> {
        let conn = self.lock()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO processed_videos (id, campaign_id, user_id, source_video_id, source_location, \
             source_duration_secs, version_number, preset, settings, target_platform, status, \
             quality_flags, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, '[]', ?, ?)",
            params![
                id,
                video.campaign_id,
                video.user_id,
                video.source_video_id,
                video.source_location,
                video.source_duration_secs,
                video.version_number,
                video.preset,
                to_json(&video.settings)?,
                video.target_platform.as_str(),
                ProcessingStatus::Pending.as_str(),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(ProcessedVideo {
            id,
            campaign_id: video.campaign_id,
            user_id: video.user_id,
            source_video_id: video.source_video_id,
            source_location: video.source_location,
            source_duration_secs: video.source_duration_secs,
            version_number: video.version_number,
            preset: video.preset,
            settings: video.settings,
            target_platform: video.target_platform,
            status: ProcessingStatus::Pending,
            output_location: None,
            output_size_bytes: None,
            quality_verified: false,
            quality_flags: Vec::new(),
            error_message: None,
            retry_count: 0,
            terminal: false,
            revision: 0,
            job_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<ProcessedVideo>, StoreError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &VideoFilter) -> Result<Vec<ProcessedVideo>, StoreError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM processed_videos {} ORDER BY source_video_id ASC, version_number ASC, created_at ASC LIMIT ? OFFSET ?",
            COLUMNS, where_clause
        );

        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_video)?;
        let videos = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(videos)
    }

    fn count(&self, filter: &VideoFilter) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM processed_videos {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        Ok(conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?)
    }

    fn status_counts(&self, campaign_id: &str) -> Result<StatusCounts, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM processed_videos WHERE campaign_id = ? GROUP BY status",
        )?;
        let rows = stmt.query_map(params![campaign_id], |row| {
            Ok((parse_column::<ProcessingStatus>(row, 0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let (status, n) = row?;
            counts.add(status, n as u64);
        }
        Ok(counts)
    }

    fn update(&self, id: &str, update: VideoUpdate) -> Result<ProcessedVideo, StoreError> {
        self.apply_update(id, None, update)
    }

    fn update_at_revision(
        &self,
        id: &str,
        revision: u32,
        update: VideoUpdate,
    ) -> Result<ProcessedVideo, StoreError> {
        self.apply_update(id, Some(revision), update)
    }

    fn set_job_id(&self, id: &str, job_id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE processed_videos SET job_id = ?, updated_at = ? WHERE id = ?",
            params![job_id, Utc::now().to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}
