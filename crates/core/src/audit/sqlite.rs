use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{AuditError, AuditEvent, AuditFilter, AuditRecord, AuditStore};

/// SQLite-backed audit store
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    /// Opens the database file, creating the table if needed.
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        let conn = Connection::open(path).map_err(|e| AuditError::Database(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// In-memory store (useful for testing)
    pub fn in_memory() -> Result<Self, AuditError> {
        let conn = Connection::open_in_memory().map_err(|e| AuditError::Database(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS audit_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                processed_video_id TEXT,
                campaign_id TEXT,
                data TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_events_timestamp ON audit_events(timestamp);
            CREATE INDEX IF NOT EXISTS idx_audit_events_video ON audit_events(processed_video_id);
            CREATE INDEX IF NOT EXISTS idx_audit_events_campaign ON audit_events(campaign_id);
            CREATE INDEX IF NOT EXISTS idx_audit_events_event_type ON audit_events(event_type);
            "#,
        )
        .map_err(|e| AuditError::Database(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AuditError> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Database("connection mutex poisoned".to_string()))
    }

    fn build_where_clause(filter: &AuditFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref id) = filter.processed_video_id {
            conditions.push("processed_video_id = ?");
            params.push(Box::new(id.clone()));
        }
        if let Some(ref campaign_id) = filter.campaign_id {
            conditions.push("campaign_id = ?");
            params.push(Box::new(campaign_id.clone()));
        }
        if let Some(ref event_type) = filter.event_type {
            conditions.push("event_type = ?");
            params.push(Box::new(event_type.clone()));
        }
        if let Some(ref from) = filter.from {
            conditions.push("timestamp >= ?");
            params.push(Box::new(from.to_rfc3339()));
        }
        if let Some(ref to) = filter.to {
            conditions.push("timestamp <= ?");
            params.push(Box::new(to.to_rfc3339()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (where_clause, params)
    }
}

impl AuditStore for SqliteAuditStore {
    fn insert(&self, record: &AuditRecord) -> Result<i64, AuditError> {
        let conn = self.lock()?;

        let data_json = serde_json::to_string(&record.data)
            .map_err(|e| AuditError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO audit_events (timestamp, event_type, processed_video_id, campaign_id, data) VALUES (?, ?, ?, ?, ?)",
            params![
                record.timestamp.to_rfc3339(),
                record.event_type,
                record.processed_video_id,
                record.campaign_id,
                data_json,
            ],
        )
        .map_err(|e| AuditError::Database(e.to_string()))?;

        Ok(conn.last_insert_rowid())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);

        // id breaks ties between events stamped in the same instant
        let sql = format!(
            "SELECT id, timestamp, event_type, processed_video_id, campaign_id, data FROM audit_events {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, timestamp, event_type, processed_video_id, campaign_id, data_json) =
                row.map_err(|e| AuditError::Database(e.to_string()))?;

            let timestamp: DateTime<Utc> = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| AuditError::Database(format!("Invalid timestamp: {}", e)))?
                .into();
            let data: AuditEvent = serde_json::from_str(&data_json)
                .map_err(|e| AuditError::Serialization(e.to_string()))?;

            records.push(AuditRecord {
                id,
                timestamp,
                event_type,
                processed_video_id,
                campaign_id,
                data,
            });
        }

        Ok(records)
    }

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM audit_events {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| AuditError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(event: AuditEvent, timestamp: DateTime<Utc>) -> AuditRecord {
        AuditRecord {
            id: 0,
            timestamp,
            event_type: event.event_type().to_string(),
            processed_video_id: event.processed_video_id().map(String::from),
            campaign_id: event.campaign_id().map(String::from),
            data: event,
        }
    }

    fn reprocess(id: &str, campaign: &str) -> AuditEvent {
        AuditEvent::ReprocessRequested {
            processed_video_id: id.to_string(),
            campaign_id: campaign.to_string(),
            preset: Some("safe".to_string()),
            revision: 2,
        }
    }

    #[test]
    fn test_insert_and_query() {
        let store = SqliteAuditStore::in_memory().unwrap();
        let id = store
            .insert(&record(reprocess("pv-1", "camp-1"), Utc::now()))
            .unwrap();
        assert!(id > 0);

        let records = store.query(&AuditFilter::new()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_type, "reprocess_requested");
        assert!(matches!(
            records[0].data,
            AuditEvent::ReprocessRequested { revision: 2, .. }
        ));
    }

    #[test]
    fn test_filters() {
        let store = SqliteAuditStore::in_memory().unwrap();
        let now = Utc::now();
        store.insert(&record(reprocess("pv-1", "camp-1"), now)).unwrap();
        store.insert(&record(reprocess("pv-2", "camp-1"), now)).unwrap();
        store.insert(&record(reprocess("pv-3", "camp-2"), now)).unwrap();
        store
            .insert(&record(
                AuditEvent::ServiceStarted {
                    version: "0.1.0".to_string(),
                    config_hash: "h".to_string(),
                },
                now - Duration::hours(2),
            ))
            .unwrap();

        assert_eq!(store.count(&AuditFilter::new()).unwrap(), 4);
        assert_eq!(
            store
                .count(&AuditFilter::new().with_campaign_id("camp-1"))
                .unwrap(),
            2
        );
        let by_video = store
            .query(&AuditFilter::new().with_processed_video_id("pv-3"))
            .unwrap();
        assert_eq!(by_video.len(), 1);
        assert_eq!(by_video[0].campaign_id.as_deref(), Some("camp-2"));
        assert_eq!(
            store
                .count(&AuditFilter::new().with_event_type("service_started"))
                .unwrap(),
            1
        );
        assert_eq!(
            store
                .count(&AuditFilter::new().with_time_range(Some(now - Duration::minutes(1)), None))
                .unwrap(),
            3
        );
    }

    #[test]
    fn test_pagination_newest_first() {
        let store = SqliteAuditStore::in_memory().unwrap();
        let base = Utc::now();
        for i in 0..5 {
            store
                .insert(&record(
                    reprocess(&format!("pv-{}", i), "camp-1"),
                    base + Duration::seconds(i),
                ))
                .unwrap();
        }

        let page = store
            .query(&AuditFilter::new().with_limit(2).with_offset(1))
            .unwrap();
        let ids: Vec<_> = page
            .iter()
            .filter_map(|r| r.processed_video_id.clone())
            .collect();
        assert_eq!(ids, vec!["pv-3", "pv-2"]);
    }
}
