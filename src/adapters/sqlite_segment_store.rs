//! SQLite segment store adapter.
//!
//! Segments live in one `segments` table keyed by dataset name; the data
//! blob is stored as JSON text. Timestamps are unix seconds.

use crate::domain::error::ArbotError;
use crate::ports::config_port::ConfigPort;
use crate::ports::segment_port::{SegmentData, SegmentMeta, SegmentRow, SegmentStorePort};
use chrono::{DateTime, TimeZone, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Row, params};
use serde_json::Map;

pub struct SqliteSegmentStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteSegmentStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ArbotError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| ArbotError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| ArbotError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, ArbotError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| ArbotError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), ArbotError> {
        let conn = self.connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS segments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                dataset TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                collected_at INTEGER NOT NULL,
                data TEXT NOT NULL,
                metadata TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_segments_dataset ON segments(dataset, id);",
        )
        .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    fn connection(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, ArbotError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| ArbotError::Database {
                reason: e.to_string(),
            })
    }
}

fn row_to_segment(row: &Row<'_>) -> rusqlite::Result<SegmentRow> {
    let created_secs: i64 = row.get(1)?;
    let collected_secs: i64 = row.get(2)?;
    let data_text: String = row.get(3)?;
    let metadata_text: String = row.get(4)?;

    let parse_map = |text: &str, column: usize| {
        serde_json::from_str::<Map<String, serde_json::Value>>(text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    };

    Ok(SegmentRow {
        id: row.get(0)?,
        created_at: timestamp(created_secs),
        collected_at: timestamp(collected_secs),
        data: parse_map(&data_text, 3)?,
        metadata: parse_map(&metadata_text, 4)?,
    })
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

const SEGMENT_COLUMNS: &str = "id, created_at, collected_at, data, metadata";

impl SegmentStorePort for SqliteSegmentStore {
    fn create_segment(&self, dataset: &str, created_at: DateTime<Utc>) -> Result<i64, ArbotError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO segments (dataset, created_at, collected_at, data, metadata)
             VALUES (?1, ?2, ?3, '{}', '{}')",
            params![dataset, created_at.timestamp(), created_at.timestamp()],
        )
        .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
            reason: e.to_string(),
        })?;

        Ok(conn.last_insert_rowid())
    }

    fn save_segment_data(
        &self,
        dataset: &str,
        id: i64,
        data: &SegmentData,
    ) -> Result<(), ArbotError> {
        let text = serde_json::to_string(data)?;
        let conn = self.connection()?;
        let updated = conn
            .execute(
                "UPDATE segments SET data = ?1 WHERE dataset = ?2 AND id = ?3",
                params![text, dataset, id],
            )
            .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        if updated == 0 {
            return Err(ArbotError::DatabaseQuery {
                reason: format!("no segment {id} in dataset {dataset}"),
            });
        }
        Ok(())
    }

    fn latest_segment(&self, dataset: &str) -> Result<Option<SegmentRow>, ArbotError> {
        let conn = self.connection()?;
        let query = format!(
            "SELECT {SEGMENT_COLUMNS} FROM segments
             WHERE dataset = ?1 ORDER BY id DESC LIMIT 1"
        );
        let mut stmt = conn
            .prepare(&query)
            .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut rows = stmt
            .query_map(params![dataset], row_to_segment)
            .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        match rows.next() {
            Some(row) => row
                .map(Some)
                .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn recent_segments(&self, dataset: &str, limit: usize) -> Result<Vec<SegmentRow>, ArbotError> {
        let conn = self.connection()?;
        let query = format!(
            "SELECT {SEGMENT_COLUMNS} FROM segments
             WHERE dataset = ?1 ORDER BY id DESC LIMIT ?2"
        );
        collect_segments(&conn, &query, params![dataset, limit as i64])
    }

    fn segments_since(
        &self,
        dataset: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SegmentRow>, ArbotError> {
        let conn = self.connection()?;
        let query = format!(
            "SELECT {SEGMENT_COLUMNS} FROM segments
             WHERE dataset = ?1 AND (created_at >= ?2 OR id = (
                 SELECT MAX(id) FROM segments WHERE dataset = ?1 AND created_at < ?2
             ))
             ORDER BY id ASC"
        );
        collect_segments(&conn, &query, params![dataset, since.timestamp()])
    }

    fn list_segments(&self, dataset: &str) -> Result<Vec<SegmentMeta>, ArbotError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, created_at FROM segments WHERE dataset = ?1 ORDER BY id ASC",
            )
            .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map(params![dataset], |row| {
                Ok(SegmentMeta {
                    id: row.get(0)?,
                    created_at: timestamp(row.get(1)?),
                })
            })
            .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut metas = Vec::new();
        for row in rows {
            metas.push(row.map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }
        Ok(metas)
    }

    fn load_segments(&self, dataset: &str, ids: &[i64]) -> Result<Vec<SegmentRow>, ArbotError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.connection()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let query = format!(
            "SELECT {SEGMENT_COLUMNS} FROM segments
             WHERE dataset = ? AND id IN ({placeholders}) ORDER BY id ASC"
        );

        let mut stmt = conn
            .prepare(&query)
            .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?;
        let mut bindings: Vec<&dyn rusqlite::ToSql> = vec![&dataset];
        for id in ids {
            bindings.push(id);
        }

        let rows = stmt
            .query_map(&bindings[..], row_to_segment)
            .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut segments = Vec::new();
        for row in rows {
            segments.push(row.map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }
        Ok(segments)
    }

    fn list_datasets(&self) -> Result<Vec<String>, ArbotError> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT dataset FROM segments ORDER BY dataset")
            .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?;

        let mut datasets = Vec::new();
        for row in rows {
            datasets.push(row.map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })?);
        }
        Ok(datasets)
    }
}

fn collect_segments(
    conn: &rusqlite::Connection,
    query: &str,
    bindings: &[&dyn rusqlite::ToSql],
) -> Result<Vec<SegmentRow>, ArbotError> {
    let mut stmt = conn
        .prepare(query)
        .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
            reason: e.to_string(),
        })?;

    let rows = stmt
        .query_map(bindings, row_to_segment)
        .map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
            reason: e.to_string(),
        })?;

    let mut segments = Vec::new();
    for row in rows {
        segments.push(row.map_err(|e: rusqlite::Error| ArbotError::DatabaseQuery {
            reason: e.to_string(),
        })?);
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        timestamp(secs)
    }

    fn sample_data(key: i64, price: f64) -> SegmentData {
        let mut data = SegmentData::new();
        data.insert(key.to_string(), serde_json::json!({ "price": price }));
        data
    }

    fn store() -> SqliteSegmentStore {
        let store = SqliteSegmentStore::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store
    }

    #[test]
    fn from_config_missing_path() {
        let result = SqliteSegmentStore::from_config(&EmptyConfig);
        match result {
            Err(ArbotError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn create_save_and_load_round_trip() {
        let store = store();
        let id = store.create_segment("src", at(1000)).unwrap();
        store
            .save_segment_data("src", id, &sample_data(1000, 9000.0))
            .unwrap();

        let row = store.latest_segment("src").unwrap().unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.created_at, at(1000));
        assert_eq!(row.data.len(), 1);
        assert!(row.metadata.is_empty());
    }

    #[test]
    fn save_to_unknown_segment_fails() {
        let store = store();
        let result = store.save_segment_data("src", 99, &sample_data(1, 1.0));
        assert!(matches!(result, Err(ArbotError::DatabaseQuery { .. })));
    }

    #[test]
    fn recent_segments_newest_first() {
        let store = store();
        for i in 0..4 {
            store.create_segment("src", at(1000 + i * 100)).unwrap();
        }

        let recent = store.recent_segments("src", 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].id > recent[1].id);
    }

    #[test]
    fn segments_since_includes_preceding() {
        let store = store();
        store.create_segment("src", at(1000)).unwrap();
        store.create_segment("src", at(2000)).unwrap();
        store.create_segment("src", at(3000)).unwrap();

        let rows = store.segments_since("src", at(2500)).unwrap();
        let created: Vec<i64> = rows.iter().map(|r| r.created_at.timestamp()).collect();
        assert_eq!(created, vec![2000, 3000]);
    }

    #[test]
    fn datasets_are_isolated() {
        let store = store();
        store.create_segment("src", at(1000)).unwrap();
        store.create_segment("book", at(2000)).unwrap();

        assert_eq!(store.list_segments("src").unwrap().len(), 1);
        assert_eq!(store.list_segments("book").unwrap().len(), 1);
        assert_eq!(
            store.list_datasets().unwrap(),
            vec!["book".to_string(), "src".to_string()]
        );
    }

    #[test]
    fn load_segments_by_id() {
        let store = store();
        let first = store.create_segment("src", at(1000)).unwrap();
        let second = store.create_segment("src", at(2000)).unwrap();
        let third = store.create_segment("src", at(3000)).unwrap();

        let rows = store.load_segments("src", &[first, third]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, first);
        assert_eq!(rows[1].id, third);
        assert!(rows.iter().all(|r| r.id != second));
    }

    #[test]
    fn load_segments_empty_ids() {
        let store = store();
        assert!(store.load_segments("src", &[]).unwrap().is_empty());
    }
}
