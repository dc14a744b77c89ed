//! PostgreSQL segment store adapter.
//!
//! Mirrors the SQLite adapter with `timestamptz` timestamps and `jsonb`
//! blobs for the segment payload.

use crate::domain::error::ArbotError;
use crate::ports::config_port::ConfigPort;
use crate::ports::segment_port::{SegmentData, SegmentMeta, SegmentRow, SegmentStorePort};
use chrono::{DateTime, Utc};
use postgres::types::ToSql;
use postgres::{Client, NoTls, Row};
use serde_json::{Map, Value};
use std::cell::RefCell;

pub struct PostgresSegmentStore {
    client: RefCell<Client>,
}

const SEGMENT_COLUMNS: &str = "id, created_at, collected_at, data, metadata";

impl PostgresSegmentStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ArbotError> {
        // Try [postgres] connection_string first, fall back to [database] conninfo
        let connection_string = config
            .get_string("postgres", "connection_string")
            .or_else(|| config.get_string("database", "conninfo"))
            .ok_or_else(|| ArbotError::ConfigMissing {
                section: "database".into(),
                key: "conninfo".into(),
            })?;

        let client =
            Client::connect(&connection_string, NoTls).map_err(|e| ArbotError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self {
            client: RefCell::new(client),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), ArbotError> {
        self.client
            .borrow_mut()
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS public.segments (
                    id BIGSERIAL PRIMARY KEY,
                    dataset TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL,
                    collected_at TIMESTAMPTZ NOT NULL,
                    data JSONB NOT NULL DEFAULT '{}'::jsonb,
                    metadata JSONB NOT NULL DEFAULT '{}'::jsonb
                );
                CREATE INDEX IF NOT EXISTS idx_segments_dataset
                    ON public.segments(dataset, id);",
            )
            .map_err(|e| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })
    }

    fn query(
        &self,
        query: &str,
        bindings: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, ArbotError> {
        self.client
            .borrow_mut()
            .query(query, bindings)
            .map_err(|e| ArbotError::DatabaseQuery {
                reason: e.to_string(),
            })
    }
}

fn row_to_segment(row: &Row) -> SegmentRow {
    SegmentRow {
        id: row.get(0),
        created_at: row.get(1),
        collected_at: row.get(2),
        data: value_to_map(row.get(3)),
        metadata: value_to_map(row.get(4)),
    }
}

fn value_to_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

impl SegmentStorePort for PostgresSegmentStore {
    fn create_segment(&self, dataset: &str, created_at: DateTime<Utc>) -> Result<i64, ArbotError> {
        let rows = self.query(
            "INSERT INTO public.segments (dataset, created_at, collected_at)
             VALUES ($1, $2, $2) RETURNING id",
            &[&dataset, &created_at],
        )?;
        rows.first()
            .map(|row| row.get(0))
            .ok_or_else(|| ArbotError::DatabaseQuery {
                reason: "insert returned no id".into(),
            })
    }

    fn save_segment_data(
        &self,
        dataset: &str,
        id: i64,
        data: &SegmentData,
    ) -> Result<(), ArbotError> {
        let payload = Value::Object(data.clone());
        let updated = self
            .client
            .borrow_mut()
            .execute(
                "UPDATE public.segments SET data = $1 WHERE dataset = $2 AND id = $3",
                &[&payload, &dataset, &id],
            )
            .map_err(|e| ArbotError::DatabaseQuery {
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
        let query = format!(
            "SELECT {SEGMENT_COLUMNS} FROM public.segments
             WHERE dataset = $1 ORDER BY id DESC LIMIT 1"
        );
        let rows = self.query(&query, &[&dataset])?;
        Ok(rows.first().map(row_to_segment))
    }

    fn recent_segments(&self, dataset: &str, limit: usize) -> Result<Vec<SegmentRow>, ArbotError> {
        let query = format!(
            "SELECT {SEGMENT_COLUMNS} FROM public.segments
             WHERE dataset = $1 ORDER BY id DESC LIMIT $2"
        );
        let rows = self.query(&query, &[&dataset, &(limit as i64)])?;
        Ok(rows.iter().map(row_to_segment).collect())
    }

    fn segments_since(
        &self,
        dataset: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SegmentRow>, ArbotError> {
        let query = format!(
            "SELECT {SEGMENT_COLUMNS} FROM public.segments
             WHERE dataset = $1 AND (created_at >= $2 OR id = (
                 SELECT MAX(id) FROM public.segments
                 WHERE dataset = $1 AND created_at < $2
             ))
             ORDER BY id ASC"
        );
        let rows = self.query(&query, &[&dataset, &since])?;
        Ok(rows.iter().map(row_to_segment).collect())
    }

    fn list_segments(&self, dataset: &str) -> Result<Vec<SegmentMeta>, ArbotError> {
        let rows = self.query(
            "SELECT id, created_at FROM public.segments
             WHERE dataset = $1 ORDER BY id ASC",
            &[&dataset],
        )?;
        Ok(rows
            .iter()
            .map(|row| SegmentMeta {
                id: row.get(0),
                created_at: row.get(1),
            })
            .collect())
    }

    fn load_segments(&self, dataset: &str, ids: &[i64]) -> Result<Vec<SegmentRow>, ArbotError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let id_list: Vec<i64> = ids.to_vec();
        let query = format!(
            "SELECT {SEGMENT_COLUMNS} FROM public.segments
             WHERE dataset = $1 AND id = ANY($2) ORDER BY id ASC"
        );
        let rows = self.query(&query, &[&dataset, &id_list])?;
        Ok(rows.iter().map(row_to_segment).collect())
    }

    fn list_datasets(&self) -> Result<Vec<String>, ArbotError> {
        let rows = self.query(
            "SELECT DISTINCT dataset FROM public.segments ORDER BY dataset",
            &[],
        )?;
        Ok(rows.iter().map(|row| row.get(0)).collect())
    }
}
