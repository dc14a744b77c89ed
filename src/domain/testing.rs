//! Shared fixtures for unit tests.

use crate::domain::error::ArbotError;
use crate::domain::record::PricePoint;
use crate::ports::segment_port::{SegmentData, SegmentMeta, SegmentRow, SegmentStorePort};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Map;
use std::cell::RefCell;

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn tick(timestamp: i64, price: f64, volume: f64) -> PricePoint {
    PricePoint {
        timestamp,
        id: timestamp,
        created_at: at(timestamp),
        price,
        volume,
    }
}

/// In-memory segment backend with scriptable save failures. Segments are
/// shared across datasets by name.
pub struct MemoryPort {
    segments: RefCell<Vec<(String, SegmentRow)>>,
    next_id: RefCell<i64>,
    pub fail_saves: RefCell<bool>,
    pub save_calls: RefCell<usize>,
}

impl MemoryPort {
    pub fn new() -> Self {
        MemoryPort {
            segments: RefCell::new(Vec::new()),
            next_id: RefCell::new(1),
            fail_saves: RefCell::new(false),
            save_calls: RefCell::new(0),
        }
    }

    pub fn segment_data(&self, id: i64) -> SegmentData {
        self.segments
            .borrow()
            .iter()
            .find(|(_, s)| s.id == id)
            .map(|(_, s)| s.data.clone())
            .unwrap_or_default()
    }
}

impl SegmentStorePort for MemoryPort {
    fn create_segment(&self, dataset: &str, created_at: DateTime<Utc>) -> Result<i64, ArbotError> {
        let mut next = self.next_id.borrow_mut();
        let id = *next;
        *next += 1;
        self.segments.borrow_mut().push((
            dataset.to_string(),
            SegmentRow {
                id,
                created_at,
                collected_at: created_at,
                data: Map::new(),
                metadata: Map::new(),
            },
        ));
        Ok(id)
    }

    fn save_segment_data(
        &self,
        dataset: &str,
        id: i64,
        data: &SegmentData,
    ) -> Result<(), ArbotError> {
        *self.save_calls.borrow_mut() += 1;
        if *self.fail_saves.borrow() {
            return Err(ArbotError::Database {
                reason: "save failed".into(),
            });
        }
        let mut segments = self.segments.borrow_mut();
        let segment = segments
            .iter_mut()
            .find(|(name, s)| name == dataset && s.id == id)
            .map(|(_, s)| s)
            .ok_or_else(|| ArbotError::DatabaseQuery {
                reason: format!("no segment {id} in {dataset}"),
            })?;
        segment.data = data.clone();
        Ok(())
    }

    fn latest_segment(&self, dataset: &str) -> Result<Option<SegmentRow>, ArbotError> {
        Ok(self
            .segments
            .borrow()
            .iter()
            .filter(|(name, _)| name == dataset)
            .next_back()
            .map(|(_, s)| s.clone()))
    }

    fn recent_segments(&self, dataset: &str, limit: usize) -> Result<Vec<SegmentRow>, ArbotError> {
        Ok(self
            .segments
            .borrow()
            .iter()
            .filter(|(name, _)| name == dataset)
            .rev()
            .take(limit)
            .map(|(_, s)| s.clone())
            .collect())
    }

    fn segments_since(
        &self,
        dataset: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SegmentRow>, ArbotError> {
        let segments = self.segments.borrow();
        let preceding = segments
            .iter()
            .filter(|(name, s)| name == dataset && s.created_at < since)
            .next_back()
            .map(|(_, s)| s.id);
        Ok(segments
            .iter()
            .filter(|(name, s)| {
                name == dataset && (s.created_at >= since || Some(s.id) == preceding)
            })
            .map(|(_, s)| s.clone())
            .collect())
    }

    fn list_segments(&self, dataset: &str) -> Result<Vec<SegmentMeta>, ArbotError> {
        Ok(self
            .segments
            .borrow()
            .iter()
            .filter(|(name, _)| name == dataset)
            .map(|(_, s)| SegmentMeta {
                id: s.id,
                created_at: s.created_at,
            })
            .collect())
    }

    fn load_segments(&self, dataset: &str, ids: &[i64]) -> Result<Vec<SegmentRow>, ArbotError> {
        Ok(self
            .segments
            .borrow()
            .iter()
            .filter(|(name, s)| name == dataset && ids.contains(&s.id))
            .map(|(_, s)| s.clone())
            .collect())
    }

    fn list_datasets(&self) -> Result<Vec<String>, ArbotError> {
        let mut names: Vec<String> = self
            .segments
            .borrow()
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}
