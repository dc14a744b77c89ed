//! Segment persistence port trait.
//!
//! A dataset is an append-only sequence of segments. Each segment carries a
//! JSON data map keyed by unix-second timestamps; at most one segment per
//! dataset is open for writing at a time, and a segment never changes again
//! once the store has rolled over past it.

use crate::domain::error::ArbotError;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Segment payload: map of unix-second keys to record objects.
pub type SegmentData = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMeta {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SegmentRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub collected_at: DateTime<Utc>,
    pub data: SegmentData,
    pub metadata: Map<String, Value>,
}

pub trait SegmentStorePort {
    /// Insert an empty segment and return its id.
    fn create_segment(&self, dataset: &str, created_at: DateTime<Utc>)
    -> Result<i64, ArbotError>;

    /// Replace the data blob of an existing segment.
    fn save_segment_data(
        &self,
        dataset: &str,
        id: i64,
        data: &SegmentData,
    ) -> Result<(), ArbotError>;

    fn latest_segment(&self, dataset: &str) -> Result<Option<SegmentRow>, ArbotError>;

    /// Most recent `limit` segments, newest first.
    fn recent_segments(&self, dataset: &str, limit: usize)
    -> Result<Vec<SegmentRow>, ArbotError>;

    /// Segments created at or after `since`, oldest first. Includes the
    /// segment immediately preceding `since` when one exists, because its
    /// rows extend forward past its creation time.
    fn segments_since(
        &self,
        dataset: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<SegmentRow>, ArbotError>;

    /// Metadata for every segment of a dataset, oldest first.
    fn list_segments(&self, dataset: &str) -> Result<Vec<SegmentMeta>, ArbotError>;

    fn load_segments(&self, dataset: &str, ids: &[i64]) -> Result<Vec<SegmentRow>, ArbotError>;

    fn list_datasets(&self) -> Result<Vec<String>, ArbotError>;
}
