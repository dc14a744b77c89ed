//! Batched time-series persistence with write-behind caching and segment
//! rollover.

use crate::domain::error::ArbotError;
use crate::domain::record::{SeriesRecord, aggregate_rows};
use crate::domain::series::SeriesFrame;
use crate::ports::config_port::ConfigPort;
use crate::ports::segment_port::{SegmentData, SegmentRow, SegmentStorePort};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Seconds between flushes; zero or negative flushes on every write.
    pub flush_interval_secs: i64,
    /// Serialized cache size that closes the open segment.
    pub rollover_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            flush_interval_secs: 60,
            rollover_bytes: 65_536,
        }
    }
}

impl StoreConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = StoreConfig::default();
        StoreConfig {
            flush_interval_secs: config.get_int(
                "store",
                "flush_interval_secs",
                defaults.flush_interval_secs,
            ),
            rollover_bytes: config.get_int("store", "rollover_bytes", defaults.rollover_bytes as i64)
                as usize,
        }
    }
}

/// Append-friendly store for one dataset schema. Writes land in the open
/// segment's in-memory cache and are flushed in batches; once the
/// serialized cache outgrows the rollover threshold the segment is closed
/// and a fresh one becomes the write target.
pub struct TimeSeriesStore<'a, R: SeriesRecord> {
    port: &'a dyn SegmentStorePort,
    dataset: String,
    config: StoreConfig,
    cache: BTreeMap<i64, R>,
    segment_id: i64,
    segment_opened: DateTime<Utc>,
    last_flush: Option<DateTime<Utc>>,
}

impl<'a, R: SeriesRecord> TimeSeriesStore<'a, R> {
    /// Recover the latest segment of the dataset, or create the first one.
    pub fn open(
        port: &'a dyn SegmentStorePort,
        dataset: &str,
        config: StoreConfig,
        now: DateTime<Utc>,
    ) -> Result<Self, ArbotError> {
        let (segment_id, segment_opened, cache) = match port.latest_segment(dataset)? {
            Some(row) => {
                let cache = decode_data::<R>(dataset, &row.data);
                (row.id, row.created_at, cache)
            }
            None => {
                let id = port.create_segment(dataset, now)?;
                (id, now, BTreeMap::new())
            }
        };

        Ok(TimeSeriesStore {
            port,
            dataset: dataset.to_string(),
            config,
            cache,
            segment_id,
            segment_opened,
            last_flush: Some(now),
        })
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn segment_id(&self) -> i64 {
        self.segment_id
    }

    pub fn cached_rows(&self) -> usize {
        self.cache.len()
    }

    /// Aggregate incoming records by timestamp, merge them into the open
    /// segment's cache, and flush when due. Rows older than the open
    /// segment belong to an already-closed one and are dropped. Never
    /// fails: persistence errors are logged and retried on the next flush.
    pub fn write(&mut self, records: &[R], now: DateTime<Utc>) {
        if records.is_empty() {
            return;
        }

        let open_ts = self.segment_opened.timestamp();
        let mut groups: BTreeMap<i64, Vec<R>> = BTreeMap::new();
        for record in records {
            if record.timestamp() < open_ts {
                continue;
            }
            groups
                .entry(record.timestamp())
                .or_default()
                .push(record.clone());
        }
        for (ts, group) in groups {
            self.cache.insert(ts, aggregate_rows(ts, &group));
        }

        if self.flush_due(now) {
            self.flush(now);
        }
    }

    fn flush_due(&self, now: DateTime<Utc>) -> bool {
        if self.config.flush_interval_secs <= 0 {
            return true;
        }
        match self.last_flush {
            None => true,
            Some(at) => now - at > Duration::seconds(self.config.flush_interval_secs),
        }
    }

    /// Persist the cache into the open segment. On success the rollover
    /// threshold is checked; on failure the cache and flush clock stay
    /// untouched so the same data is retried.
    pub fn flush(&mut self, now: DateTime<Utc>) {
        let data = match encode_data(&self.cache) {
            Ok(data) => data,
            Err(err) => {
                warn!(dataset = %self.dataset, error = %err, "cache serialization failed");
                return;
            }
        };

        match self
            .port
            .save_segment_data(&self.dataset, self.segment_id, &data)
        {
            Ok(()) => {
                self.last_flush = Some(now);
                let size = serialized_size(&data);
                debug!(
                    dataset = %self.dataset,
                    segment = self.segment_id,
                    rows = self.cache.len(),
                    bytes = size,
                    "segment flushed"
                );
                if size > self.config.rollover_bytes {
                    self.roll_over(now);
                }
            }
            Err(err) => {
                warn!(
                    dataset = %self.dataset,
                    segment = self.segment_id,
                    error = %err,
                    "segment flush failed; cache retained"
                );
            }
        }
    }

    fn roll_over(&mut self, now: DateTime<Utc>) {
        match self.port.create_segment(&self.dataset, now) {
            Ok(id) => {
                info!(
                    dataset = %self.dataset,
                    closed = self.segment_id,
                    opened = id,
                    "segment rollover"
                );
                self.segment_id = id;
                self.segment_opened = now;
                self.cache.clear();
            }
            Err(err) => {
                warn!(
                    dataset = %self.dataset,
                    error = %err,
                    "rollover failed; continuing on current segment"
                );
            }
        }
    }

    /// Merge the most recent `trunks` segments into one time-ordered,
    /// deduplicated series. Newer segments win on timestamp collisions.
    pub fn read_latest_trunks(&self, trunks: usize) -> Result<SeriesFrame<R>, ArbotError> {
        let mut rows = self.port.recent_segments(&self.dataset, trunks)?;
        rows.sort_by_key(|row| row.id);
        Ok(merge_segments(&self.dataset, &rows))
    }

    /// Merge every segment holding data from `since` onward.
    pub fn read_latest_since(&self, since: DateTime<Utc>) -> Result<SeriesFrame<R>, ArbotError> {
        let rows = self.port.segments_since(&self.dataset, since)?;
        Ok(merge_segments(&self.dataset, &rows))
    }
}

/// Decode a segment data map, skipping malformed keys or rows.
pub(crate) fn decode_data<R: SeriesRecord>(dataset: &str, data: &SegmentData) -> BTreeMap<i64, R> {
    let mut rows = BTreeMap::new();
    for (key, value) in data {
        let Ok(ts) = key.parse::<i64>() else {
            warn!(dataset, key = %key, "skipping row with malformed timestamp key");
            continue;
        };
        match serde_json::from_value::<R>(value.clone()) {
            Ok(record) => {
                rows.insert(ts, record);
            }
            Err(err) => {
                warn!(dataset, key = %key, error = %err, "skipping malformed row");
            }
        }
    }
    rows
}

pub(crate) fn encode_data<R: SeriesRecord>(
    cache: &BTreeMap<i64, R>,
) -> Result<SegmentData, ArbotError> {
    let mut data = SegmentData::new();
    for (ts, record) in cache {
        data.insert(ts.to_string(), serde_json::to_value(record)?);
    }
    Ok(data)
}

fn merge_segments<R: SeriesRecord>(dataset: &str, rows: &[SegmentRow]) -> SeriesFrame<R> {
    let mut frame = SeriesFrame::new();
    for row in rows {
        frame.extend(decode_data::<R>(dataset, &row.data).into_values());
    }
    frame
}

fn serialized_size(data: &SegmentData) -> usize {
    serde_json::to_vec(data).map(|bytes| bytes.len()).unwrap_or(0)
}
