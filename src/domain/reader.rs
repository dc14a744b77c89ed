//! Incremental segment reader: serves "most recent window" queries without
//! re-fetching already-loaded segments.

use crate::domain::error::ArbotError;
use crate::domain::record::SeriesRecord;
use crate::domain::series::SeriesFrame;
use crate::domain::store::decode_data;
use crate::ports::segment_port::SegmentStorePort;
use tracing::debug;

/// The segment index is refreshed at most this often.
pub const INDEX_REFRESH_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq)]
struct IndexEntry {
    id: i64,
    created_at: i64,
    loaded: bool,
}

/// Tracks which segments of one dataset have been merged into the running
/// frame. Time is always supplied by the caller, so replay drives this with
/// the simulated clock.
pub struct IncrementalReader<R: SeriesRecord> {
    dataset: String,
    index: Vec<IndexEntry>,
    last_refresh: Option<i64>,
    frame: SeriesFrame<R>,
}

impl<R: SeriesRecord> IncrementalReader<R> {
    pub fn new(dataset: &str) -> Self {
        IncrementalReader {
            dataset: dataset.to_string(),
            index: Vec::new(),
            last_refresh: None,
            frame: SeriesFrame::new(),
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn frame(&self) -> &SeriesFrame<R> {
        &self.frame
    }

    /// Load whatever segments the window `[start, end]` still needs and
    /// return the accumulated frame. `end = None` means "now"; the open
    /// segment is then always re-fetched because it is still growing.
    /// A window that predates every known segment falls back to loading
    /// the earliest segment, so callers get the earliest available data.
    pub fn read_latest(
        &mut self,
        port: &dyn SegmentStorePort,
        start: i64,
        end: Option<i64>,
        now: i64,
    ) -> Result<&SeriesFrame<R>, ArbotError> {
        self.refresh_index(port, now)?;
        if self.index.is_empty() {
            return Ok(&self.frame);
        }

        let end_ts = end.unwrap_or(now);

        // a segment spans from its creation to the next segment's creation
        let mut intersecting: Vec<usize> = Vec::new();
        for (i, entry) in self.index.iter().enumerate() {
            let span_end = self
                .index
                .get(i + 1)
                .map(|next| next.created_at)
                .unwrap_or(i64::MAX);
            if entry.created_at <= end_ts && span_end >= start {
                intersecting.push(i);
            }
        }

        let mut needed: Vec<i64> = intersecting
            .iter()
            .filter(|&&i| !self.index[i].loaded)
            .map(|&i| self.index[i].id)
            .collect();

        // the segment before the window's first holds look-back seed data
        if let Some(&first) = intersecting.first() {
            if first > 0 {
                let seed = &self.index[first - 1];
                if !seed.loaded && !needed.contains(&seed.id) {
                    needed.push(seed.id);
                }
            }
        }

        // the open segment keeps growing while the window ends at "now"
        if end.is_none() {
            if let Some(open) = self.index.last() {
                if !needed.contains(&open.id) {
                    needed.push(open.id);
                }
            }
        }

        // window predates all segments: serve the earliest available data
        if end_ts < self.index[0].created_at {
            let earliest = &self.index[0];
            if !earliest.loaded && !needed.contains(&earliest.id) {
                needed.push(earliest.id);
            }
        }

        if needed.is_empty() {
            return Ok(&self.frame);
        }

        needed.sort_unstable();
        debug!(dataset = %self.dataset, segments = ?needed, "loading segments");
        let mut rows = port.load_segments(&self.dataset, &needed)?;
        rows.sort_by_key(|row| row.id);
        for row in rows {
            self.frame
                .extend(decode_data::<R>(&self.dataset, &row.data).into_values());
            if let Some(entry) = self.index.iter_mut().find(|e| e.id == row.id) {
                entry.loaded = true;
            }
        }

        Ok(&self.frame)
    }

    fn refresh_index(
        &mut self,
        port: &dyn SegmentStorePort,
        now: i64,
    ) -> Result<(), ArbotError> {
        if let Some(last) = self.last_refresh {
            if now - last < INDEX_REFRESH_SECS {
                return Ok(());
            }
        }

        let metas = port.list_segments(&self.dataset)?;
        let mut index: Vec<IndexEntry> = metas
            .into_iter()
            .map(|meta| {
                let loaded = self
                    .index
                    .iter()
                    .any(|e| e.id == meta.id && e.loaded);
                IndexEntry {
                    id: meta.id,
                    created_at: meta.created_at.timestamp(),
                    loaded,
                }
            })
            .collect();
        index.sort_by_key(|e| (e.created_at, e.id));
        self.index = index;
        self.last_refresh = Some(now);
        Ok(())
    }
}
