//! In-memory time series frame and windowed aggregation math.

use crate::domain::record::SeriesRecord;
use std::collections::BTreeMap;

/// Ordered, timestamp-deduplicated series of records. The in-memory unit
/// exchanged by the reader, the signal engine, and the simulator.
#[derive(Debug, Clone, Default)]
pub struct SeriesFrame<R> {
    rows: BTreeMap<i64, R>,
}

impl<R> SeriesFrame<R> {
    pub fn new() -> Self {
        SeriesFrame {
            rows: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.rows.keys().next().copied()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.rows.keys().next_back().copied()
    }

    pub fn latest(&self) -> Option<&R> {
        self.rows.values().next_back()
    }

    pub fn get(&self, timestamp: i64) -> Option<&R> {
        self.rows.get(&timestamp)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &R)> {
        self.rows.iter().map(|(&ts, r)| (ts, r))
    }

    /// True when any row lies at or after `timestamp`.
    pub fn has_rows_from(&self, timestamp: i64) -> bool {
        self.rows.range(timestamp..).next().is_some()
    }

    /// Drop rows older than `timestamp` (cutoff retention).
    pub fn retain_from(&mut self, timestamp: i64) {
        self.rows = self.rows.split_off(&timestamp);
    }

    pub fn project<F>(&self, f: F) -> Vec<(i64, f64)>
    where
        F: Fn(&R) -> f64,
    {
        self.rows.iter().map(|(&ts, r)| (ts, f(r))).collect()
    }
}

impl<R: Clone> SeriesFrame<R> {
    /// Half-open window `[start, end)` as a new frame.
    pub fn slice(&self, start: i64, end: i64) -> SeriesFrame<R> {
        SeriesFrame {
            rows: self
                .rows
                .range(start..end)
                .map(|(&ts, r)| (ts, r.clone()))
                .collect(),
        }
    }
}

impl<R: SeriesRecord> SeriesFrame<R> {
    pub fn from_rows<I: IntoIterator<Item = R>>(rows: I) -> Self {
        let mut frame = SeriesFrame::new();
        frame.extend(rows);
        frame
    }

    /// Insert a row, replacing any existing row at the same timestamp.
    pub fn insert(&mut self, row: R) {
        self.rows.insert(row.timestamp(), row);
    }

    pub fn extend<I: IntoIterator<Item = R>>(&mut self, rows: I) {
        for row in rows {
            self.insert(row);
        }
    }

    /// Merge another frame in; rows from `other` win on collisions.
    pub fn merge(&mut self, other: SeriesFrame<R>) {
        for (ts, row) in other.rows {
            self.rows.insert(ts, row);
        }
    }
}

/// Resample onto a fixed `step`-second grid by within-bucket averaging;
/// interior empty buckets are filled by linear interpolation. Input must be
/// sorted by timestamp (frames always are).
pub fn resample_mean(points: &[(i64, f64)], step: i64) -> Vec<(i64, f64)> {
    if points.is_empty() || step <= 0 {
        return Vec::new();
    }
    let bucket_of = |ts: i64| ts.div_euclid(step) * step;
    let first = bucket_of(points[0].0);
    let last = bucket_of(points[points.len() - 1].0);
    let buckets = ((last - first) / step + 1) as usize;

    let mut sums = vec![0.0; buckets];
    let mut counts = vec![0usize; buckets];
    for &(ts, value) in points {
        let idx = ((bucket_of(ts) - first) / step) as usize;
        sums[idx] += value;
        counts[idx] += 1;
    }

    let mut out: Vec<(i64, f64)> = Vec::with_capacity(buckets);
    let mut gap_start: Option<usize> = None;
    for idx in 0..buckets {
        let ts = first + idx as i64 * step;
        if counts[idx] == 0 {
            gap_start.get_or_insert(idx);
            out.push((ts, f64::NAN));
            continue;
        }
        let mean = sums[idx] / counts[idx] as f64;
        if let Some(gap) = gap_start.take() {
            // first and last bucket always hold data, so a gap is interior
            let left = out[gap - 1].1;
            let span = (idx - gap + 1) as f64;
            for (offset, slot) in out[gap..idx].iter_mut().enumerate() {
                slot.1 = left + (mean - left) * (offset + 1) as f64 / span;
            }
        }
        out.push((ts, mean));
    }
    out
}

/// Trailing mean over the time window `(t - window, t]` at each point.
/// Partial windows are allowed, so the first point is its own mean.
pub fn rolling_mean_time(points: &[(i64, f64)], window: i64) -> Vec<(i64, f64)> {
    rolling_time(points, window, |sum, n| sum / n as f64)
}

/// Trailing sum over the time window `(t - window, t]` at each point.
pub fn rolling_sum_time(points: &[(i64, f64)], window: i64) -> Vec<(i64, f64)> {
    rolling_time(points, window, |sum, _| sum)
}

fn rolling_time<F>(points: &[(i64, f64)], window: i64, fold: F) -> Vec<(i64, f64)>
where
    F: Fn(f64, usize) -> f64,
{
    let mut out = Vec::with_capacity(points.len());
    let mut tail = 0usize;
    let mut sum = 0.0;
    let mut count = 0usize;
    for &(ts, value) in points {
        sum += value;
        count += 1;
        while points[tail].0 <= ts - window {
            sum -= points[tail].1;
            count -= 1;
            tail += 1;
        }
        out.push((ts, fold(sum, count)));
    }
    out
}
