//! CSV dataset import adapter.
//!
//! Parses recorded datasets so they can be written through a
//! [`TimeSeriesStore`](crate::domain::store::TimeSeriesStore) and replayed.
//! Trade files carry `timestamp,id,created_at,price,volume`; order-book
//! files carry `timestamp,bid,ask,bid_volume,bid_weight,ask_volume,
//! ask_weight`. Timestamps are unix seconds; a header row is expected.

use crate::domain::error::ArbotError;
use crate::domain::record::{OrderBookSnapshot, PricePoint};
use chrono::{DateTime, TimeZone, Utc};
use csv::StringRecord;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub fn read_price_points<P: AsRef<Path>>(path: P) -> Result<Vec<PricePoint>, ArbotError> {
    let content = fs::read_to_string(&path)?;
    let mut reader = csv::Reader::from_reader(content.as_bytes());

    let mut points = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ArbotError::Serialization {
            reason: format!("CSV parse error: {e}"),
        })?;
        points.push(PricePoint {
            timestamp: parse_field(&record, 0, "timestamp")?,
            id: parse_field(&record, 1, "id")?,
            created_at: parse_timestamp(&record, 2, "created_at")?,
            price: parse_field(&record, 3, "price")?,
            volume: parse_field(&record, 4, "volume")?,
        });
    }
    Ok(points)
}

pub fn read_book_snapshots<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<OrderBookSnapshot>, ArbotError> {
    let content = fs::read_to_string(&path)?;
    let mut reader = csv::Reader::from_reader(content.as_bytes());

    let mut snapshots = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ArbotError::Serialization {
            reason: format!("CSV parse error: {e}"),
        })?;
        snapshots.push(OrderBookSnapshot {
            timestamp: parse_field(&record, 0, "timestamp")?,
            bid: parse_field(&record, 1, "bid")?,
            ask: parse_field(&record, 2, "ask")?,
            bid_volume: parse_field(&record, 3, "bid_volume")?,
            bid_weight: parse_field(&record, 4, "bid_weight")?,
            ask_volume: parse_field(&record, 5, "ask_volume")?,
            ask_weight: parse_field(&record, 6, "ask_weight")?,
        });
    }
    Ok(snapshots)
}

fn parse_field<T: FromStr>(
    record: &StringRecord,
    index: usize,
    name: &str,
) -> Result<T, ArbotError> {
    record
        .get(index)
        .ok_or_else(|| ArbotError::Serialization {
            reason: format!("missing {name} column"),
        })?
        .trim()
        .parse::<T>()
        .map_err(|_| ArbotError::Serialization {
            reason: format!("invalid {name} value"),
        })
}

fn parse_timestamp(
    record: &StringRecord,
    index: usize,
    name: &str,
) -> Result<DateTime<Utc>, ArbotError> {
    let secs: i64 = parse_field(record, index, name)?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ArbotError::Serialization {
            reason: format!("invalid {name} value"),
        })
}
