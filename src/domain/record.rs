//! Time-series record types and per-field aggregation policy.

use crate::ports::exchange_port::OrderBookDepth;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// How colliding values for one field are folded into a single row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    Mean,
    Sum,
    First,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Time(DateTime<Utc>),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Time(_) => None,
        }
    }
}

/// A record belonging to one dataset schema. The schema names each non-key
/// field together with its collision policy; the store aggregates through
/// this interface instead of matching on column names.
pub trait SeriesRecord: Clone + Serialize + DeserializeOwned {
    fn schema() -> &'static [(&'static str, FieldPolicy)];
    fn timestamp(&self) -> i64;
    fn field(&self, name: &str) -> FieldValue;
    fn with_fields(timestamp: i64, fields: &[(&'static str, FieldValue)]) -> Self;
}

/// Fold rows sharing one timestamp into a single record, applying each
/// field's policy. A `Mean` field that cannot be averaged (non-numeric)
/// falls back to the first value.
pub fn aggregate_rows<R: SeriesRecord>(timestamp: i64, rows: &[R]) -> R {
    debug_assert!(!rows.is_empty());
    let fields: Vec<(&'static str, FieldValue)> = R::schema()
        .iter()
        .map(|&(name, policy)| {
            let value = match policy {
                FieldPolicy::First => rows[0].field(name),
                FieldPolicy::Sum => FieldValue::Float(
                    rows.iter()
                        .filter_map(|r| r.field(name).as_f64())
                        .sum::<f64>(),
                ),
                FieldPolicy::Mean => {
                    let numeric: Vec<f64> =
                        rows.iter().filter_map(|r| r.field(name).as_f64()).collect();
                    if numeric.is_empty() {
                        rows[0].field(name)
                    } else {
                        FieldValue::Float(numeric.iter().sum::<f64>() / numeric.len() as f64)
                    }
                }
            };
            (name, value)
        })
        .collect();
    R::with_fields(timestamp, &fields)
}

/// One reference-market trade tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
}

impl SeriesRecord for PricePoint {
    fn schema() -> &'static [(&'static str, FieldPolicy)] {
        &[
            ("id", FieldPolicy::First),
            ("created_at", FieldPolicy::First),
            ("price", FieldPolicy::Mean),
            ("volume", FieldPolicy::Sum),
        ]
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn field(&self, name: &str) -> FieldValue {
        match name {
            "id" => FieldValue::Int(self.id),
            "created_at" => FieldValue::Time(self.created_at),
            "price" => FieldValue::Float(self.price),
            "volume" => FieldValue::Float(self.volume),
            _ => FieldValue::Float(0.0),
        }
    }

    fn with_fields(timestamp: i64, fields: &[(&'static str, FieldValue)]) -> Self {
        let mut record = PricePoint {
            timestamp,
            id: 0,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            price: 0.0,
            volume: 0.0,
        };
        for (name, value) in fields {
            match (*name, value) {
                ("id", FieldValue::Int(v)) => record.id = *v,
                ("created_at", FieldValue::Time(t)) => record.created_at = *t,
                ("price", FieldValue::Float(v)) => record.price = *v,
                ("volume", FieldValue::Float(v)) => record.volume = *v,
                _ => {}
            }
        }
        record
    }
}

/// Best bid/ask plus depth-weighted volume at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub timestamp: i64,
    pub bid: f64,
    pub ask: f64,
    pub bid_volume: f64,
    pub bid_weight: f64,
    pub ask_volume: f64,
    pub ask_weight: f64,
}

impl OrderBookSnapshot {
    /// Condense raw exchange depth into a snapshot. Returns `None` for an
    /// empty or one-sided book.
    pub fn from_depth(depth: &OrderBookDepth, now: i64) -> Option<Self> {
        if depth.asks.is_empty() || depth.bids.is_empty() {
            return None;
        }

        let ask = depth
            .asks
            .iter()
            .map(|l| l.price)
            .fold(f64::INFINITY, f64::min);
        let bid = depth
            .bids
            .iter()
            .map(|l| l.price)
            .fold(f64::NEG_INFINITY, f64::max);
        if !ask.is_finite() || !bid.is_finite() {
            return None;
        }

        let mut ask_volume = 0.0;
        let mut ask_weight = 0.0;
        for level in &depth.asks {
            ask_volume += level.remaining_volume;
            ask_weight += level.remaining_volume * (ask - level.price);
        }

        let mut bid_volume = 0.0;
        let mut bid_weight = 0.0;
        for level in &depth.bids {
            bid_volume += level.remaining_volume;
            bid_weight += level.remaining_volume * (level.price - bid);
        }

        Some(OrderBookSnapshot {
            timestamp: now,
            bid,
            ask,
            bid_volume,
            bid_weight,
            ask_volume,
            ask_weight,
        })
    }

    pub fn mid(&self) -> f64 {
        (self.ask + self.bid) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

impl SeriesRecord for OrderBookSnapshot {
    fn schema() -> &'static [(&'static str, FieldPolicy)] {
        &[
            ("bid", FieldPolicy::Mean),
            ("ask", FieldPolicy::Mean),
            ("bid_volume", FieldPolicy::Mean),
            ("bid_weight", FieldPolicy::Mean),
            ("ask_volume", FieldPolicy::Mean),
            ("ask_weight", FieldPolicy::Mean),
        ]
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn field(&self, name: &str) -> FieldValue {
        let value = match name {
            "bid" => self.bid,
            "ask" => self.ask,
            "bid_volume" => self.bid_volume,
            "bid_weight" => self.bid_weight,
            "ask_volume" => self.ask_volume,
            "ask_weight" => self.ask_weight,
            _ => 0.0,
        };
        FieldValue::Float(value)
    }

    fn with_fields(timestamp: i64, fields: &[(&'static str, FieldValue)]) -> Self {
        let mut record = OrderBookSnapshot {
            timestamp,
            bid: 0.0,
            ask: 0.0,
            bid_volume: 0.0,
            bid_weight: 0.0,
            ask_volume: 0.0,
            ask_weight: 0.0,
        };
        for (name, value) in fields {
            let FieldValue::Float(v) = value else {
                continue;
            };
            match *name {
                "bid" => record.bid = *v,
                "ask" => record.ask = *v,
                "bid_volume" => record.bid_volume = *v,
                "bid_weight" => record.bid_weight = *v,
                "ask_volume" => record.ask_volume = *v,
                "ask_weight" => record.ask_weight = *v,
                _ => {}
            }
        }
        record
    }
}
