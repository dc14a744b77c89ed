#![allow(dead_code)]

use arbot::domain::engine::SignalConfig;
use arbot::domain::record::{OrderBookSnapshot, PricePoint};
use arbot::domain::series::SeriesFrame;
use chrono::{DateTime, TimeZone, Utc};

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn tick(timestamp: i64, price: f64) -> PricePoint {
    PricePoint {
        timestamp,
        id: timestamp,
        created_at: at(timestamp),
        price,
        volume: 0.1,
    }
}

pub fn book_row(timestamp: i64, bid: f64, ask: f64) -> OrderBookSnapshot {
    OrderBookSnapshot {
        timestamp,
        bid,
        ask,
        bid_volume: 1.0,
        bid_weight: 0.0,
        ask_volume: 1.0,
        ask_weight: 0.0,
    }
}

/// Small windows so scenarios stay hand-checkable.
pub fn test_signal_config() -> SignalConfig {
    SignalConfig {
        step_secs: 60,
        rolling_window_secs: 600,
        lag_bars: 2,
        min_spread_ratio: 0.0035,
        buy_threshold: 8.0,
        sell_threshold: -5.0,
        min_samples: 5,
        cutoff_secs: 3600,
    }
}

/// Flat market at a 60 s tick for `bars` bars: source 9000, book 9290/9300.
pub fn flat_frames(bars: i64) -> (SeriesFrame<PricePoint>, SeriesFrame<OrderBookSnapshot>) {
    let source = SeriesFrame::from_rows((0..bars).map(|i| tick(i * 60, 9000.0)));
    let book = SeriesFrame::from_rows((0..bars).map(|i| book_row(i * 60, 9290.0, 9300.0)));
    (source, book)
}

/// A divergence story on a 60 s grid:
/// flat until 1800 s, target ask collapses to 9000 until 2400 s, then the
/// book spikes to 9600/9610 until 2700 s. The source never moves.
pub fn divergence_frames() -> (SeriesFrame<PricePoint>, SeriesFrame<OrderBookSnapshot>) {
    let source = SeriesFrame::from_rows((0..45).map(|i| tick(i * 60, 9000.0)));
    let book = SeriesFrame::from_rows((0..45).map(|i| {
        let ts = i * 60;
        if ts < 1800 {
            book_row(ts, 9290.0, 9300.0)
        } else if ts < 2400 {
            book_row(ts, 8990.0, 9000.0)
        } else {
            book_row(ts, 9600.0, 9610.0)
        }
    }));
    (source, book)
}
