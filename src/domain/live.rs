//! Live trading session: periodic ingestion plus the shared decision path.
//!
//! The session owns no clock and no scheduler; an external driver calls
//! [`LiveSession::poll`] and [`LiveSession::cycle`] once per tick, in that
//! order. Cycles therefore never overlap, and ingestion is always merged
//! before the signal runs.

use crate::domain::cycle::{CycleReport, evaluate_cycle};
use crate::domain::engine::SignalAlgorithm;
use crate::domain::error::ArbotError;
use crate::domain::reader::IncrementalReader;
use crate::domain::record::{OrderBookSnapshot, PricePoint};
use crate::domain::signal::Signal;
use crate::domain::store::{StoreConfig, TimeSeriesStore};
use crate::domain::trader::{Trader, TraderConfig};
use crate::ports::exchange_port::ExchangePort;
use crate::ports::segment_port::SegmentStorePort;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

const TRADE_FETCH_LIMIT: usize = 100;

pub struct LiveSession<'a> {
    exchange: &'a dyn ExchangePort,
    segments: &'a dyn SegmentStorePort,
    algorithm: Box<dyn SignalAlgorithm>,
    trader: Trader,
    source_store: TimeSeriesStore<'a, PricePoint>,
    book_store: TimeSeriesStore<'a, OrderBookSnapshot>,
    source_reader: IncrementalReader<PricePoint>,
    book_reader: IncrementalReader<OrderBookSnapshot>,
    signals: Vec<Signal>,
}

impl<'a> LiveSession<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        exchange: &'a dyn ExchangePort,
        segments: &'a dyn SegmentStorePort,
        algorithm: Box<dyn SignalAlgorithm>,
        trader_config: &TraderConfig,
        store_config: StoreConfig,
        source_dataset: &str,
        book_dataset: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ArbotError> {
        let source_store =
            TimeSeriesStore::open(segments, source_dataset, store_config.clone(), now)?;
        let book_store = TimeSeriesStore::open(segments, book_dataset, store_config, now)?;

        Ok(LiveSession {
            exchange,
            segments,
            algorithm,
            trader: Trader::new(trader_config),
            source_store,
            book_store,
            source_reader: IncrementalReader::new(source_dataset),
            book_reader: IncrementalReader::new(book_dataset),
            signals: Vec::new(),
        })
    }

    /// Ingest the latest trades and order book into the stores. Exchange
    /// failures degrade to "nothing written this tick".
    pub fn poll(&mut self, now: DateTime<Utc>) {
        match self.exchange.fetch_latest_trades(TRADE_FETCH_LIMIT) {
            Some(trades) => self.source_store.write(&trades, now),
            None => warn!("trade fetch failed; skipping source ingestion"),
        }

        match self.exchange.fetch_order_book() {
            Some(depth) => match OrderBookSnapshot::from_depth(&depth, now.timestamp()) {
                Some(snapshot) => self.book_store.write(&[snapshot], now),
                None => debug!("order book empty or one-sided; nothing ingested"),
            },
            None => warn!("order book fetch failed; skipping book ingestion"),
        }
    }

    /// Read the recent window through the incremental readers and run the
    /// same per-cycle path the simulator drives.
    pub fn cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport, ArbotError> {
        let now_ts = now.timestamp();
        let start = now_ts - self.algorithm.cutoff_secs();

        let source = self
            .source_reader
            .read_latest(self.segments, start, None, now_ts)?
            .clone();
        let book = self
            .book_reader
            .read_latest(self.segments, start, None, now_ts)?
            .clone();

        let report = evaluate_cycle(
            self.algorithm.as_ref(),
            &mut self.trader,
            &source,
            &book,
            now_ts,
        );
        self.signals.push(report.signal);
        Ok(report)
    }

    pub fn trader(&self) -> &Trader {
        &self.trader
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::engine::{ArbitrageAlgorithm, SignalConfig};
    use crate::domain::signal::Decision;
    use crate::domain::testing::{MemoryPort, at};
    use crate::ports::exchange_port::{
        AccountStatus, BookLevel, ExchangeOrder, OrderBookDepth, OrderSide,
    };
    use std::cell::RefCell;

    struct ReplayExchange {
        price: RefCell<f64>,
        book: RefCell<Option<(f64, f64)>>,
        next_trade_id: RefCell<i64>,
        clock: RefCell<i64>,
    }

    impl ReplayExchange {
        fn new() -> Self {
            ReplayExchange {
                price: RefCell::new(9000.0),
                book: RefCell::new(Some((9290.0, 9300.0))),
                next_trade_id: RefCell::new(1),
                clock: RefCell::new(0),
            }
        }

        fn set_clock(&self, secs: i64) {
            *self.clock.borrow_mut() = secs;
        }
    }

    impl ExchangePort for ReplayExchange {
        fn fetch_latest_trades(&self, _limit: usize) -> Option<Vec<PricePoint>> {
            let mut id = self.next_trade_id.borrow_mut();
            *id += 1;
            Some(vec![PricePoint {
                timestamp: *self.clock.borrow(),
                id: *id,
                created_at: at(*self.clock.borrow()),
                price: *self.price.borrow(),
                volume: 0.1,
            }])
        }

        fn fetch_order_book(&self) -> Option<OrderBookDepth> {
            (*self.book.borrow()).map(|(bid, ask)| OrderBookDepth {
                asks: vec![BookLevel {
                    price: ask,
                    remaining_volume: 1.0,
                }],
                bids: vec![BookLevel {
                    price: bid,
                    remaining_volume: 1.0,
                }],
            })
        }

        fn status(&self) -> Option<AccountStatus> {
            None
        }

        fn orders(&self) -> Option<Vec<ExchangeOrder>> {
            None
        }

        fn order(&self, _side: OrderSide, _price: f64, _volume: f64) -> Option<ExchangeOrder> {
            None
        }

        fn delete(&self, _id: i64) -> bool {
            false
        }
    }

    fn session<'a>(
        exchange: &'a ReplayExchange,
        port: &'a MemoryPort,
    ) -> LiveSession<'a> {
        let algorithm = ArbitrageAlgorithm::new(SignalConfig {
            step_secs: 60,
            rolling_window_secs: 600,
            lag_bars: 2,
            min_spread_ratio: 0.0035,
            buy_threshold: 8.0,
            sell_threshold: -5.0,
            min_samples: 5,
            cutoff_secs: 3600,
        });
        LiveSession::new(
            exchange,
            port,
            Box::new(algorithm),
            &TraderConfig::default(),
            StoreConfig {
                flush_interval_secs: 0,
                rollover_bytes: 1 << 20,
            },
            "src_trades",
            "tgt_book",
            at(0),
        )
        .unwrap()
    }

    #[test]
    fn poll_then_cycle_reaches_a_decision() {
        let exchange = ReplayExchange::new();
        let port = MemoryPort::new();
        let mut live = session(&exchange, &port);

        for i in 0..30 {
            let now = at(i * 60);
            exchange.set_clock(i * 60);
            live.poll(now);
            let report = live.cycle(now).unwrap();
            if i >= 10 {
                assert_eq!(report.signal.decision, Decision::Ambiguous);
            }
        }
        assert_eq!(live.signals().len(), 30);
        assert!(live.trader().current_trade.is_none());
    }

    #[test]
    fn exchange_outage_degrades_to_no_data() {
        let exchange = ReplayExchange::new();
        *exchange.book.borrow_mut() = None;
        let port = MemoryPort::new();
        let mut live = session(&exchange, &port);

        exchange.set_clock(0);
        live.poll(at(0));
        let report = live.cycle(at(0)).unwrap();
        assert_eq!(report.signal.decision, Decision::NoData);
        assert_eq!(live.trader().equity, 1000.0);
    }
}
