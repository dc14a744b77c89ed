//! Deterministic replay of recorded datasets through the live decision path.

use crate::domain::cycle::evaluate_cycle;
use crate::domain::engine::SignalAlgorithm;
use crate::domain::record::{OrderBookSnapshot, PricePoint};
use crate::domain::series::SeriesFrame;
use crate::domain::signal::Signal;
use crate::domain::trader::{Trader, TraderConfig};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorParams {
    /// Replay start bound, unix seconds.
    pub after: Option<i64>,
    /// Replay end bound, unix seconds (exclusive).
    pub before: Option<i64>,
    /// Step duration, seconds.
    pub frequency_secs: i64,
}

impl Default for SimulatorParams {
    fn default() -> Self {
        SimulatorParams {
            after: None,
            before: None,
            frequency_secs: 10,
        }
    }
}

impl SimulatorParams {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = SimulatorParams::default();
        let bound = |key: &str| {
            config
                .get_string("simulator", key)
                .and_then(|s| s.trim().parse::<i64>().ok())
        };
        SimulatorParams {
            after: bound("after"),
            before: bound("before"),
            frequency_secs: config.get_int("simulator", "frequency_secs", defaults.frequency_secs),
        }
    }
}

/// One replay step: the half-open slice `[window_start, now)` of every
/// dataset. `now` is the simulated clock the cycle must run with.
#[derive(Debug, Clone)]
pub struct SimStep {
    pub window_start: i64,
    pub now: i64,
    pub source: SeriesFrame<PricePoint>,
    pub book: SeriesFrame<OrderBookSnapshot>,
}

/// Finite cursor over two recorded datasets. Yields non-overlapping windows
/// covering `[after, before)`, the final window truncated at `before`;
/// stops once every dataset is exhausted at the cursor.
pub struct Simulator {
    source: SeriesFrame<PricePoint>,
    book: SeriesFrame<OrderBookSnapshot>,
    params: SimulatorParams,
    cursor: Option<i64>,
}

impl Simulator {
    pub fn new(
        source: SeriesFrame<PricePoint>,
        book: SeriesFrame<OrderBookSnapshot>,
        params: SimulatorParams,
    ) -> Self {
        let earliest = match (source.first_timestamp(), book.first_timestamp()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        let cursor = earliest.map(|start| match params.after {
            Some(after) => start.max(after),
            None => start,
        });
        Simulator {
            source,
            book,
            params,
            cursor,
        }
    }

    fn exhausted(&self, cursor: i64) -> bool {
        !self.source.has_rows_from(cursor) && !self.book.has_rows_from(cursor)
    }
}

impl Iterator for Simulator {
    type Item = SimStep;

    fn next(&mut self) -> Option<SimStep> {
        let cursor = self.cursor?;
        if let Some(before) = self.params.before {
            if cursor >= before {
                return None;
            }
        }
        if self.exhausted(cursor) {
            return None;
        }

        let mut end = cursor + self.params.frequency_secs;
        if let Some(before) = self.params.before {
            end = end.min(before);
        }

        let step = SimStep {
            window_start: cursor,
            now: end,
            source: self.source.slice(cursor, end),
            book: self.book.slice(cursor, end),
        };
        self.cursor = Some(cursor + self.params.frequency_secs);
        Some(step)
    }
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub trader: Trader,
    pub signals: Vec<Signal>,
    /// Realized equity after each cycle.
    pub equity_curve: Vec<(i64, f64)>,
    pub cycles: usize,
}

/// Replay the datasets through the identical per-cycle path used live,
/// with `now` taken from the simulated cursor. Reruns over the same inputs
/// produce identical results.
pub fn run_simulation(
    algorithm: &dyn SignalAlgorithm,
    trader_config: &TraderConfig,
    source: SeriesFrame<PricePoint>,
    book: SeriesFrame<OrderBookSnapshot>,
    params: SimulatorParams,
) -> SimulationResult {
    let mut trader = Trader::new(trader_config);
    let mut live_source: SeriesFrame<PricePoint> = SeriesFrame::new();
    let mut live_book: SeriesFrame<OrderBookSnapshot> = SeriesFrame::new();
    let mut signals = Vec::new();
    let mut equity_curve = Vec::new();

    for step in Simulator::new(source, book, params) {
        live_source.merge(step.source);
        live_book.merge(step.book);
        let retain_from = step.now - algorithm.cutoff_secs();
        live_source.retain_from(retain_from);
        live_book.retain_from(retain_from);

        let report = evaluate_cycle(algorithm, &mut trader, &live_source, &live_book, step.now);
        signals.push(report.signal);
        equity_curve.push((step.now, trader.equity));
    }

    let cycles = signals.len();
    SimulationResult {
        trader,
        signals,
        equity_curve,
        cycles,
    }
}
