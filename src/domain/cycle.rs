//! The single per-cycle decision path shared by live trading and replay.

use crate::domain::engine::SignalAlgorithm;
use crate::domain::record::{OrderBookSnapshot, PricePoint};
use crate::domain::series::SeriesFrame;
use crate::domain::signal::Signal;
use crate::domain::trader::{CycleOutcome, Trader};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub signal: Signal,
    pub outcome: CycleOutcome,
}

/// Run one cycle: trim both series to the algorithm's retention window,
/// compute the signal, and feed it with the latest snapshot to the state
/// machine. `now` is supplied by the driver: wall clock when live, the
/// simulated cursor during replay.
pub fn evaluate_cycle(
    algorithm: &dyn SignalAlgorithm,
    trader: &mut Trader,
    source: &SeriesFrame<PricePoint>,
    book: &SeriesFrame<OrderBookSnapshot>,
    now: i64,
) -> CycleReport {
    let start = now - algorithm.cutoff_secs();
    let source_window = source.slice(start, now + 1);
    let book_window = book.slice(start, now + 1);

    let signal = algorithm.signal(&source_window, &book_window, now);
    let latest = book_window.latest().cloned();
    let outcome = trader.on_signal(&signal, latest.as_ref(), now);

    CycleReport { signal, outcome }
}
