//! Arbitrage signal computation.
//!
//! Pure mapping from a reference-market price series and a target-market
//! order-book series to a [`Signal`]. No hidden state: identical inputs
//! always produce identical output.

use crate::domain::error::ArbotError;
use crate::domain::record::{OrderBookSnapshot, PricePoint};
use crate::domain::series::{SeriesFrame, resample_mean, rolling_mean_time, rolling_sum_time};
use crate::domain::signal::{Decision, Signal};
use tracing::debug;

/// Raw buy indicator values below this are treated as noise.
pub const BUY_NOISE_FLOOR: f64 = 1.5;
/// Raw sell indicator values above this are treated as noise.
pub const SELL_NOISE_CEILING: f64 = -0.8;
/// Trailing window that smooths transient spikes into a persistent score.
pub const SMOOTHING_WINDOW_SECS: i64 = 180;

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    /// Resample bucket size, seconds.
    pub step_secs: i64,
    /// Exchange-rate coefficient smoothing window, seconds.
    pub rolling_window_secs: i64,
    /// Look-back shift applied to the coefficient, in buckets.
    pub lag_bars: usize,
    /// Spread floor as a fraction of the bid (commission hedge).
    pub min_spread_ratio: f64,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    /// Minimum order-book rows before any signal is computed.
    pub min_samples: usize,
    /// Retention window for the live in-memory series, seconds.
    pub cutoff_secs: i64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            step_secs: 60,
            rolling_window_secs: 7200,
            lag_bars: 10,
            min_spread_ratio: 0.0035,
            buy_threshold: 8.0,
            sell_threshold: -5.0,
            min_samples: 20,
            cutoff_secs: 21600,
        }
    }
}

impl SignalConfig {
    /// Thresholds have no safe default, so a config without them is
    /// rejected here rather than mid-cycle.
    pub fn from_config(
        config: &dyn crate::ports::config_port::ConfigPort,
    ) -> Result<Self, ArbotError> {
        let defaults = SignalConfig::default();
        let require = |key: &str| -> Result<f64, ArbotError> {
            config
                .get_string("signal", key)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .ok_or_else(|| ArbotError::ConfigMissing {
                    section: "signal".into(),
                    key: key.into(),
                })
        };
        Ok(SignalConfig {
            step_secs: config.get_int("signal", "step_secs", defaults.step_secs),
            rolling_window_secs: config.get_int(
                "signal",
                "rolling_window_secs",
                defaults.rolling_window_secs,
            ),
            lag_bars: config.get_int("signal", "lag_bars", defaults.lag_bars as i64) as usize,
            min_spread_ratio: config.get_double(
                "signal",
                "min_spread_ratio",
                defaults.min_spread_ratio,
            ),
            buy_threshold: require("buy_threshold")?,
            sell_threshold: require("sell_threshold")?,
            min_samples: config.get_int("signal", "min_samples", defaults.min_samples as i64)
                as usize,
            cutoff_secs: config.get_int("signal", "cutoff_secs", defaults.cutoff_secs),
        })
    }
}

/// Capability interface for signal computation. `emulate` optionally
/// derives a synthetic order-book series from the source series; variants
/// that cannot emulate return `None`.
pub trait SignalAlgorithm {
    fn signal(
        &self,
        source: &SeriesFrame<PricePoint>,
        book: &SeriesFrame<OrderBookSnapshot>,
        now: i64,
    ) -> Signal;

    fn emulate(
        &self,
        _source: &SeriesFrame<PricePoint>,
    ) -> Option<SeriesFrame<OrderBookSnapshot>> {
        None
    }

    /// Retention window bounding the live in-memory series.
    fn cutoff_secs(&self) -> i64;
}

/// The production algorithm: curve-fits the reference price onto the target
/// market through a lagged rolling-mean coefficient, scores the distance to
/// the book in units of the (floored) spread, and smooths the score over a
/// trailing real-time window.
#[derive(Debug, Clone)]
pub struct ArbitrageAlgorithm {
    config: SignalConfig,
}

impl ArbitrageAlgorithm {
    pub fn new(config: SignalConfig) -> Self {
        ArbitrageAlgorithm { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }
}

impl SignalAlgorithm for ArbitrageAlgorithm {
    fn signal(
        &self,
        source: &SeriesFrame<PricePoint>,
        book: &SeriesFrame<OrderBookSnapshot>,
        now: i64,
    ) -> Signal {
        let cfg = &self.config;
        if book.len() < cfg.min_samples {
            return Signal::no_data(now);
        }

        let src = resample_mean(&source.project(|r| r.price), cfg.step_secs);
        let bid = resample_mean(&book.project(|r| r.bid), cfg.step_secs);
        let ask = resample_mean(&book.project(|r| r.ask), cfg.step_secs);
        if src.is_empty() || bid.is_empty() {
            return Signal::no_data(now);
        }

        // bid and ask come from the same frame, so they share one grid
        let mid: Vec<(i64, f64)> = bid
            .iter()
            .zip(&ask)
            .map(|(&(ts, b), &(_, a))| (ts, (a + b) / 2.0))
            .collect();

        let src_mean = rolling_mean_time(&src, cfg.rolling_window_secs);
        let mid_mean = rolling_mean_time(&mid, cfg.rolling_window_secs);

        // overlap of the two grids; buckets are step-aligned on both sides
        let start = src[0].0.max(bid[0].0);
        let end = src[src.len() - 1].0.min(bid[bid.len() - 1].0);
        if end < start {
            return Signal::no_data(now);
        }
        let src_off = ((start - src[0].0) / cfg.step_secs) as usize;
        let book_off = ((start - bid[0].0) / cfg.step_secs) as usize;
        let len = ((end - start) / cfg.step_secs + 1) as usize;

        let mut buy_raw: Vec<(i64, f64)> = Vec::with_capacity(len);
        let mut sell_raw: Vec<(i64, f64)> = Vec::with_capacity(len);
        for i in 0..len {
            let si = src_off + i;
            let bi = book_off + i;
            // the coefficient is undefined until `lag_bars` of history exist
            if si < cfg.lag_bars || bi < cfg.lag_bars {
                continue;
            }
            let shifted_source = src_mean[si - cfg.lag_bars].1;
            let shifted_target = mid_mean[bi - cfg.lag_bars].1;
            if shifted_source == 0.0 {
                continue;
            }
            let coefficient = shifted_target / shifted_source;

            let ts = start + i as i64 * cfg.step_secs;
            let bid_px = bid[bi].1;
            let ask_px = ask[bi].1;
            let spread = (ask_px - bid_px).max(cfg.min_spread_ratio * bid_px);
            let fitted = src[si].1 * coefficient;

            let buy = (fitted - ask_px) / spread;
            if buy.is_finite() {
                buy_raw.push((ts, if buy < BUY_NOISE_FLOOR { 0.0 } else { buy }));
            }
            let sell = (fitted - bid_px) / spread;
            if sell.is_finite() {
                sell_raw.push((ts, if sell > SELL_NOISE_CEILING { 0.0 } else { sell }));
            }
        }

        if buy_raw.is_empty() || sell_raw.is_empty() {
            return Signal::no_data(now);
        }

        let buy_smooth = rolling_sum_time(&buy_raw, SMOOTHING_WINDOW_SECS);
        let sell_smooth = rolling_sum_time(&sell_raw, SMOOTHING_WINDOW_SECS);
        let &(buy_time, buy_last) = buy_smooth.last().unwrap_or(&(now, 0.0));
        let &(sell_time, sell_last) = sell_smooth.last().unwrap_or(&(now, 0.0));
        debug!(buy = buy_last, sell = sell_last, "indicators computed");

        Signal {
            buy: round_display(buy_last),
            sell: round_display(sell_last),
            buy_time,
            sell_time,
            decision: decide(buy_last, sell_last, cfg),
        }
    }

    fn cutoff_secs(&self) -> i64 {
        self.config.cutoff_secs
    }
}

fn decide(buy: f64, sell: f64, cfg: &SignalConfig) -> Decision {
    let mut result = Decision::Ambiguous;
    if buy > cfg.buy_threshold {
        result = Decision::BuyAll;
    }
    if sell < cfg.sell_threshold {
        // sell takes priority over buy: bail out of the risky position
        result = Decision::SellAll;
    }
    result
}

fn round_display(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
