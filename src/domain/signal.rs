//! Trading signal and decision types.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NoData,
    BuyAll,
    SellAll,
    Ambiguous,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Decision::NoData => "NO_DATA",
            Decision::BuyAll => "BUY_ALL",
            Decision::SellAll => "SELL_ALL",
            Decision::Ambiguous => "AMBIGUOUS",
        };
        write!(f, "{name}")
    }
}

/// One cycle's buy/sell indicator readout plus the discrete decision.
/// Indicator values are rounded to two decimals for display; the decision
/// is taken on the unrounded values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub buy: f64,
    pub sell: f64,
    pub buy_time: i64,
    pub sell_time: i64,
    pub decision: Decision,
}

impl Signal {
    pub fn no_data(now: i64) -> Self {
        Signal {
            buy: 0.0,
            sell: 0.0,
            buy_time: now,
            sell_time: now,
            decision: Decision::NoData,
        }
    }
}
