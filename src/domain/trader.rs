//! Trade lifecycle state machine and live order placement.

use crate::domain::record::OrderBookSnapshot;
use crate::domain::signal::{Decision, Signal};
use crate::ports::config_port::ConfigPort;
use crate::ports::exchange_port::{ExchangeOrder, ExchangePort, OrderSide};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Flat,
    Long,
}

/// Position currently held. Exists exactly while the trader is long.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpenTrade {
    pub open_time: i64,
    pub volume: f64,
    pub open_price: f64,
}

/// Immutable once closed.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub open_time: i64,
    pub close_time: i64,
    pub volume: f64,
    pub open_price: f64,
    pub close_price: f64,
    pub profit: f64,
}

/// What the state machine did with this cycle's signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    BuyAll,
    SellAll,
    NoData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraderConfig {
    /// Commission rate applied at close against the open price.
    pub commission: f64,
    pub initial_equity: f64,
}

impl Default for TraderConfig {
    fn default() -> Self {
        TraderConfig {
            commission: 0.005,
            initial_equity: 1000.0,
        }
    }
}

impl TraderConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = TraderConfig::default();
        TraderConfig {
            commission: config.get_double("trader", "commission", defaults.commission),
            initial_equity: config.get_double("trader", "initial_equity", defaults.initial_equity),
        }
    }
}

/// Long/flat position driven by one signal per cycle. Equity mutates only
/// when a trade closes.
#[derive(Debug, Clone)]
pub struct Trader {
    commission: f64,
    pub equity: f64,
    pub current_trade: Option<OpenTrade>,
    pub history: Vec<ClosedTrade>,
}

impl Trader {
    pub fn new(config: &TraderConfig) -> Self {
        Trader {
            commission: config.commission,
            equity: config.initial_equity,
            current_trade: None,
            history: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        if self.current_trade.is_some() {
            Status::Long
        } else {
            Status::Flat
        }
    }

    /// Apply one cycle's signal against the latest order-book snapshot.
    /// Any combination other than FLAT+BUY_ALL or LONG+SELL_ALL leaves the
    /// state untouched.
    pub fn on_signal(
        &mut self,
        signal: &Signal,
        book: Option<&OrderBookSnapshot>,
        now: i64,
    ) -> CycleOutcome {
        let Some(book) = book else {
            return CycleOutcome::NoData;
        };

        match (self.current_trade, signal.decision) {
            (None, Decision::BuyAll) => {
                if book.ask <= 0.0 {
                    return CycleOutcome::NoData;
                }
                let trade = OpenTrade {
                    open_time: now,
                    volume: self.equity / book.ask,
                    open_price: book.ask,
                };
                info!(
                    price = trade.open_price,
                    volume = trade.volume,
                    "opening long position"
                );
                self.current_trade = Some(trade);
                CycleOutcome::BuyAll
            }
            (Some(open), Decision::SellAll) => {
                let profit =
                    open.volume * (book.bid - (1.0 + self.commission) * open.open_price);
                self.equity += profit;
                info!(price = book.bid, profit, "closing long position");
                self.history.push(ClosedTrade {
                    open_time: open.open_time,
                    close_time: now,
                    volume: open.volume,
                    open_price: open.open_price,
                    close_price: book.bid,
                    profit,
                });
                self.current_trade = None;
                CycleOutcome::SellAll
            }
            _ => CycleOutcome::NoData,
        }
    }
}

/// Order size clamps for live execution, in quote units for buys and base
/// units for sells.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub quote_currency: String,
    pub base_currency: String,
    pub min_buy_funds: f64,
    pub max_buy_funds: f64,
    pub min_sell_volume: f64,
    pub max_sell_volume: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            quote_currency: "uah".into(),
            base_currency: "btc".into(),
            min_buy_funds: 20.0,
            max_buy_funds: 50_000.0,
            min_sell_volume: 0.000002,
            max_sell_volume: 1.0,
        }
    }
}

impl ExecutorConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = ExecutorConfig::default();
        ExecutorConfig {
            quote_currency: config
                .get_string("trader", "quote_currency")
                .unwrap_or(defaults.quote_currency),
            base_currency: config
                .get_string("trader", "base_currency")
                .unwrap_or(defaults.base_currency),
            min_buy_funds: config.get_double("trader", "min_buy_funds", defaults.min_buy_funds),
            max_buy_funds: config.get_double("trader", "max_buy_funds", defaults.max_buy_funds),
            min_sell_volume: config.get_double(
                "trader",
                "min_sell_volume",
                defaults.min_sell_volume,
            ),
            max_sell_volume: config.get_double(
                "trader",
                "max_sell_volume",
                defaults.max_sell_volume,
            ),
        }
    }
}

/// Places whole-balance orders through the exchange port. Every operation
/// reports failure as `None`/`false`; nothing here panics or raises.
pub struct LiveExecutor<'a> {
    exchange: &'a dyn ExchangePort,
    config: ExecutorConfig,
}

impl<'a> LiveExecutor<'a> {
    pub fn new(exchange: &'a dyn ExchangePort, config: ExecutorConfig) -> Self {
        LiveExecutor { exchange, config }
    }

    /// Spend the whole quote balance (clamped) at the best ask.
    pub fn buy_all(&self) -> Option<ExchangeOrder> {
        let status = self.exchange.status()?;
        let account = status
            .accounts
            .iter()
            .find(|a| a.currency == self.config.quote_currency)?;
        let mut funds = account.balance.floor();
        if funds < self.config.min_buy_funds {
            return None;
        }
        funds = funds.min(self.config.max_buy_funds);

        let book = self.exchange.fetch_order_book()?;
        let ask = book
            .asks
            .iter()
            .map(|l| l.price)
            .fold(f64::INFINITY, f64::min);
        if !ask.is_finite() || ask <= 0.0 {
            return None;
        }

        let volume = floor_volume(funds / ask);
        self.exchange.order(OrderSide::Buy, ask, volume)
    }

    /// Sell the whole base balance (clamped) at the best bid.
    pub fn sell_all(&self) -> Option<ExchangeOrder> {
        let status = self.exchange.status()?;
        let account = status
            .accounts
            .iter()
            .find(|a| a.currency == self.config.base_currency)?;
        let mut volume = floor_volume(account.balance);
        if volume < self.config.min_sell_volume {
            return None;
        }
        volume = volume.min(self.config.max_sell_volume);

        let book = self.exchange.fetch_order_book()?;
        let bid = book
            .bids
            .iter()
            .map(|l| l.price)
            .fold(f64::NEG_INFINITY, f64::max);
        if !bid.is_finite() || bid <= 0.0 {
            return None;
        }

        self.exchange.order(OrderSide::Sell, bid, volume)
    }

    /// Cancel every open order. Returns false when listing fails or any
    /// single cancellation fails.
    pub fn cancel_all(&self) -> bool {
        let Some(orders) = self.exchange.orders() else {
            warn!("order listing failed; nothing cancelled");
            return false;
        };
        let mut all_ok = true;
        for order in orders {
            if !self.exchange.delete(order.id) {
                warn!(id = order.id, "order cancellation failed");
                all_ok = false;
            }
        }
        all_ok
    }
}

/// Exchanges reject sub-satoshi volume precision; keep six decimals.
fn floor_volume(volume: f64) -> f64 {
    (volume * 1_000_000.0).floor() / 1_000_000.0
}
