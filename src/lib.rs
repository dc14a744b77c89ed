//! arbot: cross-exchange arbitrage signal engine and trader.
//!
//! Detects short-lived price divergence between a reference market's trade
//! feed and a target market's order book, and drives a long/flat position
//! from that signal. Replay and live trading share one decision path.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
