//! Replay performance summary.

use crate::domain::simulator::SimulationResult;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationMetrics {
    pub total_profit: f64,
    pub total_return: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_drawdown: f64,
}

impl SimulationMetrics {
    pub fn compute(result: &SimulationResult, initial_equity: f64) -> Self {
        let trades = &result.trader.history;

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trade in trades {
            if trade.profit > 0.0 {
                trades_won += 1;
                total_wins += trade.profit;
                largest_win = largest_win.max(trade.profit);
            } else if trade.profit < 0.0 {
                trades_lost += 1;
                total_losses += trade.profit.abs();
                largest_loss = largest_loss.max(trade.profit.abs());
            }
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };
        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let final_equity = result
            .equity_curve
            .last()
            .map(|&(_, equity)| equity)
            .unwrap_or(initial_equity);
        let total_profit = final_equity - initial_equity;
        let total_return = if initial_equity > 0.0 {
            total_profit / initial_equity
        } else {
            0.0
        };

        let max_drawdown = compute_drawdown(&result.equity_curve);

        SimulationMetrics {
            total_profit,
            total_return,
            total_trades,
            trades_won,
            trades_lost,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            max_drawdown,
        }
    }
}

/// Largest peak-to-trough equity loss, as a fraction of the peak.
fn compute_drawdown(equity_curve: &[(i64, f64)]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_drawdown = 0.0_f64;
    for &(_, equity) in equity_curve {
        peak = peak.max(equity);
        if peak > 0.0 {
            max_drawdown = max_drawdown.max((peak - equity) / peak);
        }
    }
    max_drawdown
}
