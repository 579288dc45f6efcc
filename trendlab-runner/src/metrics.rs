//! Performance metrics — pure functions over a closed-trade log and equity curve.
//!
//! Every metric here is a pure function: no dependency on the driver, the
//! provider, or the engine's internal state.

use serde::{Deserialize, Serialize};
use trendlab_core::domain::{ClosedTrade, EquityPoint};

/// Run summary, persisted as `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub final_value: i64,
    pub total_return: f64,
    pub cagr: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub avg_hold_days: f64,
    pub num_trades: usize,
    pub profit_factor: f64,
    pub avg_invested_pct: f64,
}

impl Summary {
    pub fn compute(initial_cash: i64, equity_curve: &[EquityPoint], trades: &[ClosedTrade]) -> Self {
        let final_value = equity_curve.last().map(|p| p.total_value).unwrap_or(initial_cash);
        Self {
            final_value,
            total_return: total_return(initial_cash, final_value),
            cagr: cagr(initial_cash, final_value, equity_curve),
            max_drawdown: max_drawdown(equity_curve),
            win_rate: win_rate(trades),
            avg_hold_days: avg_hold_days(trades),
            num_trades: trades.len(),
            profit_factor: profit_factor(trades),
            avg_invested_pct: avg_invested_pct(equity_curve),
        }
    }
}

/// `final/initial - 1`.
pub fn total_return(initial_cash: i64, final_value: i64) -> f64 {
    if initial_cash == 0 {
        return 0.0;
    }
    final_value as f64 / initial_cash as f64 - 1.0
}

/// `(final/initial)^(365/days) - 1`, using calendar days spanned by the curve.
pub fn cagr(initial_cash: i64, final_value: i64, equity_curve: &[EquityPoint]) -> f64 {
    if initial_cash <= 0 || final_value <= 0 || equity_curve.len() < 2 {
        return 0.0;
    }
    let days = (equity_curve.last().unwrap().date - equity_curve.first().unwrap().date).num_days();
    if days <= 0 {
        return 0.0;
    }
    (final_value as f64 / initial_cash as f64).powf(365.0 / days as f64) - 1.0
}

/// `max over t of (peak_to_t - v_t) / peak_to_t`, as a positive fraction.
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }
    let mut peak = equity_curve[0].total_value;
    let mut worst = 0.0_f64;
    for point in equity_curve {
        if point.total_value > peak {
            peak = point.total_value;
        }
        if peak > 0 {
            let dd = (peak - point.total_value) as f64 / peak as f64;
            if dd > worst {
                worst = dd;
            }
        }
    }
    worst
}

pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

pub fn avg_hold_days(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.hold_days as f64).sum::<f64>() / trades.len() as f64
}

/// `Σ gains / |Σ losses|`. `f64::INFINITY` if there are gains and no losses;
/// `0.0` if there are no gains at all (including the empty-trades case).
pub fn profit_factor(trades: &[ClosedTrade]) -> f64 {
    let gains: i64 = trades.iter().filter(|t| t.pnl_vnd > 0).map(|t| t.pnl_vnd).sum();
    let losses: i64 = trades.iter().filter(|t| t.pnl_vnd < 0).map(|t| t.pnl_vnd.abs()).sum();

    if losses == 0 {
        return if gains > 0 { f64::INFINITY } else { 0.0 };
    }
    gains as f64 / losses as f64
}

/// `mean(open_positions_value / total_value)` across the equity curve.
pub fn avg_invested_pct(equity_curve: &[EquityPoint]) -> f64 {
    if equity_curve.is_empty() {
        return 0.0;
    }
    let sum: f64 = equity_curve
        .iter()
        .map(|p| if p.total_value > 0 { p.open_positions_value as f64 / p.total_value as f64 } else { 0.0 })
        .sum();
    sum / equity_curve.len() as f64
}
