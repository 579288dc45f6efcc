//! ClosedTrade — a completed round-trip, plus the closed set of exit reasons.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why a position was closed. A closed set — exhaustive matches on this enum
/// must be updated explicitly when a new exit path is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Automatic take-profit touch (`tpsl_only` mode).
    Tp,
    /// Automatic stop-loss touch (`tpsl_only` mode).
    Sl,
    /// Manual SELL signal, closed at next trading day's open.
    Sell,
    /// Manual REDUCE signal (4action mode); halves qty, reason recorded once
    /// on the remainder when it finally reaches zero residual.
    Reduce,
    /// Pending entry or position forced closed at the end of the backtest range.
    Timeout,
}

/// A closed round-trip trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub exit_date: NaiveDate,
    pub exit_price: f64,
    pub qty: u64,
    pub reason: ExitReason,
    pub return_pct: f64,
    pub pnl_vnd: i64,
    pub hold_days: i64,
}

impl ClosedTrade {
    pub fn is_winner(&self) -> bool {
        self.pnl_vnd > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn winner_detection() {
        let base = ClosedTrade {
            symbol: "AAA".into(),
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            entry_price: 100.0,
            exit_date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            exit_price: 112.0,
            qty: 100,
            reason: ExitReason::Tp,
            return_pct: 0.12,
            pnl_vnd: 1_200,
            hold_days: 1,
        };
        assert!(base.is_winner());
        let mut loser = base;
        loser.pnl_vnd = -500;
        assert!(!loser.is_winner());
    }
}
