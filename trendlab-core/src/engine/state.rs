//! EngineState — the engine's exclusively-owned mutable state.
//!
//! The engine owns all mutable state; trades never reference the engine back
//! (no cyclic ownership). Pending and open collections key by symbol for O(1)
//! lookup and to enforce "at most one per symbol" by construction.

use crate::domain::{ClosedTrade, EquityPoint, OpenTrade, PendingEntry, Symbol};
use std::collections::HashMap;

/// Mutable state owned exclusively by the engine for a single backtest run.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub cash: i64,
    pub open_trades: HashMap<Symbol, OpenTrade>,
    pub pending_entries: HashMap<Symbol, PendingEntry>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Last observed close per symbol, carried forward on days with no bar
    /// for that symbol so equity stays well-defined through data gaps.
    pub last_close: HashMap<Symbol, f64>,
}

impl EngineState {
    pub fn new(initial_cash: i64) -> Self {
        Self {
            cash: initial_cash,
            open_trades: HashMap::new(),
            pending_entries: HashMap::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            last_close: HashMap::new(),
        }
    }

    /// Total equity: cash + sum of open position market values, falling back
    /// to entry price for any symbol not yet observed this run.
    pub fn open_positions_value(&self) -> i64 {
        self.open_trades
            .values()
            .map(|t| {
                let price = self.last_close.get(&t.symbol).copied().unwrap_or(t.entry_price);
                t.market_value(price)
            })
            .sum()
    }

    pub fn equity(&self) -> i64 {
        self.cash + self.open_positions_value()
    }

    pub fn has_open(&self, symbol: &str) -> bool {
        self.open_trades.contains_key(symbol)
    }
}
