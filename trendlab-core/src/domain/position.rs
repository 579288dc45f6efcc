//! PendingEntry and OpenTrade — the two live position states the engine owns.
//!
//! Lifetime per symbol: `None -> Pending -> Open -> Closed`. A `Reduce` keeps a
//! trade `Open` with a smaller quantity; it only becomes `Closed` on a full exit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// How an entry was sourced: breakout (T+1 fill above prior week high) or
/// pullback (mid-zone limit entry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    Breakout,
    Pullback,
}

/// A queued entry awaiting a touch fill, created when the driver accepts a BUY.
///
/// Destroyed on fill, on expiry (end of the issuing week, by default policy),
/// or when the engine cancels it. At most one pending entry per symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEntry {
    pub symbol: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub target_qty: u64,
    pub entry_type: EntryType,
    /// Breakout entries may not fill before this date (T+1 eligibility).
    pub earliest_fill_date: NaiveDate,
    /// Cancelled if unfilled once `candle.date >= expires_at`.
    pub expires_at: NaiveDate,
}

impl PendingEntry {
    /// Whether this entry is eligible to fill on the given date (breakout guard).
    pub fn eligible_on(&self, date: NaiveDate) -> bool {
        date >= self.earliest_fill_date
    }

    /// Whether this entry touches the given day's range: `low <= entry <= high`.
    pub fn touched_by(&self, low: f64, high: f64) -> bool {
        low <= self.entry_price && self.entry_price <= high
    }

    pub fn expired_on(&self, date: NaiveDate) -> bool {
        date >= self.expires_at
    }
}

/// An open, filled position. At most one concurrent open trade per symbol.
///
/// Mutated only by `reduce` (quantity decrease, realized PnL increment);
/// destroyed on full exit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenTrade {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub qty: u64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// qty * entry_price + fee, in integer currency units.
    pub cost: i64,
    pub entry_type: EntryType,
}

impl OpenTrade {
    /// Market value of the position at the given close price (integer VND).
    pub fn market_value(&self, close: f64) -> i64 {
        (self.qty as f64 * close).round() as i64
    }

    /// True if this trade's invariants hold: qty > 0, stop < entry < target.
    pub fn is_well_formed(&self) -> bool {
        self.qty > 0 && self.stop_loss < self.entry_price && self.entry_price < self.take_profit
    }
}
