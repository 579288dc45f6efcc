//! EquityPoint — one daily mark-to-market snapshot of the whole portfolio.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily equity snapshot. Invariant: `total_value == cash + open_positions_value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub cash: i64,
    pub open_positions_value: i64,
    pub total_value: i64,
}

impl EquityPoint {
    pub fn new(date: NaiveDate, cash: i64, open_positions_value: i64) -> Self {
        Self {
            date,
            cash,
            open_positions_value,
            total_value: cash + open_positions_value,
        }
    }
}
