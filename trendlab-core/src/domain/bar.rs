//! Bar — the fundamental daily OHLCV market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar for a single symbol.
///
/// Invariant: `low <= {open, close} <= high`, `volume >= 0`. Bars for a symbol
/// are ordered by strictly increasing date; missing trading days are skipped,
/// never synthesized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Error produced when a bar fails the OHLCV sanity check.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("bar for {symbol} on {date}: {reason}")]
pub struct BarError {
    pub symbol: String,
    pub date: NaiveDate,
    pub reason: String,
}

impl Bar {
    /// Basic OHLCV sanity check: low <= {open, close} <= high.
    pub fn is_sane(&self) -> bool {
        self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
    }

    /// Validate the bar, returning a descriptive error on violation.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.is_sane() {
            Ok(())
        } else {
            Err(BarError {
                symbol: self.symbol.clone(),
                date: self.date,
                reason: format!(
                    "OHLC out of order (open={}, high={}, low={}, close={})",
                    self.open, self.high, self.low, self.close
                ),
            })
        }
    }
}
