//! Pure indicator functions over ordered bar series. No I/O, no randomness.
//!
//! Every indicator implements the `Indicator` trait: full bar series in, a
//! same-length numeric series out, with the first `lookback()` values `NaN`
//! during warmup. Indicators are agnostic to whether the series is daily or
//! weekly bars — the weekly signal generator feeds them `WeeklyBar`-derived
//! `Bar`s produced by `weekly::weekly_resample`.
//!
//! # Look-ahead guard
//! No indicator value at index t may depend on data at index t+1 or later.
//! `tests::lookahead` in the runner crate exercises this by truncating a
//! series and checking earlier values are unchanged.

pub mod atr;
pub mod rsi;
pub mod sma;
pub mod weekly;

pub use atr::Atr;
pub use rsi::Rsi;
pub use sma::Sma;
pub use weekly::{weekly_resample, WeeklyBar};

use crate::domain::Bar;
use std::collections::HashMap;

/// Trait for indicators.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_10", "atr_14").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series. Returns a `Vec<f64>`
    /// of the same length as `bars`; the first `lookback()` entries are `NaN`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Container for precomputed indicator values, keyed by name then bar index.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.series.insert(name.into(), values);
    }

    pub fn get(&self, name: &str, bar_index: usize) -> Option<f64> {
        self.series.get(name).and_then(|v| v.get(bar_index).copied())
    }

    pub fn get_series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }
}

/// Create synthetic daily bars from close prices, for indicator unit tests.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                symbol: "TEST".to_string(),
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high,
                low,
                close,
                volume: 1_000,
            }
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
