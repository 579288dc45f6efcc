//! TrendLab Core — the weekly backtest engine, its domain types, indicators,
//! and the portfolio-aware signal generator that feeds it.
//!
//! - Domain types (bars, pending entries, open/closed trades, equity points)
//! - Pure indicator functions (weekly resample, SMA, RSI, ATR)
//! - The signal generator: a pure function of market data, open positions,
//!   and config — never buy-and-hold by construction
//! - Position sizing
//! - The per-day engine event loop

pub mod domain;
pub mod engine;
pub mod indicators;
pub mod signal;
pub mod sizing;
