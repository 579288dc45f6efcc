//! Engine-level configuration: exit management mode and same-bar tie-break policy.

use serde::{Deserialize, Serialize};

/// Exit management policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitMode {
    /// Mechanical: automatic stop-loss / take-profit touch closes the trade.
    TpslOnly,
    /// Automatic SL/TP disabled; a SELL signal closes the whole position.
    ThreeAction,
    /// Automatic SL/TP disabled; REDUCE halves the position, SELL closes it.
    FourAction,
}

/// Policy for same-bar SL-and-TP events under `tpsl_only`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreaker {
    /// Pessimistic: stop-loss resolves first.
    Worst,
    /// Optimistic: take-profit resolves first.
    Best,
}

/// Per-run engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub exit_mode: ExitMode,
    pub tie_breaker: TieBreaker,
    /// Flat per-trade fee, applied symmetrically on entry and on exit.
    pub fee_per_trade: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exit_mode: ExitMode::TpslOnly,
            tie_breaker: TieBreaker::Worst,
            fee_per_trade: 0,
        }
    }
}
