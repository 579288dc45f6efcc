//! Serializable run configuration: strategy, risk, exit mode, and date range.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use trendlab_core::engine::{ExitMode, TieBreaker};
use trendlab_core::signal::{RiskConfig, StrategyConfig};

/// Content-addressable identifier for a run configuration.
pub type RunId = String;

/// Which source the week driver pulls recommendations from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanMode {
    /// Compute recommendations fresh every week.
    Generate,
    /// Reuse a single static plan for every week (requires `--plan-file`).
    Plan,
}

/// Everything needed to reproduce a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub initial_cash: i64,
    pub order_size: i64,
    pub trades_per_week: usize,
    pub universe: Vec<String>,
    pub strategy: StrategyParams,
    pub risk: RiskParams,
    pub tie_breaker: TieBreakerParam,
    pub exit_mode: ExitModeParam,
    pub plan_mode: PlanMode,
    pub sizing_mode: SizingMode,
}

impl RunConfig {
    /// Deterministic content hash of this configuration.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("RunConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }

    pub fn strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            ma_short: self.strategy.ma_short,
            ma_long: self.strategy.ma_long,
            rsi_period: self.strategy.rsi_period,
            atr_period: self.strategy.atr_period,
            atr_stop_mult: self.strategy.atr_stop_mult,
            atr_target_mult: self.strategy.atr_target_mult,
            breakout_volume_window: self.strategy.breakout_volume_window,
            max_buys_per_week: self.trades_per_week,
        }
    }

    pub fn risk_config(&self) -> RiskConfig {
        RiskConfig {
            risk_per_trade_pct: self.risk.risk_per_trade_pct,
            min_alloc_pct: self.risk.min_alloc_pct,
            max_alloc_pct: self.risk.max_alloc_pct,
            fee_per_trade: self.risk.fee_per_trade,
        }
    }

    pub fn exit_mode(&self) -> ExitMode {
        match self.exit_mode {
            ExitModeParam::TpslOnly => ExitMode::TpslOnly,
            ExitModeParam::ThreeAction => ExitMode::ThreeAction,
            ExitModeParam::FourAction => ExitMode::FourAction,
        }
    }

    pub fn tie_breaker(&self) -> TieBreaker {
        match self.tie_breaker {
            TieBreakerParam::Worst => TieBreaker::Worst,
            TieBreakerParam::Best => TieBreaker::Best,
        }
    }

    pub fn plan_mode(&self) -> PlanMode {
        self.plan_mode
    }

    pub fn sizing_mode(&self) -> SizingMode {
        self.sizing_mode
    }
}

/// Mirrors `trendlab_core::signal::StrategyConfig` for config-file ergonomics
/// (serde field names match the CLI/file schema rather than the core type's).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StrategyParams {
    pub ma_short: usize,
    pub ma_long: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub atr_stop_mult: f64,
    pub atr_target_mult: f64,
    pub breakout_volume_window: usize,
}

impl Default for StrategyParams {
    fn default() -> Self {
        let d = StrategyConfig::default();
        Self {
            ma_short: d.ma_short,
            ma_long: d.ma_long,
            rsi_period: d.rsi_period,
            atr_period: d.atr_period,
            atr_stop_mult: d.atr_stop_mult,
            atr_target_mult: d.atr_target_mult,
            breakout_volume_window: d.breakout_volume_window,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskParams {
    pub risk_per_trade_pct: f64,
    pub min_alloc_pct: f64,
    pub max_alloc_pct: f64,
    pub fee_per_trade: i64,
}

impl Default for RiskParams {
    fn default() -> Self {
        let d = RiskConfig::default();
        Self {
            risk_per_trade_pct: d.risk_per_trade_pct,
            min_alloc_pct: d.min_alloc_pct,
            max_alloc_pct: d.max_alloc_pct,
            fee_per_trade: d.fee_per_trade,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreakerParam {
    Worst,
    Best,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitModeParam {
    TpslOnly,
    ThreeAction,
    FourAction,
}

/// How a BUY recommendation's quantity is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    /// `position_target_pct` from the recommendation, scaled by equity.
    RiskBased,
    /// A flat `order_size` (VND) per entry, regardless of the recommendation's
    /// risk-based sizing hint.
    FixedSize,
}

impl Default for SizingMode {
    fn default() -> Self {
        SizingMode::RiskBased
    }
}

/// Errors raised while assembling or validating a `RunConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("--from must be <= --to (got {from} > {to})")]
    InvalidDateRange { from: NaiveDate, to: NaiveDate },
    #[error("failed to read universe file {path}: {source}")]
    UniverseUnreadable { path: String, source: std::io::Error },
    #[error("universe file {path} contained no symbols")]
    EmptyUniverseFile { path: String },
    #[error("--mode plan requires --plan-file")]
    PlanFileRequired,
}

/// Parse a newline-separated universe file (`#`-prefixed lines are comments).
pub fn parse_universe(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Builtin universe used when `--universe` is empty or unreadable.
pub const DEFAULT_UNIVERSE: &[&str] = &["VNM", "VCB", "HPG", "FPT", "MWG"];

/// Validate `--from <= --to`.
pub fn validate_date_range(from: NaiveDate, to: NaiveDate) -> Result<(), ConfigError> {
    if from > to {
        return Err(ConfigError::InvalidDateRange { from, to });
    }
    Ok(())
}

/// Validate that `--mode plan` was given a `--plan-file`.
pub fn validate_plan_mode(plan_mode: PlanMode, plan_file: Option<&std::path::Path>) -> Result<(), ConfigError> {
    if matches!(plan_mode, PlanMode::Plan) && plan_file.is_none() {
        return Err(ConfigError::PlanFileRequired);
    }
    Ok(())
}

/// Load the universe from `path`, falling back to [`DEFAULT_UNIVERSE`] when
/// `path` is `None`.
pub fn load_universe(path: Option<&std::path::Path>) -> Result<Vec<String>, ConfigError> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .map_err(|source| ConfigError::UniverseUnreadable { path: path.display().to_string(), source })?;
            let universe = parse_universe(&contents);
            if universe.is_empty() {
                return Err(ConfigError::EmptyUniverseFile { path: path.display().to_string() });
            }
            Ok(universe)
        }
        None => Ok(DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect()),
    }
}
