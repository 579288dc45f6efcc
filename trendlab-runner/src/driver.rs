//! The week driver: calendar orchestration around the engine's per-day loop.
//!
//! Owns the calendar and the `EngineState`; on each iteration it builds a
//! lookahead-safe market snapshot, asks the signal generator for a plan,
//! registers pending entries, applies manual exits, then steps the engine
//! day by day through the week.

use crate::config::{PlanMode, RunConfig, SizingMode};
use crate::provider::{Provider, ProviderError};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::HashMap;
use thiserror::Error;
use trendlab_core::domain::{Bar, ClosedTrade, EquityPoint, PendingEntry, Symbol};
use trendlab_core::engine::{self, EngineConfig, EngineState};
use trendlab_core::signal::{self, OpenPositionView, WeeklyPlan};
use trendlab_core::sizing::{size_position, size_position_fixed};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Engine(#[from] engine::EngineError),
    #[error("no data for any symbol in the universe")]
    NoDataForUniverse,
}

/// The full output of a single backtest run, ready for the reporter.
pub struct DriverOutput {
    pub equity_curve: Vec<EquityPoint>,
    pub closed_trades: Vec<ClosedTrade>,
    pub weekly_plans: Vec<WeeklyPlan>,
}

/// History lookback ahead of `from_date`, to give indicators warmup room
/// without the driver guessing at trading-calendar density.
const HISTORY_LOOKBACK_DAYS: i64 = 600;

/// Run a complete backtest over `config.from_date..=config.to_date`.
pub fn run_backtest(
    config: &RunConfig,
    provider: &dyn Provider,
    static_plan: Option<&WeeklyPlan>,
) -> Result<DriverOutput, DriverError> {
    let strategy = config.strategy_config();
    let risk = config.risk_config();
    let exit_mode = config.exit_mode();
    let engine_cfg = EngineConfig { exit_mode, tie_breaker: config.tie_breaker(), fee_per_trade: risk.fee_per_trade };

    let history = load_full_history(config, provider)?;
    if history.values().all(|bars| bars.is_empty()) {
        return Err(DriverError::NoDataForUniverse);
    }

    let mut state = EngineState::new(config.initial_cash);
    let mut weekly_plans = Vec::new();

    let mut week_start = first_monday_on_or_after(config.from_date);
    while week_start <= config.to_date {
        let next_week_start = week_start + Duration::weeks(1);

        let market_snapshot = snapshot_before(&history, week_start);
        let open_positions_view = open_positions_view(&state);

        let plan = match config.plan_mode() {
            PlanMode::Generate => {
                signal::generate(&market_snapshot, &open_positions_view, &strategy, &risk, exit_mode, week_start)
            }
            PlanMode::Plan => {
                let mut p = static_plan.cloned().unwrap_or(WeeklyPlan {
                    week_start,
                    strategy_id: "static".to_string(),
                    strategy_version: 1,
                    recommendations: Vec::new(),
                });
                p.week_start = week_start;
                p
            }
        };

        register_pending_entries(&mut state, &plan, week_start, config.sizing_mode(), config.order_size);

        let week_bars = week_bars(&history, week_start, next_week_start, config.to_date);
        let exec_prices = week_start_exec_prices(&week_bars, &state);
        engine::apply_manual_exits(&mut state, &plan, &exec_prices, &engine_cfg, week_start)?;

        for day in trading_days_in(&week_bars) {
            let today: HashMap<Symbol, Bar> =
                week_bars.iter().filter_map(|(s, bars)| bars.iter().find(|b| b.date == day).map(|b| (s.clone(), b.clone()))).collect();
            if today.is_empty() {
                continue;
            }
            engine::process_day(&mut state, &today, &engine_cfg, week_start)?;
        }

        // Default policy: cancel unfilled pending entries at week end.
        state.pending_entries.clear();

        weekly_plans.push(plan);
        week_start = next_week_start;
    }

    if let Some(last_day) = state.equity_curve.last().map(|p| p.date) {
        engine::timeout_close_all(&mut state, last_day, &engine_cfg);
    }

    Ok(DriverOutput { equity_curve: state.equity_curve, closed_trades: state.closed_trades, weekly_plans })
}

fn load_full_history(config: &RunConfig, provider: &dyn Provider) -> Result<HashMap<Symbol, Vec<Bar>>, ProviderError> {
    let lookback_start = config.from_date - Duration::days(HISTORY_LOOKBACK_DAYS);
    let mut out = HashMap::new();
    for symbol in &config.universe {
        let bars = provider.get_daily_history(symbol, lookback_start, config.to_date)?;
        out.insert(symbol.clone(), bars);
    }
    Ok(out)
}

fn snapshot_before(history: &HashMap<Symbol, Vec<Bar>>, week_start: NaiveDate) -> HashMap<Symbol, Vec<Bar>> {
    history
        .iter()
        .map(|(symbol, bars)| (symbol.clone(), bars.iter().filter(|b| b.date < week_start).cloned().collect()))
        .collect()
}

fn week_bars(
    history: &HashMap<Symbol, Vec<Bar>>,
    week_start: NaiveDate,
    next_week_start: NaiveDate,
    to_date: NaiveDate,
) -> HashMap<Symbol, Vec<Bar>> {
    let end = next_week_start.min(to_date + Duration::days(1));
    history
        .iter()
        .map(|(symbol, bars)| (symbol.clone(), bars.iter().filter(|b| b.date >= week_start && b.date < end).cloned().collect()))
        .collect()
}

fn trading_days_in(week_bars: &HashMap<Symbol, Vec<Bar>>) -> Vec<NaiveDate> {
    let mut days: Vec<NaiveDate> = week_bars.values().flat_map(|bars| bars.iter().map(|b| b.date)).collect();
    days.sort();
    days.dedup();
    days
}

fn open_positions_view(state: &EngineState) -> HashMap<Symbol, OpenPositionView> {
    state
        .open_trades
        .iter()
        .map(|(symbol, trade)| (symbol.clone(), OpenPositionView { qty: trade.qty, entry_price: trade.entry_price }))
        .collect()
}

fn register_pending_entries(
    state: &mut EngineState,
    plan: &WeeklyPlan,
    week_start: NaiveDate,
    sizing_mode: SizingMode,
    order_size: i64,
) {
    let equity = state.equity();
    for rec in &plan.recommendations {
        if rec.action != signal::Action::Buy {
            continue;
        }
        let (Some(entry_price), Some(stop_loss), Some(take_profit), Some(target_pct)) =
            (rec.entry_price, rec.stop_loss, rec.take_profit, rec.position_target_pct)
        else {
            continue;
        };

        let qty = match sizing_mode {
            SizingMode::RiskBased => size_position(equity, entry_price, target_pct, state.cash),
            SizingMode::FixedSize => size_position_fixed(order_size, entry_price, state.cash),
        };
        if qty == 0 {
            tracing::debug!(symbol = %rec.symbol, "sizing rejected buy recommendation");
            continue;
        }

        let entry_type = match rec.entry_type {
            signal::EntryKind::Breakout => trendlab_core::domain::EntryType::Breakout,
            signal::EntryKind::Pullback => trendlab_core::domain::EntryType::Pullback,
            signal::EntryKind::None => continue,
        };

        state.pending_entries.insert(
            rec.symbol.clone(),
            PendingEntry {
                symbol: rec.symbol.clone(),
                entry_price,
                stop_loss,
                take_profit,
                target_qty: qty,
                entry_type,
                earliest_fill_date: rec.earliest_fill_date.unwrap_or(week_start),
                expires_at: week_start + Duration::weeks(1),
            },
        );
    }
}

fn week_start_exec_prices(week_bars: &HashMap<Symbol, Vec<Bar>>, state: &EngineState) -> HashMap<Symbol, (NaiveDate, f64)> {
    let mut out = HashMap::new();
    for symbol in state.open_trades.keys() {
        if let Some(bars) = week_bars.get(symbol) {
            if let Some(first) = bars.iter().min_by_key(|b| b.date) {
                out.insert(symbol.clone(), (first.date, first.open));
            }
        }
    }
    out
}

/// First ISO-week Monday on or after `date`.
fn first_monday_on_or_after(date: NaiveDate) -> NaiveDate {
    let iso = date.iso_week();
    let monday = NaiveDate::from_isoywd_opt(iso.year(), iso.week(), Weekday::Mon)
        .expect("valid ISO year/week always has a Monday");
    if monday >= date {
        monday
    } else {
        monday + Duration::weeks(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_monday_on_or_after_a_monday_is_itself() {
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(first_monday_on_or_after(monday), monday);
    }

    #[test]
    fn first_monday_on_or_after_a_wednesday_advances() {
        let wednesday = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(first_monday_on_or_after(wednesday), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
    }

    /// A steady uptrend with no prior position, long enough to clear the
    /// 30-week warmup and trigger a pullback BUY recommendation.
    fn daily_uptrend(symbol: &str, weeks: usize) -> Vec<Bar> {
        let mut bars = Vec::new();
        let mut date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let mut close = 50.0;
        for _ in 0..weeks {
            for _ in 0..5 {
                let open = close;
                close += 0.6;
                bars.push(Bar { symbol: symbol.to_string(), date, open, high: close + 0.5, low: open - 0.5, close, volume: 10_000 });
                date += Duration::days(1);
            }
            date += Duration::days(2);
        }
        bars
    }

    fn buy_plan(week_start: NaiveDate) -> WeeklyPlan {
        let mut market = HashMap::new();
        market.insert("AAA".to_string(), daily_uptrend("AAA", 40));
        let plan = signal::generate(
            &market,
            &HashMap::new(),
            &signal::StrategyConfig::default(),
            &signal::RiskConfig::default(),
            engine::ExitMode::TpslOnly,
            week_start,
        );
        assert!(plan.recommendations.iter().any(|r| r.action == signal::Action::Buy), "fixture should produce a BUY");
        plan
    }

    #[test]
    fn risk_based_sizing_uses_target_pct() {
        let mut state = EngineState::new(10_000_000);
        let week_start = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let plan = buy_plan(week_start);
        let rec = plan.recommendations.iter().find(|r| r.action == signal::Action::Buy).unwrap();
        let expected_qty = size_position(10_000_000, rec.entry_price.unwrap(), rec.position_target_pct.unwrap(), 10_000_000);

        register_pending_entries(&mut state, &plan, week_start, SizingMode::RiskBased, 1_000_000);
        let entry = state.pending_entries.get("AAA").expect("pending entry registered");
        assert_eq!(entry.target_qty, expected_qty);
    }

    #[test]
    fn fixed_size_sizing_ignores_target_pct() {
        let mut state = EngineState::new(10_000_000);
        let week_start = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();
        let plan = buy_plan(week_start);
        let rec = plan.recommendations.iter().find(|r| r.action == signal::Action::Buy).unwrap();
        let expected_qty = size_position_fixed(1_000_000, rec.entry_price.unwrap(), 10_000_000);
        assert_ne!(
            expected_qty,
            size_position(10_000_000, rec.entry_price.unwrap(), rec.position_target_pct.unwrap(), 10_000_000)
        );

        register_pending_entries(&mut state, &plan, week_start, SizingMode::FixedSize, 1_000_000);
        let entry = state.pending_entries.get("AAA").expect("pending entry registered");
        assert_eq!(entry.target_qty, expected_qty);
    }
}
