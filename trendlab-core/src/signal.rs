//! The weekly, portfolio-aware signal generator.
//!
//! `generate` is a pure function of `(market_data_by_symbol, open_positions_view,
//! config, as_of_week_start)`. Taking the open-positions view as a required
//! parameter is load-bearing: a generator that can be called without knowing
//! what's already held degenerates into buy-and-hold, since it can never emit
//! HOLD/REDUCE/SELL for a symbol it doesn't know is open.

use crate::domain::{Bar, Symbol};
use crate::engine::config::ExitMode;
use crate::indicators::{weekly_resample, Atr, Indicator, IndicatorValues, Rsi, Sma};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Recommended action for a symbol this week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Buy,
    Hold,
    Reduce,
    Sell,
    Watch,
}

/// How a BUY's entry was sourced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Breakout,
    Pullback,
    None,
}

/// One symbol's recommendation for the week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub symbol: Symbol,
    pub action: Action,
    pub entry_type: EntryKind,
    pub entry_price: Option<f64>,
    pub buy_zone_low: Option<f64>,
    pub buy_zone_high: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub position_target_pct: Option<f64>,
    pub earliest_fill_date: Option<NaiveDate>,
    pub rationale: String,
    /// BUY ordering key (`rsi14` at generation time). Not part of the
    /// persisted report surface.
    #[serde(skip)]
    rsi_sort_key: f64,
}

/// The generator's output for one ISO week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyPlan {
    pub week_start: NaiveDate,
    pub strategy_id: String,
    pub strategy_version: u32,
    /// BUY first, then HOLD, REDUCE, SELL, WATCH.
    pub recommendations: Vec<Recommendation>,
}

/// A held position as the generator sees it — no engine internals leak through.
#[derive(Debug, Clone, Copy)]
pub struct OpenPositionView {
    pub qty: u64,
    pub entry_price: f64,
}

/// Strategy parameters (§6 configuration schema).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub ma_short: usize,
    pub ma_long: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub atr_stop_mult: f64,
    pub atr_target_mult: f64,
    pub breakout_volume_window: usize,
    pub max_buys_per_week: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            ma_short: 10,
            ma_long: 30,
            rsi_period: 14,
            atr_period: 14,
            atr_stop_mult: 1.5,
            atr_target_mult: 2.5,
            breakout_volume_window: 14,
            max_buys_per_week: 4,
        }
    }
}

/// Risk parameters (§6 configuration schema).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskConfig {
    pub risk_per_trade_pct: f64,
    pub min_alloc_pct: f64,
    pub max_alloc_pct: f64,
    pub fee_per_trade: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: 0.01,
            min_alloc_pct: 0.03,
            max_alloc_pct: 0.15,
            fee_per_trade: 0,
        }
    }
}

struct WeeklySeries {
    closes: Vec<f64>,
    volumes: Vec<f64>,
    highs: Vec<f64>,
    /// Precomputed indicator series, keyed by name and looked up by bar
    /// index rather than threaded through as separate struct fields.
    indicators: IndicatorValues,
}

fn as_f64_volumes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.volume as f64).collect()
}

fn build_weekly_series(daily: &[Bar], strategy: &StrategyConfig) -> Option<WeeklySeries> {
    let weekly = weekly_resample(daily);
    if weekly.len() < 30 {
        return None;
    }
    let as_bars = crate::indicators::weekly::as_bars(&weekly);

    let ma_short = Sma::new(strategy.ma_short).compute(&as_bars);
    let ma_long = Sma::new(strategy.ma_long).compute(&as_bars);
    let rsi = Rsi::new(strategy.rsi_period).compute(&as_bars);
    let atr = Atr::new(strategy.atr_period).compute(&as_bars);

    let volumes = as_f64_volumes(&as_bars);
    let vol_avg = {
        let n = volumes.len();
        let w = strategy.breakout_volume_window;
        let mut out = vec![f64::NAN; n];
        if n >= w && w > 0 {
            let mut sum: f64 = volumes[..w].iter().sum();
            out[w - 1] = sum / w as f64;
            for i in w..n {
                sum += volumes[i] - volumes[i - w];
                out[i] = sum / w as f64;
            }
        }
        out
    };

    let mut indicators = IndicatorValues::new();
    indicators.insert("ma_short", ma_short);
    indicators.insert("ma_long", ma_long);
    indicators.insert("rsi", rsi);
    indicators.insert("atr", atr);
    indicators.insert("vol_avg", vol_avg);

    Some(WeeklySeries {
        closes: as_bars.iter().map(|b| b.close).collect(),
        volumes,
        highs: as_bars.iter().map(|b| b.high).collect(),
        indicators,
    })
}

fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// Generate the weekly plan from daily bars (already filtered to `date <
/// as_of_week_start` by the caller), the currently-open positions, and config.
pub fn generate(
    market_data_by_symbol: &HashMap<Symbol, Vec<Bar>>,
    open_positions_view: &HashMap<Symbol, OpenPositionView>,
    strategy: &StrategyConfig,
    risk: &RiskConfig,
    exit_mode: ExitMode,
    as_of_week_start: NaiveDate,
) -> WeeklyPlan {
    let mut buys = Vec::new();
    let mut others = Vec::new();

    let mut symbols: Vec<&Symbol> = market_data_by_symbol.keys().collect();
    symbols.sort();

    for symbol in symbols {
        let daily = &market_data_by_symbol[symbol];
        let Some(series) = build_weekly_series(daily, strategy) else {
            tracing::debug!(symbol = %symbol, "skipped: insufficient weekly history");
            continue;
        };
        let last = series.closes.len() - 1;
        let prev = last - 1;

        let price = series.closes[last];
        let ma10 = series.indicators.get("ma_short", last).unwrap_or(f64::NAN);
        let ma30 = series.indicators.get("ma_long", last).unwrap_or(f64::NAN);
        let rsi14 = series.indicators.get("rsi", last).unwrap_or(f64::NAN);
        let atr14 = series.indicators.get("atr", last).unwrap_or(f64::NAN);
        let vol14 = series.indicators.get("vol_avg", last).unwrap_or(f64::NAN);

        if [price, ma10, ma30, rsi14, atr14, vol14].iter().any(|v| v.is_nan()) {
            tracing::debug!(symbol = %symbol, "skipped: NaN indicator value");
            continue;
        }

        let held = open_positions_view.get(symbol.as_str());

        let trend_up = price > ma10 && ma10 > ma30;
        let trend_weakening = ma30 < price && price <= ma10;
        let trend_down = price <= ma30;
        let rsi_bullish = rsi14 >= 50.0;
        let rsi_overbought = rsi14 >= 70.0;

        let breakout_confirmed = price >= series.highs[prev]
            && series.volumes[last] >= vol14
            && trend_up
            && rsi_bullish
            && !rsi_overbought;

        let rec = if breakout_confirmed && held.is_none() {
            let entry_price = series.highs[prev] * 1.001;
            Some(buy_recommendation(
                symbol.clone(),
                entry_price,
                atr14,
                rsi14,
                strategy,
                risk,
                EntryKind::Breakout,
                Some(entry_price),
                Some(entry_price),
                Some(monday_of_next_week(as_of_week_start)),
                "confirmed breakout above prior week high with supporting volume and trend",
            ))
        } else if trend_up && !rsi_overbought && held.is_none() {
            let zone_low = price - 1.0 * atr14;
            let zone_high = price - 0.5 * atr14;
            let entry_price = (zone_low + zone_high) / 2.0;
            Some(buy_recommendation(
                symbol.clone(),
                entry_price,
                atr14,
                rsi14,
                strategy,
                risk,
                EntryKind::Pullback,
                Some(zone_low),
                Some(zone_high),
                None,
                "uptrend pullback entry zone",
            ))
        } else if trend_up && held.is_some() {
            Some(watchless(symbol.clone(), Action::Hold, "uptrend intact, position held"))
        } else if trend_weakening && held.is_some() {
            let action = if exit_mode == ExitMode::FourAction { Action::Reduce } else { Action::Hold };
            let rationale = if action == Action::Reduce {
                "trend weakening while held: reduce exposure"
            } else {
                "trend weakening while held: hold (reduce mode not active)"
            };
            Some(watchless(symbol.clone(), action, rationale))
        } else if trend_down && held.is_some() {
            Some(watchless(symbol.clone(), Action::Sell, "trend broken while held"))
        } else {
            Some(watchless(symbol.clone(), Action::Watch, "no qualifying setup"))
        };

        match rec {
            Some(r) if r.action == Action::Buy => buys.push(r),
            Some(r) => others.push(r),
            None => {}
        }
    }

    // Descending rsi14 requires carrying it alongside; recompute via rationale-free sort key.
    buys.sort_by(|a, b| {
        let rsi_a = rsi_of(a);
        let rsi_b = rsi_of(b);
        match rsi_b.partial_cmp(&rsi_a).unwrap_or(Ordering::Equal) {
            Ordering::Equal => {
                let sa = stop_distance_pct(a);
                let sb = stop_distance_pct(b);
                sa.partial_cmp(&sb).unwrap_or(Ordering::Equal)
            }
            other => other,
        }
    });
    buys.truncate(strategy.max_buys_per_week);

    let mut recommendations = buys;
    recommendations.extend(others);

    WeeklyPlan {
        week_start: as_of_week_start,
        strategy_id: "trendlab-weekly".to_string(),
        strategy_version: 1,
        recommendations,
    }
}

fn rsi_of(rec: &Recommendation) -> f64 {
    rec.rsi_sort_key
}

fn stop_distance_pct(rec: &Recommendation) -> f64 {
    match (rec.entry_price, rec.stop_loss) {
        (Some(entry), Some(stop)) if entry > 0.0 => (entry - stop) / entry,
        _ => f64::MAX,
    }
}

fn monday_of_next_week(week_start: NaiveDate) -> NaiveDate {
    week_start + chrono::Duration::weeks(1)
}

#[allow(clippy::too_many_arguments)]
fn buy_recommendation(
    symbol: Symbol,
    entry_price: f64,
    atr14: f64,
    rsi14: f64,
    strategy: &StrategyConfig,
    risk: &RiskConfig,
    entry_type: EntryKind,
    buy_zone_low: Option<f64>,
    buy_zone_high: Option<f64>,
    earliest_fill_date: Option<NaiveDate>,
    rationale: &str,
) -> Recommendation {
    let stop_loss = entry_price - strategy.atr_stop_mult * atr14;
    let take_profit = entry_price + strategy.atr_target_mult * atr14;
    let stop_distance_pct = (entry_price - stop_loss) / entry_price;
    let position_target_pct = clamp(
        risk.risk_per_trade_pct / stop_distance_pct,
        risk.min_alloc_pct,
        risk.max_alloc_pct,
    );

    Recommendation {
        symbol,
        action: Action::Buy,
        entry_type,
        entry_price: Some(entry_price),
        buy_zone_low,
        buy_zone_high,
        stop_loss: Some(stop_loss),
        take_profit: Some(take_profit),
        position_target_pct: Some(position_target_pct),
        earliest_fill_date,
        rationale: rationale.to_string(),
        rsi_sort_key: rsi14,
    }
}

fn watchless(symbol: Symbol, action: Action, rationale: &str) -> Recommendation {
    Recommendation {
        symbol,
        action,
        entry_type: EntryKind::None,
        entry_price: None,
        buy_zone_low: None,
        buy_zone_high: None,
        stop_loss: None,
        take_profit: None,
        position_target_pct: None,
        earliest_fill_date: None,
        rationale: rationale.to_string(),
        rsi_sort_key: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn daily_uptrend(symbol: &str, weeks: usize) -> Vec<Bar> {
        let mut bars = Vec::new();
        let mut date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let mut close = 50.0;
        for _ in 0..weeks {
            for _ in 0..5 {
                let open = close;
                close += 0.6;
                bars.push(Bar {
                    symbol: symbol.to_string(),
                    date,
                    open,
                    high: close + 0.5,
                    low: open - 0.5,
                    close,
                    volume: 10_000,
                });
                date += chrono::Duration::days(1);
            }
            // skip weekends
            date += chrono::Duration::days(2);
        }
        bars
    }

    fn daily_downtrend(symbol: &str, weeks: usize) -> Vec<Bar> {
        let mut bars = Vec::new();
        let mut date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let mut close = 100.0;
        for _ in 0..weeks {
            for _ in 0..5 {
                let open = close;
                close -= 0.6;
                bars.push(Bar {
                    symbol: symbol.to_string(),
                    date,
                    open,
                    high: open + 0.5,
                    low: close - 0.5,
                    close,
                    volume: 10_000,
                });
                date += chrono::Duration::days(1);
            }
            date += chrono::Duration::days(2);
        }
        bars
    }

    #[test]
    fn insufficient_history_is_skipped() {
        let mut market = HashMap::new();
        market.insert("AAA".to_string(), daily_uptrend("AAA", 5));
        let plan = generate(
            &market,
            &HashMap::new(),
            &StrategyConfig::default(),
            &RiskConfig::default(),
            ExitMode::TpslOnly,
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
        );
        assert!(plan.recommendations.is_empty());
    }

    #[test]
    fn uptrend_not_held_emits_buy_with_valid_invariants() {
        let mut market = HashMap::new();
        market.insert("AAA".to_string(), daily_uptrend("AAA", 40));
        let plan = generate(
            &market,
            &HashMap::new(),
            &StrategyConfig::default(),
            &RiskConfig::default(),
            ExitMode::TpslOnly,
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
        );
        assert_eq!(plan.recommendations.len(), 1);
        let rec = &plan.recommendations[0];
        assert_eq!(rec.action, Action::Buy);
        let entry = rec.entry_price.unwrap();
        let stop = rec.stop_loss.unwrap();
        let target = rec.take_profit.unwrap();
        assert!(stop < entry);
        assert!(target > entry);
        let pct = rec.position_target_pct.unwrap();
        assert!(pct >= 0.03 && pct <= 0.15);
    }

    #[test]
    fn held_symbol_never_receives_buy() {
        let mut market = HashMap::new();
        market.insert("AAA".to_string(), daily_uptrend("AAA", 40));
        let mut open = HashMap::new();
        open.insert("AAA".to_string(), OpenPositionView { qty: 100, entry_price: 50.0 });
        let plan = generate(
            &market,
            &open,
            &StrategyConfig::default(),
            &RiskConfig::default(),
            ExitMode::TpslOnly,
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
        );
        assert_eq!(plan.recommendations.len(), 1);
        assert_ne!(plan.recommendations[0].action, Action::Buy);
        assert_eq!(plan.recommendations[0].action, Action::Hold);
    }

    #[test]
    fn downtrend_held_emits_sell() {
        let mut market = HashMap::new();
        market.insert("AAA".to_string(), daily_downtrend("AAA", 40));
        let mut open = HashMap::new();
        open.insert("AAA".to_string(), OpenPositionView { qty: 100, entry_price: 90.0 });
        let plan = generate(
            &market,
            &open,
            &StrategyConfig::default(),
            &RiskConfig::default(),
            ExitMode::TpslOnly,
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
        );
        assert_eq!(plan.recommendations[0].action, Action::Sell);
    }

    #[test]
    fn max_buys_per_week_caps_output() {
        let mut strategy = StrategyConfig::default();
        strategy.max_buys_per_week = 1;
        let mut market = HashMap::new();
        market.insert("AAA".to_string(), daily_uptrend("AAA", 40));
        market.insert("BBB".to_string(), daily_uptrend("BBB", 40));
        let plan = generate(
            &market,
            &HashMap::new(),
            &strategy,
            &RiskConfig::default(),
            ExitMode::TpslOnly,
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
        );
        let buys = plan.recommendations.iter().filter(|r| r.action == Action::Buy).count();
        assert_eq!(buys, 1);
    }

    proptest::proptest! {
        /// A held symbol must never receive a BUY, across randomized drift,
        /// noise, and held/not-held assignment. This is the portfolio-awareness
        /// contract the generator exists to enforce.
        #[test]
        fn held_symbols_never_recommended_buy(
            drift in -1.0f64..1.5,
            noise_seed in 0u64..1000,
            weeks in 30usize..60,
            held in proptest::bool::ANY,
        ) {
            let mut bars = Vec::new();
            let mut date = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
            let mut close = 80.0_f64;
            let mut i: u64 = noise_seed;
            for _ in 0..weeks {
                for _ in 0..5 {
                    let open = close;
                    i = i.wrapping_mul(6364136223846793005).wrapping_add(1);
                    let wiggle = ((i >> 40) % 100) as f64 / 100.0 - 0.5;
                    close = (close + drift + wiggle).max(1.0);
                    bars.push(Bar {
                        symbol: "AAA".to_string(),
                        date,
                        open,
                        high: open.max(close) + 0.3,
                        low: open.min(close) - 0.3,
                        close,
                        volume: 10_000,
                    });
                    date += chrono::Duration::days(1);
                }
                date += chrono::Duration::days(2);
            }

            let mut market = HashMap::new();
            market.insert("AAA".to_string(), bars);
            let mut open = HashMap::new();
            if held {
                open.insert("AAA".to_string(), OpenPositionView { qty: 100, entry_price: 50.0 });
            }

            let plan = generate(
                &market,
                &open,
                &StrategyConfig::default(),
                &RiskConfig::default(),
                ExitMode::FourAction,
                date,
            );

            if held {
                for rec in &plan.recommendations {
                    prop_assert_ne!(rec.action, Action::Buy);
                }
            }
        }
    }
}
