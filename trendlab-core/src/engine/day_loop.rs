//! The per-day event loop: fill pending entries, evaluate exits, mark equity.
//!
//! Ordering guarantees (§5 / §8 of the design): within a day, fills happen
//! before exits, and within each phase symbols are visited in lexicographic
//! order. This is synchronous and pure with respect to (candle, prior state)
//! — no suspension points, no randomness.

use crate::domain::{Bar, ClosedTrade, ExitReason, OpenTrade, Symbol};
use crate::engine::config::{EngineConfig, ExitMode, TieBreaker};
use crate::engine::state::EngineState;
use crate::signal::{Action, WeeklyPlan};
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

/// A fatal, programming-error-class invariant violation. The driver aborts
/// the run on this, identifying the offending symbol and week.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("invariant violation for {symbol} in week of {week}: {detail}")]
pub struct EngineError {
    pub symbol: String,
    pub week: NaiveDate,
    pub detail: String,
}

fn sorted_keys<'a, V>(map: &'a HashMap<Symbol, V>) -> Vec<&'a Symbol> {
    let mut keys: Vec<&Symbol> = map.keys().collect();
    keys.sort();
    keys
}

/// Process a single trading day across all symbols with a bar today.
///
/// `today` maps symbol -> that symbol's bar for this date. Symbols with no
/// bar today are simply absent (data gaps tolerated per-symbol).
pub fn process_day(
    state: &mut EngineState,
    today: &HashMap<Symbol, Bar>,
    cfg: &EngineConfig,
    week: NaiveDate,
) -> Result<(), EngineError> {
    // Phase 1: fill pending entries, lexicographic order.
    let pending_symbols: Vec<Symbol> = sorted_keys(&state.pending_entries).into_iter().cloned().collect();
    for symbol in pending_symbols {
        let Some(bar) = today.get(&symbol) else { continue };
        let expired = state.pending_entries[&symbol].expired_on(bar.date);
        let eligible = state.pending_entries[&symbol].eligible_on(bar.date);
        let touched = eligible && state.pending_entries[&symbol].touched_by(bar.low, bar.high);

        if touched {
            let entry = state.pending_entries.get(&symbol).unwrap().clone();
            let cost = (entry.target_qty as f64 * entry.entry_price).round() as i64 + cfg.fee_per_trade;
            if state.cash - cost < 0 {
                // Sizing rejection: drop the pending entry silently, log at debug.
                tracing::debug!(symbol = %symbol, "fill rejected: insufficient cash");
                state.pending_entries.remove(&symbol);
                continue;
            }
            if state.open_trades.contains_key(&symbol) {
                return Err(EngineError {
                    symbol: symbol.clone(),
                    week,
                    detail: "pending entry filled while an open trade already exists".into(),
                });
            }
            state.cash -= cost;
            state.open_trades.insert(
                symbol.clone(),
                OpenTrade {
                    symbol: symbol.clone(),
                    entry_date: bar.date,
                    entry_price: entry.entry_price,
                    qty: entry.target_qty,
                    stop_loss: entry.stop_loss,
                    take_profit: entry.take_profit,
                    cost,
                    entry_type: entry.entry_type,
                },
            );
            state.pending_entries.remove(&symbol);
        } else if expired {
            state.pending_entries.remove(&symbol);
        }
    }

    if state.cash < 0 {
        return Err(EngineError {
            symbol: String::new(),
            week,
            detail: format!("cash went negative after fills: {}", state.cash),
        });
    }

    // Phase 2: evaluate automatic exits (tpsl_only only), lexicographic order.
    if cfg.exit_mode == ExitMode::TpslOnly {
        let open_symbols: Vec<Symbol> = sorted_keys(&state.open_trades).into_iter().cloned().collect();
        for symbol in open_symbols {
            let Some(bar) = today.get(&symbol) else { continue };
            let trade = state.open_trades[&symbol].clone();
            if trade.entry_date >= bar.date {
                continue; // no-same-day-exit rule
            }

            let hit_sl = bar.low <= trade.stop_loss;
            let hit_tp = bar.high >= trade.take_profit;
            let exit = match (hit_sl, hit_tp) {
                (true, true) => Some(match cfg.tie_breaker {
                    TieBreaker::Worst => (trade.stop_loss, ExitReason::Sl),
                    TieBreaker::Best => (trade.take_profit, ExitReason::Tp),
                }),
                (true, false) => Some((trade.stop_loss, ExitReason::Sl)),
                (false, true) => Some((trade.take_profit, ExitReason::Tp)),
                (false, false) => None,
            };

            if let Some((exit_price, reason)) = exit {
                close_trade(state, &trade, bar.date, exit_price, trade.qty, reason, cfg.fee_per_trade);
            }
        }
    }

    if state.cash < 0 {
        return Err(EngineError {
            symbol: String::new(),
            week,
            detail: format!("cash went negative after exits: {}", state.cash),
        });
    }

    // Phase 3: mark to market and append the equity point.
    for (symbol, bar) in today {
        state.last_close.insert(symbol.clone(), bar.close);
    }
    if let Some(date) = today.values().map(|b| b.date).next() {
        let point = crate::domain::EquityPoint::new(date, state.cash, state.open_positions_value());
        state.equity_curve.push(point);
    }

    Ok(())
}

/// Close all or part of an open trade, booking a `ClosedTrade` and crediting cash.
fn close_trade(
    state: &mut EngineState,
    trade: &OpenTrade,
    exit_date: NaiveDate,
    exit_price: f64,
    qty: u64,
    reason: ExitReason,
    fee: i64,
) {
    let proceeds = (qty as f64 * exit_price).round() as i64 - fee;
    state.cash += proceeds;

    let entry_cost_for_qty = qty as f64 * trade.entry_price;
    let pnl_vnd = proceeds - entry_cost_for_qty.round() as i64;
    let return_pct = if trade.entry_price > 0.0 {
        (exit_price - trade.entry_price) / trade.entry_price
    } else {
        0.0
    };
    let hold_days = (exit_date - trade.entry_date).num_days();

    state.closed_trades.push(ClosedTrade {
        symbol: trade.symbol.clone(),
        entry_date: trade.entry_date,
        entry_price: trade.entry_price,
        exit_date,
        exit_price,
        qty,
        reason,
        return_pct,
        pnl_vnd,
        hold_days,
    });

    if qty >= trade.qty {
        state.open_trades.remove(&trade.symbol);
    } else {
        let remaining = state.open_trades.get_mut(&trade.symbol).unwrap();
        remaining.qty -= qty;
    }
}

/// Apply manual SELL/REDUCE recommendations, once per week, at the given
/// per-symbol execution price (the next trading day's open).
///
/// Ignored for symbols without an open trade. REDUCE only applies under
/// `4action`; under `3action` a REDUCE recommendation is never emitted by the
/// signal generator (see `signal::generate`), so this is simply a SELL path
/// plus a defensive no-op for REDUCE in other modes.
pub fn apply_manual_exits(
    state: &mut EngineState,
    plan: &WeeklyPlan,
    exec_prices: &HashMap<Symbol, (NaiveDate, f64)>,
    cfg: &EngineConfig,
    week: NaiveDate,
) -> Result<(), EngineError> {
    if cfg.exit_mode == ExitMode::TpslOnly {
        return Ok(());
    }

    for rec in &plan.recommendations {
        if !state.has_open(&rec.symbol) {
            continue;
        }
        let Some(&(exec_date, exec_price)) = exec_prices.get(&rec.symbol) else { continue };

        match rec.action {
            Action::Sell => {
                let trade = state.open_trades[&rec.symbol].clone();
                if exec_date <= trade.entry_date {
                    return Err(EngineError {
                        symbol: rec.symbol.clone(),
                        week,
                        detail: "manual SELL would close on or before the entry date".into(),
                    });
                }
                close_trade(state, &trade, exec_date, exec_price, trade.qty, ExitReason::Sell, cfg.fee_per_trade);
            }
            Action::Reduce if cfg.exit_mode == ExitMode::FourAction => {
                let trade = state.open_trades[&rec.symbol].clone();
                if exec_date <= trade.entry_date {
                    return Err(EngineError {
                        symbol: rec.symbol.clone(),
                        week,
                        detail: "manual REDUCE would close on or before the entry date".into(),
                    });
                }
                let half = trade.qty / 2;
                if half == 0 {
                    // Residual would be zero: coalesce into a single SELL record.
                    close_trade(state, &trade, exec_date, exec_price, trade.qty, ExitReason::Sell, cfg.fee_per_trade);
                } else {
                    let sold = trade.qty - half;
                    close_trade(state, &trade, exec_date, exec_price, sold, ExitReason::Reduce, cfg.fee_per_trade);
                }
            }
            _ => {}
        }
    }

    if state.cash < 0 {
        return Err(EngineError {
            symbol: String::new(),
            week,
            detail: format!("cash went negative after manual exits: {}", state.cash),
        });
    }

    Ok(())
}

/// Force-close every open and pending position at the end of the backtest
/// range (reason `Timeout`), so partial runs still report a consistent book.
pub fn timeout_close_all(state: &mut EngineState, as_of: NaiveDate, cfg: &EngineConfig) {
    state.pending_entries.clear();
    let symbols: Vec<Symbol> = sorted_keys(&state.open_trades).into_iter().cloned().collect();
    for symbol in symbols {
        let trade = state.open_trades[&symbol].clone();
        let price = state.last_close.get(&symbol).copied().unwrap_or(trade.entry_price);
        if as_of <= trade.entry_date {
            continue;
        }
        close_trade(state, &trade, as_of, price, trade.qty, ExitReason::Timeout, cfg.fee_per_trade);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntryType, PendingEntry};

    fn bar(symbol: &str, date: NaiveDate, o: f64, h: f64, l: f64, c: f64) -> Bar {
        Bar { symbol: symbol.into(), date, open: o, high: h, low: l, close: c, volume: 1_000 }
    }

    fn cfg(exit_mode: ExitMode, tie_breaker: TieBreaker) -> EngineConfig {
        EngineConfig { exit_mode, tie_breaker, fee_per_trade: 0 }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn pending(symbol: &str, entry: f64, sl: f64, tp: f64, qty: u64, earliest: NaiveDate, expires: NaiveDate) -> PendingEntry {
        PendingEntry {
            symbol: symbol.into(),
            entry_price: entry,
            stop_loss: sl,
            take_profit: tp,
            target_qty: qty,
            entry_type: EntryType::Pullback,
            earliest_fill_date: earliest,
            expires_at: expires,
        }
    }

    #[test]
    fn tp_fill_happy_path() {
        let mut state = EngineState::new(10_000_000);
        state.pending_entries.insert(
            "AAA".into(),
            pending("AAA", 100.0, 94.0, 112.0, 10_000, d(2024, 1, 2), d(2024, 1, 8)),
        );
        let c = cfg(ExitMode::TpslOnly, TieBreaker::Worst);

        let mut day1 = HashMap::new();
        day1.insert("AAA".to_string(), bar("AAA", d(2024, 1, 2), 100.0, 101.0, 99.0, 100.0));
        process_day(&mut state, &day1, &c, d(2024, 1, 1)).unwrap();
        assert!(state.open_trades.contains_key("AAA"));
        assert_eq!(state.cash, 10_000_000 - 10_000 * 100);

        let mut day2 = HashMap::new();
        day2.insert("AAA".to_string(), bar("AAA", d(2024, 1, 3), 105.0, 120.0, 105.0, 115.0));
        process_day(&mut state, &day2, &c, d(2024, 1, 1)).unwrap();
        assert!(!state.open_trades.contains_key("AAA"));
        assert_eq!(state.closed_trades.len(), 1);
        let t = &state.closed_trades[0];
        assert_eq!(t.reason, ExitReason::Tp);
        assert_eq!(t.exit_price, 112.0);
        assert_eq!(t.pnl_vnd, 10_000 * (112 - 100));
    }

    #[test]
    fn sl_fill() {
        let mut state = EngineState::new(10_000_000);
        state.pending_entries.insert(
            "AAA".into(),
            pending("AAA", 100.0, 94.0, 112.0, 10_000, d(2024, 1, 2), d(2024, 1, 8)),
        );
        let c = cfg(ExitMode::TpslOnly, TieBreaker::Worst);

        let mut day1 = HashMap::new();
        day1.insert("AAA".to_string(), bar("AAA", d(2024, 1, 2), 100.0, 101.0, 99.0, 100.0));
        process_day(&mut state, &day1, &c, d(2024, 1, 1)).unwrap();

        let mut day2 = HashMap::new();
        day2.insert("AAA".to_string(), bar("AAA", d(2024, 1, 3), 98.0, 103.0, 90.0, 95.0));
        process_day(&mut state, &day2, &c, d(2024, 1, 1)).unwrap();

        let t = &state.closed_trades[0];
        assert_eq!(t.reason, ExitReason::Sl);
        assert_eq!(t.exit_price, 94.0);
        assert_eq!(t.pnl_vnd, 10_000 * (94 - 100));
    }

    #[test]
    fn same_bar_both_worst_picks_sl() {
        let mut state = EngineState::new(10_000_000);
        state.pending_entries.insert(
            "AAA".into(),
            pending("AAA", 100.0, 94.0, 112.0, 10_000, d(2024, 1, 2), d(2024, 1, 8)),
        );
        let c = cfg(ExitMode::TpslOnly, TieBreaker::Worst);
        let mut day1 = HashMap::new();
        day1.insert("AAA".to_string(), bar("AAA", d(2024, 1, 2), 100.0, 101.0, 99.0, 100.0));
        process_day(&mut state, &day1, &c, d(2024, 1, 1)).unwrap();

        let mut day2 = HashMap::new();
        day2.insert("AAA".to_string(), bar("AAA", d(2024, 1, 3), 100.0, 120.0, 90.0, 105.0));
        process_day(&mut state, &day2, &c, d(2024, 1, 1)).unwrap();
        assert_eq!(state.closed_trades[0].reason, ExitReason::Sl);
    }

    #[test]
    fn same_bar_both_best_picks_tp() {
        let mut state = EngineState::new(10_000_000);
        state.pending_entries.insert(
            "AAA".into(),
            pending("AAA", 100.0, 94.0, 112.0, 10_000, d(2024, 1, 2), d(2024, 1, 8)),
        );
        let c = cfg(ExitMode::TpslOnly, TieBreaker::Best);
        let mut day1 = HashMap::new();
        day1.insert("AAA".to_string(), bar("AAA", d(2024, 1, 2), 100.0, 101.0, 99.0, 100.0));
        process_day(&mut state, &day1, &c, d(2024, 1, 1)).unwrap();

        let mut day2 = HashMap::new();
        day2.insert("AAA".to_string(), bar("AAA", d(2024, 1, 3), 100.0, 120.0, 90.0, 105.0));
        process_day(&mut state, &day2, &c, d(2024, 1, 1)).unwrap();
        assert_eq!(state.closed_trades[0].reason, ExitReason::Tp);
    }

    #[test]
    fn no_same_day_exit_defers_to_next_bar() {
        let mut state = EngineState::new(10_000_000);
        // A single bar that both fills the entry and would touch SL/TP.
        state.pending_entries.insert(
            "AAA".into(),
            pending("AAA", 100.0, 100.0, 100.0, 10_000, d(2024, 1, 2), d(2024, 1, 8)),
        );
        let c = cfg(ExitMode::TpslOnly, TieBreaker::Worst);
        let mut day1 = HashMap::new();
        day1.insert("AAA".to_string(), bar("AAA", d(2024, 1, 2), 100.0, 100.0, 100.0, 100.0));
        process_day(&mut state, &day1, &c, d(2024, 1, 1)).unwrap();
        assert!(state.open_trades.contains_key("AAA"));
        assert!(state.closed_trades.is_empty());

        let mut day2 = HashMap::new();
        day2.insert("AAA".to_string(), bar("AAA", d(2024, 1, 3), 100.0, 105.0, 95.0, 100.0));
        process_day(&mut state, &day2, &c, d(2024, 1, 1)).unwrap();
        assert_eq!(state.closed_trades.len(), 1);
        assert_eq!(state.closed_trades[0].exit_date, d(2024, 1, 3));
    }

    #[test]
    fn breakout_not_eligible_until_fill_date() {
        let mut state = EngineState::new(10_000_000);
        state.pending_entries.insert(
            "AAA".into(),
            PendingEntry {
                symbol: "AAA".into(),
                entry_price: 100.0,
                stop_loss: 94.0,
                take_profit: 112.0,
                target_qty: 100,
                entry_type: EntryType::Breakout,
                earliest_fill_date: d(2024, 1, 8),
                expires_at: d(2024, 1, 15),
            },
        );
        let c = cfg(ExitMode::TpslOnly, TieBreaker::Worst);
        let mut day = HashMap::new();
        day.insert("AAA".to_string(), bar("AAA", d(2024, 1, 3), 99.0, 101.0, 98.0, 100.0));
        process_day(&mut state, &day, &c, d(2024, 1, 1)).unwrap();
        assert!(!state.open_trades.contains_key("AAA"));
        assert!(state.pending_entries.contains_key("AAA"));
    }

    #[test]
    fn pending_expires_uncancelled_at_week_end() {
        let mut state = EngineState::new(10_000_000);
        state.pending_entries.insert(
            "AAA".into(),
            pending("AAA", 200.0, 190.0, 220.0, 50, d(2024, 1, 2), d(2024, 1, 5)),
        );
        let c = cfg(ExitMode::TpslOnly, TieBreaker::Worst);
        let mut day = HashMap::new();
        day.insert("AAA".to_string(), bar("AAA", d(2024, 1, 5), 100.0, 101.0, 98.0, 100.0));
        process_day(&mut state, &day, &c, d(2024, 1, 1)).unwrap();
        assert!(!state.pending_entries.contains_key("AAA"));
        assert!(!state.open_trades.contains_key("AAA"));
    }
}
