//! Closed-trade log export (CSV).

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use trendlab_core::domain::{ClosedTrade, ExitReason};

fn reason_str(reason: ExitReason) -> &'static str {
    match reason {
        ExitReason::Sl => "sl",
        ExitReason::Tp => "tp",
        ExitReason::Sell => "sell",
        ExitReason::Reduce => "reduce",
        ExitReason::Timeout => "timeout",
    }
}

pub fn write_trades_csv(path: &Path, trades: &[ClosedTrade]) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    writeln!(file, "symbol,entry_date,entry_price,exit_date,exit_price,qty,reason,return_pct,pnl_vnd,hold_days")?;
    for trade in trades {
        writeln!(
            file,
            "{},{},{:.4},{},{:.4},{},{},{:.6},{},{}",
            trade.symbol,
            trade.entry_date,
            trade.entry_price,
            trade.exit_date,
            trade.exit_price,
            trade.qty,
            reason_str(trade.reason),
            trade.return_pct,
            trade.pnl_vnd,
            trade.hold_days,
        )?;
    }
    Ok(())
}
