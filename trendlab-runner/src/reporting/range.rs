//! `--run-range` support: diff between the worst-case and best-case
//! tie-break runs over the same configuration.

use crate::metrics::Summary;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Worst/best summaries plus their element-wise deltas, persisted as
/// `range_summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeSummary {
    pub worst: Summary,
    pub best: Summary,
    pub delta_final_value: i64,
    pub delta_total_return: f64,
    pub delta_cagr: f64,
    pub delta_max_drawdown: f64,
    pub delta_win_rate: f64,
    pub delta_profit_factor: f64,
}

/// Builds the diff; `best` is expected to be at least as favorable as `worst`
/// under the same-bar tie-break policy, but no ordering is enforced here —
/// the deltas are simply `best - worst`.
pub fn diff_summaries(worst: &Summary, best: &Summary) -> RangeSummary {
    RangeSummary {
        worst: worst.clone(),
        best: best.clone(),
        delta_final_value: best.final_value - worst.final_value,
        delta_total_return: best.total_return - worst.total_return,
        delta_cagr: best.cagr - worst.cagr,
        delta_max_drawdown: best.max_drawdown - worst.max_drawdown,
        delta_win_rate: best.win_rate - worst.win_rate,
        delta_profit_factor: best.profit_factor - worst.profit_factor,
    }
}

pub fn write_range_summary_json(path: &Path, range_summary: &RangeSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(range_summary).context("failed to serialize range summary")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_best_minus_worst() {
        let worst = Summary::compute(1_000_000, &[], &[]);
        let mut best = Summary::compute(1_000_000, &[], &[]);
        best.final_value = 1_200_000;
        best.total_return = 0.2;
        let diff = diff_summaries(&worst, &best);
        assert_eq!(diff.delta_final_value, 200_000);
        assert!((diff.delta_total_return - 0.2).abs() < 1e-9);
    }
}
