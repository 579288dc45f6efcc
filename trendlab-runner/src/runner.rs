//! Top-level orchestration: wires the week driver to the reporter.
//!
//! Two entry points:
//! - `run_single()`: one backtest at the configured tie-break, full artifact set.
//! - `run_range()`: the same configuration run twice (worst/best tie-break),
//!   `_worst`/`_best` suffixed artifacts plus a `range_summary.json` diff.

use crate::config::{RunConfig, TieBreakerParam};
use crate::driver::{self, DriverError};
use crate::metrics::Summary;
use crate::provider::Provider;
use crate::reporting::artifacts::{ArtifactManager, ArtifactPaths};
use crate::reporting::range::{self, RangeSummary};
use thiserror::Error;
use trendlab_core::signal::WeeklyPlan;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Artifact(#[from] anyhow::Error),
}

/// Output of `run_single`: the artifact paths plus the computed summary.
pub struct SingleRunOutcome {
    pub paths: ArtifactPaths,
    pub summary: Summary,
}

/// Output of `run_range`: both artifact sets plus the diff.
pub struct RangeRunOutcome {
    pub worst_paths: ArtifactPaths,
    pub best_paths: ArtifactPaths,
    pub range_summary: RangeSummary,
}

/// Runs once at `config`'s own tie-break policy, writing unsuffixed artifacts.
pub fn run_single(
    config: &RunConfig,
    provider: &dyn Provider,
    static_plan: Option<&WeeklyPlan>,
    manager: &ArtifactManager,
) -> Result<SingleRunOutcome, RunnerError> {
    let output = driver::run_backtest(config, provider, static_plan)?;
    let paths = manager.save_run(config.initial_cash, &output, "")?;
    let summary = Summary::compute(config.initial_cash, &output.equity_curve, &output.closed_trades);
    Ok(SingleRunOutcome { paths, summary })
}

/// Runs `config` twice — once with `TieBreaker::Worst`, once with `Best` —
/// and writes `_worst`/`_best` artifacts plus `range_summary.json`.
pub fn run_range(
    config: &RunConfig,
    provider: &dyn Provider,
    static_plan: Option<&WeeklyPlan>,
    manager: &ArtifactManager,
) -> Result<RangeRunOutcome, RunnerError> {
    let mut worst_config = config.clone();
    worst_config.tie_breaker = TieBreakerParam::Worst;
    let worst_output = driver::run_backtest(&worst_config, provider, static_plan)?;
    let worst_paths = manager.save_run(config.initial_cash, &worst_output, "_worst")?;
    let worst_summary = Summary::compute(config.initial_cash, &worst_output.equity_curve, &worst_output.closed_trades);

    let mut best_config = config.clone();
    best_config.tie_breaker = TieBreakerParam::Best;
    let best_output = driver::run_backtest(&best_config, provider, static_plan)?;
    let best_paths = manager.save_run(config.initial_cash, &best_output, "_best")?;
    let best_summary = Summary::compute(config.initial_cash, &best_output.equity_curve, &best_output.closed_trades);

    let range_summary = range::diff_summaries(&worst_summary, &best_summary);
    let range_path = manager.output_dir().join("range_summary.json");
    range::write_range_summary_json(&range_path, &range_summary)?;

    Ok(RangeRunOutcome { worst_paths, best_paths, range_summary })
}
