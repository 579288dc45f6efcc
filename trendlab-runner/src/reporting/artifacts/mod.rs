//! Artifact manager for persisting run outputs.

mod equity;
mod summary;
mod trades;

use crate::driver::DriverOutput;
use crate::metrics::Summary;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Artifact paths returned after export.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub summary_json: PathBuf,
    pub equity_csv: PathBuf,
    pub trades_csv: PathBuf,
}

/// Writes all artifacts for a single run into `output_dir`, optionally
/// suffixing filenames (used by `--run-range` for `_worst`/`_best`).
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    output_dir: PathBuf,
}

impl ArtifactManager {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir).context("failed to create artifact output directory")?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn save_run(&self, initial_cash: i64, output: &DriverOutput, suffix: &str) -> Result<ArtifactPaths> {
        let summary = Summary::compute(initial_cash, &output.equity_curve, &output.closed_trades);

        let summary_json = self.output_dir.join(format!("summary{suffix}.json"));
        summary::write_summary_json(&summary_json, &summary)?;

        let equity_csv = self.output_dir.join(format!("equity_curve{suffix}.csv"));
        equity::write_equity_csv(&equity_csv, &output.equity_curve)?;

        let trades_csv = self.output_dir.join(format!("trades{suffix}.csv"));
        trades::write_trades_csv(&trades_csv, &output.closed_trades)?;

        Ok(ArtifactPaths { summary_json, equity_csv, trades_csv })
    }
}
