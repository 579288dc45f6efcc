//! Run summary export (JSON).

use crate::metrics::Summary;
use anyhow::{Context, Result};
use std::path::Path;

pub fn write_summary_json(path: &Path, summary: &Summary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("failed to serialize summary")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
