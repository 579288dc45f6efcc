//! Daily equity curve export (CSV).

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use trendlab_core::domain::EquityPoint;

pub fn write_equity_csv(path: &Path, equity: &[EquityPoint]) -> Result<()> {
    let mut file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    writeln!(file, "date,total_value,cash,open_positions_value")?;
    for point in equity {
        writeln!(file, "{},{},{},{}", point.date, point.total_value, point.cash, point.open_positions_value)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn writes_expected_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("equity_curve.csv");
        let curve = vec![EquityPoint::new(NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(), 9_000_000, 1_000_000)];
        write_equity_csv(&path, &curve).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("date,total_value,cash,open_positions_value\n"));
        assert!(contents.contains("2023-01-02,10000000,9000000,1000000"));
    }
}
