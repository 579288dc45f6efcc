//! Abstract price data provider and a CSV-directory-backed default.
//!
//! The interface (`get_daily_history`, `get_last_prices`) is the simulator's
//! only contract with the outside world. A production deployment would
//! layer a real market-data fetcher with retries and a fallback chain in
//! front of this trait; that layer lives outside the simulator entirely.
//! `CsvDirectoryProvider` exists only to keep the CLI runnable end-to-end
//! against local fixtures.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use trendlab_core::domain::Bar;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no data file for symbol '{0}'")]
    SymbolNotFound(String),
    #[error("failed to read {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("malformed row in {path} at line {line}: {detail}")]
    Malformed { path: String, line: usize, detail: String },
}

/// Abstract daily OHLCV source. History must be non-decreasing in date with
/// no duplicate dates; an empty result is a valid (if unfortunate) answer.
pub trait Provider {
    fn get_daily_history(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<Bar>, ProviderError>;

    fn get_last_prices(&self, symbols: &[String]) -> HashMap<String, f64>;
}

/// Reads `<dir>/<SYMBOL>.csv` files with a `date,open,high,low,close,volume` header.
pub struct CsvDirectoryProvider {
    dir: PathBuf,
}

impl CsvDirectoryProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

impl Provider for CsvDirectoryProvider {
    fn get_daily_history(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<Bar>, ProviderError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&path).map_err(|e| ProviderError::Io {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e),
        })?;

        let mut bars = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(|e| ProviderError::Malformed {
                path: path.display().to_string(),
                line: i + 2,
                detail: e.to_string(),
            })?;
            let date: NaiveDate = record.get(0).unwrap_or("").parse().map_err(|_| ProviderError::Malformed {
                path: path.display().to_string(),
                line: i + 2,
                detail: "unparseable date".to_string(),
            })?;
            if date < from || date > to {
                continue;
            }
            let parse_f64 = |idx: usize| -> Result<f64, ProviderError> {
                record.get(idx).unwrap_or("").parse().map_err(|_| ProviderError::Malformed {
                    path: path.display().to_string(),
                    line: i + 2,
                    detail: format!("unparseable numeric field at column {idx}"),
                })
            };
            let open = parse_f64(1)?;
            let high = parse_f64(2)?;
            let low = parse_f64(3)?;
            let close = parse_f64(4)?;
            let volume: u64 = record.get(5).unwrap_or("0").parse().unwrap_or(0);

            bars.push(Bar { symbol: symbol.to_string(), date, open, high, low, close, volume });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn get_last_prices(&self, symbols: &[String]) -> HashMap<String, f64> {
        let mut out = HashMap::new();
        for symbol in symbols {
            if let Ok(bars) = self.get_daily_history(symbol, NaiveDate::MIN, NaiveDate::MAX) {
                if let Some(last) = bars.last() {
                    out.insert(symbol.clone(), last.close);
                }
            }
        }
        out
    }
}

/// A fixed in-memory provider, useful for tests that don't want a filesystem fixture.
pub struct InMemoryProvider {
    bars: HashMap<String, Vec<Bar>>,
}

impl InMemoryProvider {
    pub fn new(bars: HashMap<String, Vec<Bar>>) -> Self {
        Self { bars }
    }
}

impl Provider for InMemoryProvider {
    fn get_daily_history(&self, symbol: &str, from: NaiveDate, to: NaiveDate) -> Result<Vec<Bar>, ProviderError> {
        Ok(self
            .bars
            .get(symbol)
            .map(|bars| bars.iter().filter(|b| b.date >= from && b.date <= to).cloned().collect())
            .unwrap_or_default())
    }

    fn get_last_prices(&self, symbols: &[String]) -> HashMap<String, f64> {
        symbols
            .iter()
            .filter_map(|s| self.bars.get(s).and_then(|b| b.last()).map(|b| (s.clone(), b.close)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_symbol_file_returns_empty_history() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = CsvDirectoryProvider::new(tmp.path());
        let bars = provider
            .get_daily_history("NOPE", NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap())
            .unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn reads_and_filters_by_date_range() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("AAA.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "date,open,high,low,close,volume").unwrap();
        writeln!(file, "2023-01-02,100,101,99,100.5,1000").unwrap();
        writeln!(file, "2023-06-01,110,112,108,111,1200").unwrap();
        writeln!(file, "2024-01-02,120,122,118,121,1300").unwrap();

        let provider = CsvDirectoryProvider::new(tmp.path());
        let bars = provider
            .get_daily_history("AAA", NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap())
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2023, 1, 2).unwrap());
    }

    #[test]
    fn in_memory_provider_roundtrips() {
        let mut bars = HashMap::new();
        bars.insert(
            "AAA".to_string(),
            vec![Bar {
                symbol: "AAA".into(),
                date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.5,
                volume: 1000,
            }],
        );
        let provider = InMemoryProvider::new(bars);
        let prices = provider.get_last_prices(&["AAA".to_string()]);
        assert_eq!(prices.get("AAA"), Some(&100.5));
    }
}
