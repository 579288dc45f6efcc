//! Weekly resampling — aggregates daily bars into ISO (Monday-Friday) weeks.
//!
//! Week numbering is bound to ISO 8601 so resampling is deterministic across
//! OS locales: `NaiveDate::iso_week()` never depends on the platform locale.

use crate::domain::Bar;
use chrono::{Datelike, NaiveDate};

/// A weekly aggregate bar: open = first day's open, close = last day's close,
/// high/low = extremes across the week, volume = sum.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyBar {
    pub symbol: String,
    /// Monday of the ISO week this bar summarizes.
    pub week_start: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl WeeklyBar {
    fn as_daily(&self) -> Bar {
        Bar {
            symbol: self.symbol.clone(),
            date: self.week_start,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// Group daily bars by ISO (year, week) and emit one weekly bar per group with
/// at least one daily bar. Bars must already be ordered by strictly increasing
/// date (caller's responsibility — the provider contract guarantees this).
pub fn weekly_resample(daily: &[Bar]) -> Vec<WeeklyBar> {
    let mut weeks: Vec<WeeklyBar> = Vec::new();

    for bar in daily {
        let iso = bar.date.iso_week();
        let week_start = monday_of_iso_week(iso.year(), iso.week());

        match weeks.last_mut() {
            Some(last) if last.week_start == week_start => {
                last.high = last.high.max(bar.high);
                last.low = last.low.min(bar.low);
                last.close = bar.close;
                last.volume += bar.volume;
            }
            _ => weeks.push(WeeklyBar {
                symbol: bar.symbol.clone(),
                week_start,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
            }),
        }
    }

    weeks
}

/// Render a `&[WeeklyBar]` as `Bar`s (week_start as `date`) so the generic
/// `Indicator` trait, written against `&[Bar]`, can run over weekly series.
pub fn as_bars(weekly: &[WeeklyBar]) -> Vec<Bar> {
    weekly.iter().map(WeeklyBar::as_daily).collect()
}

fn monday_of_iso_week(iso_year: i32, iso_week: u32) -> NaiveDate {
    NaiveDate::from_isoywd_opt(iso_year, iso_week, chrono::Weekday::Mon)
        .expect("valid ISO year/week always has a Monday")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, o: f64, h: f64, l: f64, c: f64, v: u64) -> Bar {
        Bar {
            symbol: "AAA".into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
        }
    }

    #[test]
    fn single_week_aggregates() {
        // Mon 2024-01-01 .. Fri 2024-01-05
        let daily = vec![
            bar("2024-01-01", 100.0, 105.0, 99.0, 102.0, 1_000),
            bar("2024-01-02", 102.0, 108.0, 101.0, 104.0, 1_100),
            bar("2024-01-03", 104.0, 107.0, 100.0, 103.0, 900),
            bar("2024-01-04", 103.0, 106.0, 98.0, 105.0, 1_200),
            bar("2024-01-05", 105.0, 110.0, 104.0, 109.0, 1_300),
        ];
        let weekly = weekly_resample(&daily);
        assert_eq!(weekly.len(), 1);
        let w = &weekly[0];
        assert_eq!(w.week_start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(w.open, 100.0);
        assert_eq!(w.close, 109.0);
        assert_eq!(w.high, 110.0);
        assert_eq!(w.low, 98.0);
        assert_eq!(w.volume, 1_000 + 1_100 + 900 + 1_200 + 1_300);
    }

    #[test]
    fn two_weeks_split_correctly() {
        let daily = vec![
            bar("2024-01-04", 100.0, 105.0, 99.0, 102.0, 1_000), // week of Jan 1
            bar("2024-01-05", 102.0, 108.0, 101.0, 104.0, 1_100),
            bar("2024-01-08", 104.0, 107.0, 100.0, 103.0, 900), // week of Jan 8
            bar("2024-01-09", 103.0, 106.0, 98.0, 105.0, 1_200),
        ];
        let weekly = weekly_resample(&daily);
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].week_start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(weekly[1].week_start, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
    }

    #[test]
    fn missing_bars_not_synthesized() {
        // Only Mon and Thu present in the week — aggregate still forms from
        // the two bars present, no interpolation of Tue/Wed/Fri.
        let daily = vec![
            bar("2024-01-01", 100.0, 101.0, 99.0, 100.5, 500),
            bar("2024-01-04", 100.5, 103.0, 100.0, 102.0, 700),
        ];
        let weekly = weekly_resample(&daily);
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].volume, 1_200);
    }

    #[test]
    fn as_bars_preserves_ohlcv() {
        let daily = vec![bar("2024-01-01", 100.0, 105.0, 99.0, 102.0, 1_000)];
        let weekly = weekly_resample(&daily);
        let as_daily = as_bars(&weekly);
        assert_eq!(as_daily.len(), 1);
        assert_eq!(as_daily[0].close, 102.0);
        assert_eq!(as_daily[0].date, weekly[0].week_start);
    }
}
