//! Trading-day resolution over the price store.
//!
//! The store is the source of truth: a date with bars is a trading day.
//! Without a usable store the calendar degrades to weekday arithmetic,
//! and the verdict says so, letting strict callers refuse to act on an
//! assumption.

use super::store::PriceStore;
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use tracing::warn;

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Trading-day answer plus how it was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayVerdict {
    /// Backed by actual bars (or their absence) in the price store.
    Confirmed(bool),
    /// Store unavailable; weekday heuristic only.
    Assumed(bool),
}

impl DayVerdict {
    pub fn is_open(&self) -> bool {
        matches!(self, DayVerdict::Confirmed(true) | DayVerdict::Assumed(true))
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, DayVerdict::Confirmed(_))
    }
}

#[derive(Debug, Clone)]
pub struct TradingCalendar {
    store: PriceStore,
}

impl TradingCalendar {
    pub fn new(store: PriceStore) -> Self {
        Self { store }
    }

    /// Whether `date` (YYYY-MM-DD) is a trading day.
    pub fn is_trading_day(&self, date: &str) -> DayVerdict {
        match self.store.try_records() {
            Some(records) => DayVerdict::Confirmed(PriceStore::known_in(&records, date, None)),
            None => DayVerdict::Assumed(is_weekday(date)),
        }
    }

    /// The latest store timestamp strictly before `date`, formatted at the
    /// input's granularity (date-only or datetime, auto-detected). An
    /// empty or unusable store falls back to calendar arithmetic: one day
    /// back skipping weekends for dates, one hour back for datetimes.
    pub fn previous_trading_day(&self, date: &str) -> String {
        let date_only = !date.contains(' ');
        let input = match parse_stamp(date) {
            Some(input) => input,
            None => {
                warn!("Unparseable date {:?}, using wall clock fallback", date);
                let now = Local::now().naive_local();
                return if date_only {
                    format_stamp(now - Duration::days(1), true)
                } else {
                    format_stamp(now - Duration::hours(1), false)
                };
            }
        };

        let mut stamps: Vec<NaiveDateTime> = Vec::new();
        if let Some(records) = self.store.try_records() {
            for record in &records {
                for ts in record.timestamps() {
                    if let Some(stamp) = parse_stamp(ts) {
                        stamps.push(stamp);
                    }
                }
            }
        }

        let previous = stamps.into_iter().filter(|s| *s < input).max();
        match previous {
            Some(previous) => format_stamp(previous, date_only),
            None => calendar_fallback(input, date_only),
        }
    }
}

/// Parse "YYYY-MM-DD HH:MM:SS" or "YYYY-MM-DD" (midnight).
fn parse_stamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, DATETIME_FMT) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(value, DATE_FMT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn format_stamp(stamp: NaiveDateTime, date_only: bool) -> String {
    if date_only {
        stamp.format(DATE_FMT).to_string()
    } else {
        stamp.format(DATETIME_FMT).to_string()
    }
}

fn calendar_fallback(input: NaiveDateTime, date_only: bool) -> String {
    if date_only {
        let mut day = input.date() - Duration::days(1);
        while day.weekday().num_days_from_monday() >= 5 {
            day -= Duration::days(1);
        }
        day.format(DATE_FMT).to_string()
    } else {
        format_stamp(input - Duration::hours(1), false)
    }
}

fn is_weekday(date: &str) -> bool {
    NaiveDate::parse_from_str(date, DATE_FMT)
        .map(|d| d.weekday().num_days_from_monday() < 5)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn store_with_dates(dates: &[&str]) -> (tempfile::TempDir, TradingCalendar) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prices.jsonl");
        let series: Vec<String> = dates
            .iter()
            .map(|d| format!(r#""{d}": {{"1. buy price": 10.0, "4. sell price": 10.5}}"#))
            .collect();
        let line = format!(
            r#"{{"Meta Data": {{"2. Symbol": "600519.SH", "2.1. Name": "贵州茅台"}}, "Time Series (Daily)": {{{}}}}}"#,
            series.join(", ")
        );
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{}", line).unwrap();
        (dir, TradingCalendar::new(PriceStore::new(path)))
    }

    fn missing_store_calendar() -> (tempfile::TempDir, TradingCalendar) {
        let dir = tempdir().unwrap();
        let calendar = TradingCalendar::new(PriceStore::new(dir.path().join("absent.jsonl")));
        (dir, calendar)
    }

    #[test]
    fn test_weekend_fallback_without_store() {
        let (_dir, calendar) = missing_store_calendar();

        // 2025-10-11 is a Saturday, 2025-10-10 a Friday.
        let saturday = calendar.is_trading_day("2025-10-11");
        assert_eq!(saturday, DayVerdict::Assumed(false));
        assert!(!saturday.is_open());
        assert!(!saturday.is_confirmed());

        let friday = calendar.is_trading_day("2025-10-10");
        assert_eq!(friday, DayVerdict::Assumed(true));
        assert!(friday.is_open());
    }

    #[test]
    fn test_confirmed_verdict_with_store() {
        let (_dir, calendar) = store_with_dates(&["2025-10-09", "2025-10-10"]);

        assert_eq!(calendar.is_trading_day("2025-10-10"), DayVerdict::Confirmed(true));
        // Present file, absent date: confirmed closed.
        assert_eq!(calendar.is_trading_day("2025-10-11"), DayVerdict::Confirmed(false));
    }

    #[test]
    fn test_unparseable_date_without_store_is_closed() {
        let (_dir, calendar) = missing_store_calendar();
        assert_eq!(calendar.is_trading_day("not-a-date"), DayVerdict::Assumed(false));
    }

    #[test]
    fn test_previous_trading_day_from_store() {
        let (_dir, calendar) = store_with_dates(&["2025-10-08", "2025-10-09", "2025-10-13"]);

        // Skips the missing 10-10..10-12 span straight to the last bar.
        assert_eq!(calendar.previous_trading_day("2025-10-13"), "2025-10-09");
        assert_eq!(calendar.previous_trading_day("2025-10-09"), "2025-10-08");
    }

    #[test]
    fn test_previous_trading_day_weekend_skip_without_store() {
        let (_dir, calendar) = missing_store_calendar();

        // Monday steps back over the weekend to Friday.
        assert_eq!(calendar.previous_trading_day("2025-10-13"), "2025-10-10");
        // Tuesday steps back one day.
        assert_eq!(calendar.previous_trading_day("2025-10-14"), "2025-10-13");
    }

    #[test]
    fn test_previous_trading_day_datetime_granularity() {
        let (_dir, calendar) = missing_store_calendar();

        assert_eq!(
            calendar.previous_trading_day("2025-10-13 10:00:00"),
            "2025-10-13 09:00:00"
        );
    }

    #[test]
    fn test_previous_trading_day_datetime_from_intraday_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prices.jsonl");
        let line = r#"{"Meta Data": {"2. Symbol": "600519.SH"}, "Time Series (60min)": {"2025-10-13 10:30:00": {"1. buy price": 1795.0}, "2025-10-13 11:30:00": {"1. buy price": 1796.0}}}"#;
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{}", line).unwrap();
        let calendar = TradingCalendar::new(PriceStore::new(path));

        assert_eq!(
            calendar.previous_trading_day("2025-10-13 11:00:00"),
            "2025-10-13 10:30:00"
        );
        // Date-only input against intraday stamps keeps date granularity.
        assert_eq!(calendar.previous_trading_day("2025-10-14"), "2025-10-13");
    }

    #[test]
    fn test_previous_trading_day_no_earlier_stamp_falls_back() {
        let (_dir, calendar) = store_with_dates(&["2025-10-13", "2025-10-14"]);

        // All stamps are >= the input; calendar arithmetic takes over.
        assert_eq!(calendar.previous_trading_day("2025-10-13"), "2025-10-10");
    }
}
